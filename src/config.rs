use crate::bands::{BandTable, GradeBand};
use crate::weights::{CategoryWeights, DefaultWeightTable};
use anyhow::Context;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// Env var naming an optional JSON config file.
pub const CONFIG_ENV: &str = "GRADEWEIGHTD_CONFIG";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigSource {
    #[default]
    Builtin,
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub default_weights: DefaultWeightTable,
    pub grade_bands: BandTable,
    pub source: ConfigSource,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    default_weights: Option<CategoryWeights>,
    grade_bands: Option<Vec<GradeBand>>,
}

impl EngineConfig {
    /// Builtin defaults, overlaid with the file named by
    /// `GRADEWEIGHTD_CONFIG` when it is set.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(p) if !p.is_empty() => Self::from_file(Path::new(&p)),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;

        let mut cfg = Self::default();
        cfg.apply(file)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid config {}", path.display()))?;
        cfg.source = ConfigSource::File(path.to_path_buf());
        Ok(cfg)
    }

    fn apply(&mut self, file: ConfigFile) -> Result<(), String> {
        // Build both before touching self so a bad patch changes nothing.
        let weights = file
            .default_weights
            .map(|w| DefaultWeightTable::new(w).map_err(|e| format!("defaultWeights: {}", e)))
            .transpose()?;
        let bands = file
            .grade_bands
            .map(|b| BandTable::new(b).map_err(|e| format!("gradeBands: {}", e)))
            .transpose()?;
        if let Some(w) = weights {
            self.default_weights = w;
        }
        if let Some(b) = bands {
            self.grade_bands = b;
        }
        Ok(())
    }

    /// Runtime patch with the same shape as the config file.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        let file: ConfigFile = serde_json::from_value(Value::Object(patch.clone()))
            .map_err(|e| format!("bad patch: {}", e))?;
        self.apply(file)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "defaultWeights": self.default_weights.profile(),
            "gradeBands": self.grade_bands,
        })
    }

    pub fn source_label(&self) -> String {
        match &self.source {
            ConfigSource::Builtin => "builtin".to_string(),
            ConfigSource::File(p) => p.to_string_lossy().to_string(),
        }
    }
}
