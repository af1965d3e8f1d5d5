use crate::config::EngineConfig;
use crate::registry::ProfileRegistry;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: EngineConfig,
    pub profiles: ProfileRegistry,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            profiles: ProfileRegistry::new(),
        }
    }
}
