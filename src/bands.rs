use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maps an overall percentage to a letter grade.
///
/// Callers must only band graded results; an ungraded student has no
/// percentage to band.
pub trait GradeBander {
    fn band(&self, percentage: f64) -> &str;

    /// Every letter this bander can produce, highest band first. Class
    /// distributions start from this list; letters missing from it are
    /// appended as they turn up.
    fn letters(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeBand {
    pub min: f64,
    pub letter: String,
}

impl GradeBand {
    fn new(min: f64, letter: &str) -> Self {
        Self {
            min,
            letter: letter.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandTableError {
    #[error("band table must contain at least one band")]
    Empty,
    #[error("band {letter} has a non-finite minimum")]
    NonFiniteMin { letter: String },
    #[error("band {letter} (min {min}) must be below the previous band's min {previous}")]
    NotDescending {
        letter: String,
        min: f64,
        previous: f64,
    },
}

/// Ordered thresholds, highest first. The first band whose `min` the
/// percentage reaches wins; anything under the last band's `min` still
/// gets the last letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BandTable {
    bands: Vec<GradeBand>,
}

impl BandTable {
    pub fn new(bands: Vec<GradeBand>) -> Result<Self, BandTableError> {
        if bands.is_empty() {
            return Err(BandTableError::Empty);
        }
        let mut previous: Option<f64> = None;
        for b in &bands {
            if !b.min.is_finite() {
                return Err(BandTableError::NonFiniteMin {
                    letter: b.letter.clone(),
                });
            }
            if let Some(prev) = previous {
                if b.min >= prev {
                    return Err(BandTableError::NotDescending {
                        letter: b.letter.clone(),
                        min: b.min,
                        previous: prev,
                    });
                }
            }
            previous = Some(b.min);
        }
        Ok(Self { bands })
    }

    /// A ≥80, B ≥70, C ≥60, D ≥50, E ≥40, F below.
    pub fn standard() -> Self {
        Self {
            bands: vec![
                GradeBand::new(80.0, "A"),
                GradeBand::new(70.0, "B"),
                GradeBand::new(60.0, "C"),
                GradeBand::new(50.0, "D"),
                GradeBand::new(40.0, "E"),
                GradeBand::new(0.0, "F"),
            ],
        }
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl GradeBander for BandTable {
    fn band(&self, percentage: f64) -> &str {
        self.bands
            .iter()
            .find(|b| percentage >= b.min)
            .or_else(|| self.bands.last())
            .map(|b| b.letter.as_str())
            .unwrap_or_default()
    }

    fn letters(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.letter.clone()).collect()
    }
}
