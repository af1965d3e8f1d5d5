use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Allowed distance between a profile total and 100. Comparisons add
/// `FLOAT_SLACK` on top, so a total that prints as 100.01 but sums to
/// 100.01000000000001 still passes.
pub const SUM_TOLERANCE: f64 = 0.01;

const TARGET_TOTAL: f64 = 100.0;

// Float sums like 10.1 + 89.89 land a hair outside the tolerance band.
const FLOAT_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentCategory {
    Homework,
    Classwork,
    Test,
    Quiz,
    Exam,
    ClassTest,
    MidTerm,
    EndOfTerm,
    Assignment,
    Project,
}

impl AssessmentCategory {
    pub const ALL: [AssessmentCategory; 10] = [
        Self::Homework,
        Self::Classwork,
        Self::Test,
        Self::Quiz,
        Self::Exam,
        Self::ClassTest,
        Self::MidTerm,
        Self::EndOfTerm,
        Self::Assignment,
        Self::Project,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homework => "HOMEWORK",
            Self::Classwork => "CLASSWORK",
            Self::Test => "TEST",
            Self::Quiz => "QUIZ",
            Self::Exam => "EXAM",
            Self::ClassTest => "CLASS_TEST",
            Self::MidTerm => "MID_TERM",
            Self::EndOfTerm => "END_OF_TERM",
            Self::Assignment => "ASSIGNMENT",
            Self::Project => "PROJECT",
        }
    }
}

impl fmt::Display for AssessmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable weight map. Categories that are not present weigh 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights(BTreeMap<AssessmentCategory, f64>);

impl CategoryWeights {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn with(mut self, category: AssessmentCategory, weight: f64) -> Self {
        self.set(category, weight);
        self
    }

    #[allow(dead_code)]
    pub fn set(&mut self, category: AssessmentCategory, weight: f64) {
        self.0.insert(category, weight);
    }

    pub fn get(&self, category: AssessmentCategory) -> f64 {
        self.0.get(&category).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Every category in declaration order, with 0 filled in for gaps.
    pub fn complete(&self) -> CategoryWeights {
        CategoryWeights(
            AssessmentCategory::ALL
                .iter()
                .map(|c| (*c, self.get(*c)))
                .collect(),
        )
    }

    #[allow(dead_code)]
    pub fn iter(&self) -> impl Iterator<Item = (AssessmentCategory, f64)> + '_ {
        self.0.iter().map(|(c, w)| (*c, *w))
    }
}

impl FromIterator<(AssessmentCategory, f64)> for CategoryWeights {
    fn from_iter<I: IntoIterator<Item = (AssessmentCategory, f64)>>(iter: I) -> Self {
        CategoryWeights(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("weight for {0} is not a finite number")]
    NonFiniteWeight(AssessmentCategory),
    #[error("weight for {0} is negative")]
    NegativeWeight(AssessmentCategory),
    #[error("weight for {category} is {weight}, above 100")]
    WeightOutOfRange {
        category: AssessmentCategory,
        weight: f64,
    },
    #[error("weights total {total}, expected 100 ({})", describe_delta(.delta))]
    WeightSumMismatch { total: f64, delta: f64 },
}

fn describe_delta(delta: &f64) -> String {
    let delta = *delta;
    if delta < 0.0 {
        format!("need {}% more", trim_float(-delta))
    } else {
        format!("{}% too much", trim_float(delta))
    }
}

fn trim_float(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NonFiniteWeight(_) => "non_finite_weight",
            Self::NegativeWeight(_) => "negative_weight",
            Self::WeightOutOfRange { .. } => "weight_out_of_range",
            Self::WeightSumMismatch { .. } => "weight_sum_mismatch",
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            Self::NonFiniteWeight(c) | Self::NegativeWeight(c) => {
                serde_json::json!({ "category": c })
            }
            Self::WeightOutOfRange { category, weight } => {
                serde_json::json!({ "category": category, "weight": weight })
            }
            Self::WeightSumMismatch { total, delta } => {
                serde_json::json!({ "total": total, "delta": delta })
            }
        }
    }
}

/// Checks a proposed weight map before it may become a [`WeightProfile`].
///
/// Per-category checks run in category order, so the first offending
/// category is the one reported. Returns the weight total on success.
pub fn validate(weights: &CategoryWeights) -> Result<f64, ValidationError> {
    for category in AssessmentCategory::ALL {
        let w = weights.get(category);
        if !w.is_finite() {
            return Err(ValidationError::NonFiniteWeight(category));
        }
        if w < 0.0 {
            return Err(ValidationError::NegativeWeight(category));
        }
        if w > TARGET_TOTAL + SUM_TOLERANCE + FLOAT_SLACK {
            return Err(ValidationError::WeightOutOfRange {
                category,
                weight: w,
            });
        }
    }

    let total = weights.total();
    let delta = total - TARGET_TOTAL;
    if delta.abs() > SUM_TOLERANCE + FLOAT_SLACK {
        return Err(ValidationError::WeightSumMismatch { total, delta });
    }
    Ok(total)
}

/// A weight map that passed [`validate`]. The only way to obtain one is
/// [`WeightProfile::commit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightProfile(CategoryWeights);

impl WeightProfile {
    pub fn commit(weights: CategoryWeights) -> Result<Self, ValidationError> {
        validate(&weights)?;
        Ok(Self(weights.complete()))
    }

    pub fn weight(&self, category: AssessmentCategory) -> f64 {
        self.0.get(category)
    }

    #[allow(dead_code)]
    pub fn weights(&self) -> &CategoryWeights {
        &self.0
    }

    pub fn total(&self) -> f64 {
        self.0.total()
    }
}

/// Seed weights for a class-subject that has no profile yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultWeightTable(WeightProfile);

impl DefaultWeightTable {
    pub fn new(weights: CategoryWeights) -> Result<Self, ValidationError> {
        WeightProfile::commit(weights).map(Self)
    }

    pub fn standard() -> Self {
        Self(WeightProfile(standard_weights()))
    }

    pub fn profile(&self) -> &WeightProfile {
        &self.0
    }
}

impl Default for DefaultWeightTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_weights() -> CategoryWeights {
    use AssessmentCategory::*;
    [
        (Homework, 10.0),
        (Classwork, 10.0),
        (Test, 10.0),
        (Quiz, 10.0),
        (Exam, 10.0),
        (ClassTest, 10.0),
        (MidTerm, 15.0),
        (EndOfTerm, 15.0),
        (Assignment, 5.0),
        (Project, 5.0),
    ]
    .into_iter()
    .collect()
}
