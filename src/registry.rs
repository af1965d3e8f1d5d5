use crate::weights::{validate, CategoryWeights, DefaultWeightTable, ValidationError, WeightProfile};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileState {
    Draft,
    Committed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEntry {
    pub committed: WeightProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<CategoryWeights>,
}

impl ProfileEntry {
    fn seeded(defaults: &DefaultWeightTable) -> Self {
        Self {
            committed: defaults.profile().clone(),
            committed_at: None,
            draft: None,
        }
    }

    pub fn state(&self) -> ProfileState {
        if self.draft.is_some() {
            ProfileState::Draft
        } else {
            ProfileState::Committed
        }
    }

    pub fn to_json(&self, class_subject_id: &str) -> serde_json::Value {
        json!({
            "classSubjectId": class_subject_id,
            "state": self.state(),
            "committed": self.committed,
            "committedTotal": self.committed.total(),
            "committedAt": self.committed_at,
            "draft": self.draft.as_ref().map(CategoryWeights::complete),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommitError {
    #[error("no draft to commit")]
    NoDraft,
    #[error(transparent)]
    Invalid(ValidationError),
}

/// Active weight profile per class-subject. Lives only as long as the
/// process; writers race last-write-wins.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    entries: HashMap<String, ProfileEntry>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing entry, or a fresh one committed with the default table.
    pub fn entry(&mut self, class_subject_id: &str, defaults: &DefaultWeightTable) -> &ProfileEntry {
        self.entry_mut(class_subject_id, defaults)
    }

    fn entry_mut(&mut self, class_subject_id: &str, defaults: &DefaultWeightTable) -> &mut ProfileEntry {
        self.entries
            .entry(class_subject_id.to_string())
            .or_insert_with(|| {
                tracing::info!(class_subject = class_subject_id, "seeding default weight profile");
                ProfileEntry::seeded(defaults)
            })
    }

    /// Stores weights as a pending draft. Drafts are never validated
    /// here; the returned outcome is for display.
    pub fn save_draft(
        &mut self,
        class_subject_id: &str,
        weights: CategoryWeights,
        defaults: &DefaultWeightTable,
    ) -> Result<f64, ValidationError> {
        let outcome = validate(&weights);
        self.entry_mut(class_subject_id, defaults).draft = Some(weights);
        outcome
    }

    pub fn discard_draft(&mut self, class_subject_id: &str, defaults: &DefaultWeightTable) -> &ProfileEntry {
        let entry = self.entry_mut(class_subject_id, defaults);
        entry.draft = None;
        entry
    }

    /// Validates `weights` (or the pending draft) and makes it the
    /// committed profile. A rejected commit changes nothing.
    pub fn commit(
        &mut self,
        class_subject_id: &str,
        weights: Option<CategoryWeights>,
        defaults: &DefaultWeightTable,
    ) -> Result<&ProfileEntry, CommitError> {
        let entry = self.entry_mut(class_subject_id, defaults);
        let candidate = match weights {
            Some(w) => w,
            None => entry.draft.clone().ok_or(CommitError::NoDraft)?,
        };

        let profile = match WeightProfile::commit(candidate) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(class_subject = class_subject_id, error = %e, "weight profile commit rejected");
                return Err(CommitError::Invalid(e));
            }
        };

        tracing::info!(
            class_subject = class_subject_id,
            total = profile.total(),
            "weight profile committed"
        );
        entry.committed = profile;
        entry.committed_at = Some(chrono::Utc::now().to_rfc3339());
        entry.draft = None;
        Ok(entry)
    }
}
