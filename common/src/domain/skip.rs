use super::entity::ArtifactKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user's request to hide an artifact from future scans of one project
/// scope. Entries never expire; they are removed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPreferenceEntry {
    pub project_scope_id: String,
    pub artifact_key: ArtifactKey,
    pub reason: String,
    pub added_at: DateTime<Utc>,
}

/// Immutable view of the skip list for a single scan.
#[derive(Debug, Clone, Default)]
pub struct SkipSnapshot {
    entries: HashMap<ArtifactKey, SkipPreferenceEntry>,
}

impl SkipSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = SkipPreferenceEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.artifact_key.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&SkipPreferenceEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
