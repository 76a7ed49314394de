use crate::score::ScoreBreakdown;
use chrono::{DateTime, Utc};
use common::settings::DiscoverySettings;
use common::{EntityType, TypeHint};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Candidates deeper than this are excluded before scoring.
    pub max_depth: usize,
    /// Enables project-existence checks and skip lookups for this project.
    pub project_scope_id: Option<String>,
    pub include_skipped: bool,
    pub min_confidence: Option<u8>,
    /// Wall-clock budget for the whole scan; a partial result is returned
    /// when it runs out.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            project_scope_id: None,
            include_skipped: false,
            min_confidence: None,
            timeout: None,
        }
    }
}

impl From<&DiscoverySettings> for DiscoveryOptions {
    fn from(settings: &DiscoverySettings) -> Self {
        Self {
            max_depth: settings.max_depth,
            min_confidence: settings.min_confidence,
            timeout: settings.timeout_ms.map(Duration::from_millis),
            ..Self::default()
        }
    }
}

/// Where an artifact with the same identity already lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExistenceLocation {
    None,
    Collection,
    Project,
    Both,
}

impl ExistenceLocation {
    pub fn from_flags(in_collection: bool, in_project: bool) -> Self {
        match (in_collection, in_project) {
            (true, true) => ExistenceLocation::Both,
            (true, false) => ExistenceLocation::Collection,
            (false, true) => ExistenceLocation::Project,
            (false, false) => ExistenceLocation::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    New,
    SkippedExists { location: ExistenceLocation },
    SkippedByUser { reason: String },
    Failed { error: String },
}

impl ImportStatus {
    /// Reporting precedence: `Failed` > `SkippedByUser` > `SkippedExists` >
    /// `New`.
    pub fn rank(&self) -> u8 {
        match self {
            ImportStatus::New => 0,
            ImportStatus::SkippedExists { .. } => 1,
            ImportStatus::SkippedByUser { .. } => 2,
            ImportStatus::Failed { .. } => 3,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ImportStatus::New)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImportStatus::New => "NEW",
            ImportStatus::SkippedExists { .. } => "SKIPPED_EXISTS",
            ImportStatus::SkippedByUser { .. } => "SKIPPED_BY_USER",
            ImportStatus::Failed { .. } => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_score(normalized: u8) -> Self {
        match normalized {
            80..=u8::MAX => ConfidenceTier::High,
            50..=79 => ConfidenceTier::Medium,
            _ => ConfidenceTier::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

/// A directory that survived structural and depth screening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDirectory {
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub declared_type_hint: TypeHint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredArtifact {
    pub artifact_type: EntityType,
    pub name: String,
    pub path: String,
    pub score: ScoreBreakdown,
    pub tier: ConfidenceTier,
    pub status: ImportStatus,
    /// Informational only.
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SubtreeUnreadable,
    ManifestUnreadable,
    ManifestParse,
    ExistenceCheck,
    DuplicateIdentity,
    SkipPreferencesUnavailable,
    Timeout,
}

/// A recovered problem that reduced the completeness or confidence of a
/// scan without aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub items: Vec<DiscoveredArtifact>,
    /// Candidates after structural, depth and identity screening, before
    /// existence, skip and confidence filtering.
    pub discovered_count: usize,
    /// `NEW` candidates meeting `min_confidence`.
    pub importable_count: usize,
    pub scan_duration_ms: u64,
    pub truncated: bool,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_documented_thresholds() {
        assert_eq!(ConfidenceTier::from_score(100), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(80), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(79), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(50), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(49), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0), ConfidenceTier::Low);
    }

    #[test]
    fn status_rank_orders_failed_highest() {
        let statuses = [
            ImportStatus::New,
            ImportStatus::SkippedExists {
                location: ExistenceLocation::Both,
            },
            ImportStatus::SkippedByUser {
                reason: "noise".to_string(),
            },
            ImportStatus::Failed {
                error: "unreadable".to_string(),
            },
        ];
        let ranks: Vec<u8> = statuses.iter().map(ImportStatus::rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn status_serializes_with_tag_and_payload() -> serde_json::Result<()> {
        let json = serde_json::to_value(ImportStatus::SkippedExists {
            location: ExistenceLocation::Collection,
        })?;
        assert_eq!(json["status"], "SKIPPED_EXISTS");
        assert_eq!(json["location"], "COLLECTION");
        Ok(())
    }

    #[test]
    fn existence_location_from_flags() {
        assert_eq!(ExistenceLocation::from_flags(false, false), ExistenceLocation::None);
        assert_eq!(ExistenceLocation::from_flags(true, true), ExistenceLocation::Both);
        assert_eq!(ExistenceLocation::from_flags(false, true), ExistenceLocation::Project);
    }
}
