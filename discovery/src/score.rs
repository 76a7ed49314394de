//! Multi-signal confidence scoring.
//!
//! Every weight is a named constant and `MAX_RAW_SCORE` is their sum, so a
//! candidate firing every signal normalizes to exactly 100.

use crate::domain::{CandidateDirectory, ConfidenceTier};
use crate::index::{DirEntryInfo, ManifestHint};
use common::domain::artifact::{self, is_kebab_case, is_plain_identifier};
use common::error::ManifestParseError;
use common::{EntityType, TypeHint};
use serde::{Deserialize, Serialize};

pub const DIR_NAME_WEIGHT: i32 = 10;
/// Whitespace-free names that are not kebab-case.
pub const DIR_NAME_PARTIAL_WEIGHT: i32 = DIR_NAME_WEIGHT / 2;
pub const MANIFEST_WEIGHT: i32 = 20;
pub const EXTENSION_WEIGHT: i32 = 5;
pub const PARENT_HINT_WEIGHT: i32 = 15;
pub const FRONTMATTER_WEIGHT: i32 = 15;

pub const MAX_RAW_SCORE: i32 =
    DIR_NAME_WEIGHT + MANIFEST_WEIGHT + EXTENSION_WEIGHT + PARENT_HINT_WEIGHT + FRONTMATTER_WEIGHT;

/// Depth up to which no penalty applies.
pub const PENALTY_FREE_DEPTH: usize = 3;
pub const DEPTH_PENALTY_STEP: i32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub dir_name: i32,
    pub manifest: i32,
    pub extension: i32,
    pub parent_hint: i32,
    pub frontmatter: i32,
    pub depth_penalty: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub dir_name_score: i32,
    pub manifest_score: i32,
    pub extension_score: i32,
    pub parent_hint_score: i32,
    pub frontmatter_score: i32,
    pub depth_penalty: i32,
    pub raw_score: u32,
    pub normalized_score: u8,
}

/// `round(raw / MAX_RAW_SCORE * 100)`, half-up, in integer arithmetic.
pub fn normalize(raw_score: u32) -> u8 {
    let max = MAX_RAW_SCORE as u32;
    let raw = raw_score.min(max);
    ((raw * 100 + max / 2) / max) as u8
}

impl From<Signals> for ScoreBreakdown {
    fn from(s: Signals) -> Self {
        let sum = s.dir_name + s.manifest + s.extension + s.parent_hint + s.frontmatter
            + s.depth_penalty;
        let raw_score = sum.clamp(0, MAX_RAW_SCORE) as u32;
        ScoreBreakdown {
            dir_name_score: s.dir_name,
            manifest_score: s.manifest,
            extension_score: s.extension,
            parent_hint_score: s.parent_hint,
            frontmatter_score: s.frontmatter,
            depth_penalty: s.depth_penalty,
            raw_score,
            normalized_score: normalize(raw_score),
        }
    }
}

impl ScoreBreakdown {
    pub fn tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_score(self.normalized_score)
    }
}

/// A candidate with its resolved identity and score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: CandidateDirectory,
    pub artifact_type: EntityType,
    pub name: String,
    pub score: ScoreBreakdown,
    /// Set when the manifest could not be read at all.
    pub failure: Option<String>,
    /// Set when the manifest was read but its header did not validate.
    pub parse_error: Option<ManifestParseError>,
}

/// The ancestor hint wins; otherwise the type of a manifest present in the
/// directory.
pub fn resolve_type(candidate: &CandidateDirectory, info: &DirEntryInfo) -> TypeHint {
    if let TypeHint::Known(t) = candidate.declared_type_hint {
        return TypeHint::Known(t);
    }
    EntityType::ALL
        .into_iter()
        .find(|t| info.manifest_for(*t).is_some())
        .map(TypeHint::Known)
        .unwrap_or(TypeHint::Unknown)
}

fn dir_name_signal(name: &str) -> i32 {
    if is_kebab_case(name) {
        DIR_NAME_WEIGHT
    } else if is_plain_identifier(name) {
        DIR_NAME_PARTIAL_WEIGHT
    } else {
        0
    }
}

fn extension_signal(entity_type: EntityType, info: &DirEntryInfo) -> i32 {
    let expected = entity_type.expected_extensions();
    let matched = info.files.iter().any(|f| {
        f.rsplit_once('.')
            .map(|(_, ext)| expected.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    });
    if matched {
        EXTENSION_WEIGHT
    } else {
        0
    }
}

pub fn depth_penalty(depth: usize) -> i32 {
    -(DEPTH_PENALTY_STEP * depth.saturating_sub(PENALTY_FREE_DEPTH) as i32)
}

/// Scores one candidate. Returns `None` when no artifact type can be
/// resolved, since such a directory has no identity.
///
/// Pure: depends only on the candidate and its index entry.
pub fn score_candidate(
    candidate: &CandidateDirectory,
    info: &DirEntryInfo,
) -> Option<ScoredCandidate> {
    let artifact_type = resolve_type(candidate, info).known()?;

    let mut signals = Signals {
        dir_name: dir_name_signal(&candidate.name),
        extension: extension_signal(artifact_type, info),
        depth_penalty: depth_penalty(candidate.depth),
        ..Signals::default()
    };
    if candidate.declared_type_hint.known().is_some() {
        signals.parent_hint = PARENT_HINT_WEIGHT;
    }

    let mut name = candidate.name.clone();
    let mut failure = None;
    let mut parse_error = None;

    if let Some(manifest_file) = info.manifest_for(artifact_type) {
        signals.manifest = MANIFEST_WEIGHT;
        match info.manifests.get(manifest_file) {
            Some(ManifestHint::Text(text)) => {
                match artifact::verify_manifest(artifact_type, manifest_file, text) {
                    Ok(frontmatter) => {
                        signals.frontmatter = FRONTMATTER_WEIGHT;
                        if let Some(alias) = frontmatter.alias() {
                            name = alias.to_string();
                        }
                    }
                    Err(e) => parse_error = Some(e),
                }
            }
            Some(ManifestHint::NotUtf8 { valid_up_to }) => {
                parse_error = Some(ManifestParseError::InvalidEncoding {
                    valid_up_to: *valid_up_to,
                });
            }
            Some(ManifestHint::Unreadable(message)) => {
                failure = Some(format!("unreadable manifest {}: {}", manifest_file, message));
            }
            None => {}
        }
    }

    Some(ScoredCandidate {
        candidate: candidate.clone(),
        artifact_type,
        name,
        score: ScoreBreakdown::from(signals),
        failure,
        parse_error,
    })
}
