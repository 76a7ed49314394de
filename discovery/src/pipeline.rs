//! The discovery orchestrator.
//!
//! Screening order is fixed and lives in [`screen_directory`]: root-skip,
//! structural skip (plugin, container, artifact interior), depth-skip. Type
//! resolution and scoring only see what survives, then existence, skip
//! preferences and confidence filters annotate the survivors.

use crate::classify::{self, DirRole};
use crate::domain::{
    CandidateDirectory, Diagnostic, DiagnosticKind, DiscoveredArtifact, DiscoveryOptions,
    DiscoveryResult, ExistenceLocation, ImportStatus,
};
use crate::existence::ExistenceResolver;
use crate::index::{self, DirectoryIndex};
use crate::ports::{CollectionManifest, ProjectTree};
use crate::score::{self, ScoredCandidate};
use chrono::Utc;
use common::error::ScanError;
use common::{infer_type, ArtifactKey, SkipSnapshot};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Root,
    Structural(DirRole),
    TooDeep { depth: usize },
    Candidate(CandidateDirectory),
}

/// Decides whether `path` may be scored. The checks run in a fixed order and
/// must not be reordered: container filtering has to precede depth
/// filtering, which has to precede scoring.
pub fn screen_directory(index: &DirectoryIndex, path: &str, max_depth: usize) -> Screening {
    match classify::classify(index, path) {
        DirRole::Root => return Screening::Root,
        DirRole::Candidate => {}
        role => return Screening::Structural(role),
    }

    let depth = index::path_depth(path);
    if depth > max_depth {
        return Screening::TooDeep { depth };
    }

    Screening::Candidate(CandidateDirectory {
        path: path.to_string(),
        name: index::leaf_name(path).to_string(),
        depth,
        declared_type_hint: infer_type(path),
    })
}

enum Outcome {
    Scored(ScoredCandidate),
    Unclassified,
    TimedOut,
}

pub struct Discoverer {
    collection: Arc<dyn CollectionManifest>,
    project: Option<Arc<dyn ProjectTree>>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Discoverer {
    pub fn new(collection: Arc<dyn CollectionManifest>) -> Self {
        Self {
            collection,
            project: None,
            pool: None,
        }
    }

    /// Deployed project tree consulted when the options carry a project
    /// scope.
    pub fn with_project(mut self, project: Option<Arc<dyn ProjectTree>>) -> Self {
        self.project = project;
        self
    }

    /// Fixed-size pool for scoring; the global rayon pool otherwise.
    pub fn with_pool(mut self, pool: Option<Arc<rayon::ThreadPool>>) -> Self {
        self.pool = pool;
        self
    }

    /// Scans `root` and classifies every importable artifact candidate.
    ///
    /// `skips` is the caller's snapshot of the skip list for the scan's
    /// project scope; it is consulted, never reloaded, during the run.
    pub fn discover(
        &self,
        root: &Path,
        options: &DiscoveryOptions,
        skips: &SkipSnapshot,
    ) -> Result<DiscoveryResult, ScanError> {
        let started = Instant::now();
        let deadline = options.timeout.map(|t| started + t);
        let discovered_at = Utc::now();

        let index = DirectoryIndex::build(root, options.max_depth.saturating_add(1), deadline)?;
        let mut diagnostics = index.diagnostics().to_vec();
        let mut truncated = index.truncated();

        let candidates: Vec<CandidateDirectory> = index
            .paths()
            .filter_map(|path| match screen_directory(&index, path, options.max_depth) {
                Screening::Candidate(c) => Some(c),
                other => {
                    tracing::debug!(path, screening = ?other, "Directory screened out");
                    None
                }
            })
            .collect();

        let outcomes = self.score_all(&index, &candidates, deadline);

        let mut scored = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Outcome::Scored(s) => scored.push(s),
                Outcome::Unclassified => {}
                Outcome::TimedOut => truncated = true,
            }
        }
        if truncated && !diagnostics.iter().any(|d| d.kind == DiagnosticKind::Timeout) {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::Timeout,
                index::ROOT,
                "scoring stopped at the scan deadline",
            ));
        }
        scored.sort_by(|a, b| a.candidate.path.cmp(&b.candidate.path));

        for s in &scored {
            if let Some(e) = &s.parse_error {
                tracing::warn!(path = %s.candidate.path, error = %e, "Manifest frontmatter did not validate");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ManifestParse,
                    s.candidate.path.clone(),
                    e.to_string(),
                ));
            }
        }

        let unique = deduplicate(scored, &mut diagnostics);
        let discovered_count = unique.len();

        let project = match (&options.project_scope_id, &self.project) {
            (Some(_), Some(project)) => Some(project.as_ref()),
            _ => None,
        };
        let resolver = ExistenceResolver::new(self.collection.as_ref(), project);

        let mut items: Vec<DiscoveredArtifact> = unique
            .into_values()
            .map(|s| {
                let key = ArtifactKey::new(s.artifact_type, s.name.clone());
                let status = assign_status(&s, &key, &resolver, skips, &mut diagnostics);
                DiscoveredArtifact {
                    artifact_type: s.artifact_type,
                    name: s.name,
                    path: s.candidate.path,
                    tier: s.score.tier(),
                    score: s.score,
                    status,
                    discovered_at,
                }
            })
            .collect();

        if let Some(min) = options.min_confidence {
            items.retain(|item| item.score.normalized_score >= min);
        }
        let importable_count = items.iter().filter(|i| i.status.is_new()).count();
        if !options.include_skipped {
            items.retain(|item| item.status.is_new());
        }
        items.sort_by(|a, b| {
            b.score
                .normalized_score
                .cmp(&a.score.normalized_score)
                .then_with(|| a.path.cmp(&b.path))
        });

        let scan_duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            root = %root.display(),
            directories = index.len(),
            discovered_count,
            importable_count,
            returned = items.len(),
            truncated,
            scan_duration_ms,
            "Discovery finished"
        );

        Ok(DiscoveryResult {
            items,
            discovered_count,
            importable_count,
            scan_duration_ms,
            truncated,
            diagnostics,
        })
    }

    fn score_all(
        &self,
        index: &DirectoryIndex,
        candidates: &[CandidateDirectory],
        deadline: Option<Instant>,
    ) -> Vec<Outcome> {
        let score_one = |candidate: &CandidateDirectory| {
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                return Outcome::TimedOut;
            }
            match index
                .get(&candidate.path)
                .and_then(|info| score::score_candidate(candidate, info))
            {
                Some(s) => Outcome::Scored(s),
                None => Outcome::Unclassified,
            }
        };
        match &self.pool {
            Some(pool) => pool.install(|| candidates.par_iter().map(score_one).collect()),
            None => candidates.par_iter().map(score_one).collect(),
        }
    }
}

/// Keeps one candidate per identity: highest normalized score, then the
/// lexicographically smallest path.
fn deduplicate(
    scored: Vec<ScoredCandidate>,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<ArtifactKey, ScoredCandidate> {
    let mut unique: BTreeMap<ArtifactKey, ScoredCandidate> = BTreeMap::new();
    for s in scored {
        let key = ArtifactKey::new(s.artifact_type, s.name.clone());
        let Some(existing) = unique.get(&key) else {
            unique.insert(key, s);
            continue;
        };
        let replace = s.score.normalized_score > existing.score.normalized_score
            || (s.score.normalized_score == existing.score.normalized_score
                && s.candidate.path < existing.candidate.path);
        let (kept, dropped) = if replace {
            (s.candidate.path.clone(), existing.candidate.path.clone())
        } else {
            (existing.candidate.path.clone(), s.candidate.path.clone())
        };
        tracing::warn!(key = %key, kept = %kept, dropped = %dropped, "Duplicate artifact identity; keeping best candidate");
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DuplicateIdentity,
            dropped,
            format!("{} is also discovered at {}", key, kept),
        ));
        if replace {
            unique.insert(key, s);
        }
    }
    unique
}

fn assign_status(
    scored: &ScoredCandidate,
    key: &ArtifactKey,
    resolver: &ExistenceResolver<'_>,
    skips: &SkipSnapshot,
    diagnostics: &mut Vec<Diagnostic>,
) -> ImportStatus {
    if let Some(error) = &scored.failure {
        return ImportStatus::Failed {
            error: error.clone(),
        };
    }
    let location = resolver.resolve(key, &scored.candidate.path, diagnostics);
    let existing = (location != ExistenceLocation::None)
        .then_some(ImportStatus::SkippedExists { location });
    let skipped = skips.get(key).map(|entry| ImportStatus::SkippedByUser {
        reason: entry.reason.clone(),
    });
    existing
        .into_iter()
        .chain(skipped)
        .max_by_key(ImportStatus::rank)
        .unwrap_or(ImportStatus::New)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockCollectionManifest;
    use crate::score::{ScoreBreakdown, Signals};
    use common::{EntityType, SkipPreferenceEntry, TypeHint};
    use std::fs;

    fn index_of(files: &[&str]) -> anyhow::Result<(tempfile::TempDir, DirectoryIndex)> {
        let dir = tempfile::tempdir()?;
        for rel in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, "")?;
        }
        let index = DirectoryIndex::build(dir.path(), 10, None)?;
        Ok((dir, index))
    }

    #[test]
    fn screening_runs_structure_before_depth() -> anyhow::Result<()> {
        let (_dir, index) = index_of(&[
            "a/b/c/pkg/commands/deploy/COMMAND.md",
            "a/b/c/pkg/agents/helper/AGENT.md",
        ])?;
        // Too deep and a container: the structural verdict wins.
        assert_eq!(
            screen_directory(&index, "a/b/c/pkg/commands", 2),
            Screening::Structural(DirRole::Container)
        );
        assert_eq!(
            screen_directory(&index, "a/b/c/pkg/commands/deploy", 2),
            Screening::TooDeep { depth: 6 }
        );
        assert_eq!(screen_directory(&index, index::ROOT, 2), Screening::Root);
        Ok(())
    }

    #[test]
    fn candidate_at_max_depth_is_kept() -> anyhow::Result<()> {
        let (_dir, index) = index_of(&["x/skills/pdf/SKILL.md", "x/skills/pdf-more/y/SKILL.md"])?;
        match screen_directory(&index, "x/skills/pdf", 3) {
            Screening::Candidate(c) => {
                assert_eq!(c.depth, 3);
                assert_eq!(c.name, "pdf");
            }
            other => panic!("unexpected screening {:?}", other),
        }
        assert_eq!(
            screen_directory(&index, "x/skills/pdf-more/y", 3),
            Screening::TooDeep { depth: 4 }
        );
        Ok(())
    }

    fn scored(path: &str, failure: Option<&str>) -> ScoredCandidate {
        ScoredCandidate {
            candidate: CandidateDirectory {
                path: path.to_string(),
                name: index::leaf_name(path).to_string(),
                depth: index::path_depth(path),
                declared_type_hint: TypeHint::Known(EntityType::Skill),
            },
            artifact_type: EntityType::Skill,
            name: index::leaf_name(path).to_string(),
            score: ScoreBreakdown::from(Signals {
                manifest: 20,
                ..Signals::default()
            }),
            failure: failure.map(str::to_string),
            parse_error: None,
        }
    }

    #[test]
    fn unreadable_manifest_fails_before_any_lookup() {
        // No expectations: the collection must not be consulted.
        let collection = MockCollectionManifest::new();
        let resolver = ExistenceResolver::new(&collection, None);
        let candidate = scored("skills/pdf", Some("permission denied"));
        let key = ArtifactKey::new(EntityType::Skill, "pdf");
        let skips = SkipSnapshot::from_entries(vec![SkipPreferenceEntry {
            project_scope_id: "proj".to_string(),
            artifact_key: key.clone(),
            reason: "r".to_string(),
            added_at: Utc::now(),
        }]);

        let status = assign_status(&candidate, &key, &resolver, &skips, &mut Vec::new());
        assert_eq!(
            status,
            ImportStatus::Failed {
                error: "permission denied".to_string()
            }
        );
    }

    #[test]
    fn user_skip_outranks_existing_copy() {
        let mut collection = MockCollectionManifest::new();
        collection.expect_exists().returning(|_| Ok(true));
        let resolver = ExistenceResolver::new(&collection, None);
        let candidate = scored("skills/pdf", None);
        let key = ArtifactKey::new(EntityType::Skill, "pdf");
        let skips = SkipSnapshot::from_entries(vec![SkipPreferenceEntry {
            project_scope_id: "proj".to_string(),
            artifact_key: key.clone(),
            reason: "vendored".to_string(),
            added_at: Utc::now(),
        }]);

        let status = assign_status(&candidate, &key, &resolver, &skips, &mut Vec::new());
        assert_eq!(
            status,
            ImportStatus::SkippedByUser {
                reason: "vendored".to_string()
            }
        );

        let status = assign_status(
            &candidate,
            &key,
            &resolver,
            &SkipSnapshot::empty(),
            &mut Vec::new(),
        );
        assert_eq!(
            status,
            ImportStatus::SkippedExists {
                location: ExistenceLocation::Collection
            }
        );
    }

    #[test]
    fn higher_score_wins_duplicate_identity() {
        let mut weak = scored("a/skills/pdf", None);
        weak.score = ScoreBreakdown::from(Signals {
            manifest: 20,
            depth_penalty: -5,
            ..Signals::default()
        });
        let strong = scored("z/skills/pdf", None);
        let mut diagnostics = Vec::new();

        let unique = deduplicate(vec![weak, strong], &mut diagnostics);

        assert_eq!(unique.len(), 1);
        let kept = unique.values().next().map(|s| s.candidate.path.as_str());
        assert_eq!(kept, Some("z/skills/pdf"));
        assert_eq!(diagnostics[0].path, "a/skills/pdf");
    }
}
