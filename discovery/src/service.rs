use crate::domain::{Diagnostic, DiagnosticKind, DiscoveryOptions, DiscoveryResult};
use crate::index::ROOT;
use crate::pipeline::Discoverer;
use crate::ports::{CollectionManifest, ProjectTree, SkipPreferenceRepository};
use common::repositories::{CollectionManifestFile, ProjectTreeDir, SkipPreferenceFile};
use common::settings::Settings;
use common::{ArtifactKey, SkipPreferenceEntry, SkipSnapshot};
use std::path::PathBuf;
use std::sync::Arc;

/// Async entry point wiring the stores to the scan.
///
/// The skip list is read once per call, before the scan starts, and the scan
/// itself runs on the blocking pool.
pub struct DiscoveryService {
    collection: Arc<dyn CollectionManifest>,
    skips: Arc<dyn SkipPreferenceRepository>,
    project: Option<Arc<dyn ProjectTree>>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl DiscoveryService {
    pub fn new(
        collection: Arc<dyn CollectionManifest>,
        skips: Arc<dyn SkipPreferenceRepository>,
    ) -> Self {
        Self {
            collection,
            skips,
            project: None,
            pool: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let collection = Arc::new(CollectionManifestFile::load(
            settings.collection.manifest_path.clone(),
        ));
        let skips = Arc::new(SkipPreferenceFile::new(settings.skip_preferences.path.clone()));
        let service = Self::new(collection, skips);
        match settings.discovery.workers {
            Some(workers) => service.with_workers(workers),
            None => Ok(service),
        }
    }

    /// Replaces the deployed tree normally derived from the project scope id
    /// (the project's root path).
    pub fn with_project_tree(mut self, project: Arc<dyn ProjectTree>) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("discovery-{}", i))
            .build()?;
        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    pub async fn discover(
        &self,
        root: impl Into<PathBuf>,
        options: DiscoveryOptions,
    ) -> anyhow::Result<DiscoveryResult> {
        let root = root.into();
        let mut preamble = Vec::new();

        let (snapshot, project) = match &options.project_scope_id {
            Some(scope) => {
                let snapshot = match self.skips.load(scope).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!(scope = %scope, error = %e, "Skip preferences unavailable; scanning without them");
                        preamble.push(Diagnostic::new(
                            DiagnosticKind::SkipPreferencesUnavailable,
                            ROOT,
                            e.to_string(),
                        ));
                        SkipSnapshot::empty()
                    }
                };
                let project = self.project.clone().unwrap_or_else(|| {
                    Arc::new(ProjectTreeDir::new(scope.as_str())) as Arc<dyn ProjectTree>
                });
                (snapshot, Some(project))
            }
            None => (SkipSnapshot::empty(), None),
        };
        tracing::debug!(root = %root.display(), skips = snapshot.len(), "Starting discovery");

        let discoverer = Discoverer::new(self.collection.clone())
            .with_project(project)
            .with_pool(self.pool.clone());
        let mut result =
            tokio::task::spawn_blocking(move || discoverer.discover(&root, &options, &snapshot))
                .await??;

        if !preamble.is_empty() {
            preamble.append(&mut result.diagnostics);
            result.diagnostics = preamble;
        }
        Ok(result)
    }

    pub async fn skip(
        &self,
        scope_id: &str,
        key: &ArtifactKey,
        reason: &str,
    ) -> anyhow::Result<SkipPreferenceEntry> {
        Ok(self.skips.add(scope_id, key, reason).await?)
    }

    pub async fn unskip(&self, scope_id: &str, key: &ArtifactKey) -> anyhow::Result<bool> {
        Ok(self.skips.remove(scope_id, key).await?)
    }

    pub async fn clear_skips(&self, scope_id: &str) -> anyhow::Result<usize> {
        Ok(self.skips.clear(scope_id).await?)
    }

    pub async fn list_skips(&self, scope_id: &str) -> anyhow::Result<Vec<SkipPreferenceEntry>> {
        Ok(self.skips.list(scope_id).await?)
    }
}
