use crate::domain::entity::ArtifactKey;
use crate::domain::skip::{SkipPreferenceEntry, SkipSnapshot};
use crate::error::SkipStoreError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SkipDocument {
    #[serde(default, rename = "skip")]
    entries: Vec<SkipPreferenceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

#[derive(Debug)]
struct CachedDocument {
    stamp: Option<FileStamp>,
    document: Arc<SkipDocument>,
}

/// Skip preferences for every project scope, persisted as one TOML file.
///
/// Parsed contents are cached keyed by the file's modification time and
/// size, so repeated loads of an unchanged file skip the parse.
pub struct SkipPreferenceFile {
    path: PathBuf,
    cache: Mutex<Option<CachedDocument>>,
    write_lock: Mutex<()>,
}

impl SkipPreferenceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    fn io_error(&self, source: std::io::Error) -> SkipStoreError {
        SkipStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn stamp(&self) -> Result<Option<FileStamp>, SkipStoreError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(Some(FileStamp {
                modified: meta.modified().map_err(|e| self.io_error(e))?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn read_document(&self) -> Result<Arc<SkipDocument>, SkipStoreError> {
        let stamp = self.stamp().await?;
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.stamp == stamp {
                return Ok(cached.document.clone());
            }
        }

        let document = match stamp {
            None => SkipDocument::default(),
            Some(_) => {
                let raw = tokio::fs::read_to_string(&self.path)
                    .await
                    .map_err(|e| self.io_error(e))?;
                toml::from_str(&raw).map_err(|source| SkipStoreError::Parse {
                    path: self.path.clone(),
                    source,
                })?
            }
        };
        let document = Arc::new(document);
        tracing::debug!(
            path = %self.path.display(),
            entries = document.entries.len(),
            "Parsed skip preference file"
        );
        *cache = Some(CachedDocument {
            stamp,
            document: document.clone(),
        });
        Ok(document)
    }

    async fn write_document(&self, document: SkipDocument) -> Result<(), SkipStoreError> {
        let body = toml::to_string_pretty(&document)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }
        let tmp = self.path.with_extension("toml.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        let stamp = self.stamp().await?;
        *self.cache.lock().await = Some(CachedDocument {
            stamp,
            document: Arc::new(document),
        });
        Ok(())
    }

    /// One immutable snapshot of a scope's entries.
    pub async fn load(&self, scope_id: &str) -> Result<SkipSnapshot, SkipStoreError> {
        Ok(SkipSnapshot::from_entries(self.list(scope_id).await?))
    }

    pub async fn list(&self, scope_id: &str) -> Result<Vec<SkipPreferenceEntry>, SkipStoreError> {
        let document = self.read_document().await?;
        let mut entries: Vec<_> = document
            .entries
            .iter()
            .filter(|e| e.project_scope_id == scope_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.artifact_key.cmp(&b.artifact_key));
        Ok(entries)
    }

    /// Adds or replaces the entry for `key` within `scope_id`.
    pub async fn add(
        &self,
        scope_id: &str,
        key: &ArtifactKey,
        reason: &str,
    ) -> Result<SkipPreferenceEntry, SkipStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = (*self.read_document().await?).clone();
        document
            .entries
            .retain(|e| !(e.project_scope_id == scope_id && &e.artifact_key == key));
        let entry = SkipPreferenceEntry {
            project_scope_id: scope_id.to_string(),
            artifact_key: key.clone(),
            reason: reason.to_string(),
            added_at: chrono::Utc::now(),
        };
        document.entries.push(entry.clone());
        self.write_document(document).await?;
        tracing::info!(scope = %scope_id, key = %key, "Added skip preference");
        Ok(entry)
    }

    /// Returns whether an entry was removed.
    pub async fn remove(&self, scope_id: &str, key: &ArtifactKey) -> Result<bool, SkipStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = (*self.read_document().await?).clone();
        let before = document.entries.len();
        document
            .entries
            .retain(|e| !(e.project_scope_id == scope_id && &e.artifact_key == key));
        if document.entries.len() == before {
            return Ok(false);
        }
        self.write_document(document).await?;
        tracing::info!(scope = %scope_id, key = %key, "Removed skip preference");
        Ok(true)
    }

    /// Removes every entry of `scope_id`, returning how many were dropped.
    pub async fn clear(&self, scope_id: &str) -> Result<usize, SkipStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = (*self.read_document().await?).clone();
        let before = document.entries.len();
        document.entries.retain(|e| e.project_scope_id != scope_id);
        let removed = before - document.entries.len();
        if removed > 0 {
            self.write_document(document).await?;
        }
        tracing::info!(scope = %scope_id, removed, "Cleared skip preferences");
        Ok(removed)
    }
}
