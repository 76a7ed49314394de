use crate::domain::entity::{ArtifactKey, EntityType};
use crate::error::ExistenceCheckError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionArtifact {
    #[serde(rename = "type")]
    pub artifact_type: EntityType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionDocument {
    #[serde(default)]
    pub artifacts: Vec<CollectionArtifact>,
}

#[derive(Debug)]
enum LoadState {
    Loaded(HashSet<ArtifactKey>),
    Unreadable(ErrorKind, String),
    Corrupt(String),
}

/// The user's collection manifest, read once and held as a key set.
///
/// A missing file is an empty collection. An unreadable or corrupt file
/// is remembered and reported on every lookup so callers can degrade.
#[derive(Debug)]
pub struct CollectionManifestFile {
    path: PathBuf,
    state: LoadState,
}

impl CollectionManifestFile {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str::<CollectionDocument>(&raw) {
                Ok(doc) => LoadState::Loaded(
                    doc.artifacts
                        .into_iter()
                        .map(|a| ArtifactKey::new(a.artifact_type, a.name))
                        .collect(),
                ),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Collection manifest is corrupt");
                    LoadState::Corrupt(e.to_string())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Collection manifest not found; treating collection as empty");
                LoadState::Loaded(HashSet::new())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Collection manifest is unreadable");
                LoadState::Unreadable(e.kind(), e.to_string())
            }
        };
        Self { path, state }
    }

    pub fn contains(&self, key: &ArtifactKey) -> Result<bool, ExistenceCheckError> {
        match &self.state {
            LoadState::Loaded(keys) => Ok(keys.contains(key)),
            LoadState::Unreadable(kind, message) => Err(ExistenceCheckError::Io {
                path: self.path.clone(),
                source: std::io::Error::new(*kind, message.clone()),
            }),
            LoadState::Corrupt(message) => Err(ExistenceCheckError::Parse {
                path: self.path.clone(),
                message: message.clone(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        match &self.state {
            LoadState::Loaded(keys) => keys.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_is_an_empty_collection() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let manifest = CollectionManifestFile::load(dir.path().join("collection.toml"));
        assert!(manifest.is_empty());
        assert!(!manifest.contains(&ArtifactKey::new(EntityType::Skill, "pdf"))?);
        Ok(())
    }

    #[test]
    fn loaded_manifest_answers_by_type_and_name() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("collection.toml");
        std::fs::write(
            &path,
            "[[artifacts]]\ntype = \"skill\"\nname = \"pdf\"\nsource = \"acme/skills/pdf\"\n\n[[artifacts]]\ntype = \"agent\"\nname = \"helper\"\n",
        )?;
        let manifest = CollectionManifestFile::load(&path);
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains(&ArtifactKey::new(EntityType::Skill, "pdf"))?);
        assert!(!manifest.contains(&ArtifactKey::new(EntityType::Command, "pdf"))?);
        Ok(())
    }

    #[test]
    fn corrupt_manifest_reports_parse_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("collection.toml");
        std::fs::write(&path, "[[artifacts]\ntype = ")?;
        let manifest = CollectionManifestFile::load(&path);
        let err = manifest
            .contains(&ArtifactKey::new(EntityType::Skill, "pdf"))
            .unwrap_err();
        assert!(matches!(err, ExistenceCheckError::Parse { .. }));
        Ok(())
    }
}
