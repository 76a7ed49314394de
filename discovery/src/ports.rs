use async_trait::async_trait;
use common::error::{ExistenceCheckError, SkipStoreError};
use common::repositories::{CollectionManifestFile, ProjectTreeDir, SkipPreferenceFile};
use common::{ArtifactKey, SkipPreferenceEntry, SkipSnapshot};
#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
pub trait CollectionManifest: Send + Sync {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, ExistenceCheckError>;
}

#[cfg_attr(test, automock)]
pub trait ProjectTree: Send + Sync {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, ExistenceCheckError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SkipPreferenceRepository: Send + Sync {
    async fn load(&self, scope_id: &str) -> Result<SkipSnapshot, SkipStoreError>;
    async fn list(&self, scope_id: &str) -> Result<Vec<SkipPreferenceEntry>, SkipStoreError>;
    async fn add(
        &self,
        scope_id: &str,
        key: &ArtifactKey,
        reason: &str,
    ) -> Result<SkipPreferenceEntry, SkipStoreError>;
    async fn remove(&self, scope_id: &str, key: &ArtifactKey) -> Result<bool, SkipStoreError>;
    async fn clear(&self, scope_id: &str) -> Result<usize, SkipStoreError>;
}

impl CollectionManifest for CollectionManifestFile {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, ExistenceCheckError> {
        self.contains(key)
    }
}

impl ProjectTree for ProjectTreeDir {
    fn exists(&self, key: &ArtifactKey) -> Result<bool, ExistenceCheckError> {
        self.contains(key)
    }
}

#[async_trait]
impl SkipPreferenceRepository for SkipPreferenceFile {
    async fn load(&self, scope_id: &str) -> Result<SkipSnapshot, SkipStoreError> {
        SkipPreferenceFile::load(self, scope_id).await
    }

    async fn list(&self, scope_id: &str) -> Result<Vec<SkipPreferenceEntry>, SkipStoreError> {
        SkipPreferenceFile::list(self, scope_id).await
    }

    async fn add(
        &self,
        scope_id: &str,
        key: &ArtifactKey,
        reason: &str,
    ) -> Result<SkipPreferenceEntry, SkipStoreError> {
        SkipPreferenceFile::add(self, scope_id, key, reason).await
    }

    async fn remove(&self, scope_id: &str, key: &ArtifactKey) -> Result<bool, SkipStoreError> {
        SkipPreferenceFile::remove(self, scope_id, key).await
    }

    async fn clear(&self, scope_id: &str) -> Result<usize, SkipStoreError> {
        SkipPreferenceFile::clear(self, scope_id).await
    }
}
