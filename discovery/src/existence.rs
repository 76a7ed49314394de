use crate::domain::{Diagnostic, DiagnosticKind, ExistenceLocation};
use crate::ports::{CollectionManifest, ProjectTree};
use common::error::ExistenceCheckError;
use common::ArtifactKey;

/// Pre-scan lookup of where an identity already lives.
///
/// Advisory only: a reader that fails is treated as "not present" and the
/// failure is recorded as a diagnostic.
pub struct ExistenceResolver<'a> {
    collection: &'a dyn CollectionManifest,
    project: Option<&'a dyn ProjectTree>,
}

impl<'a> ExistenceResolver<'a> {
    pub fn new(collection: &'a dyn CollectionManifest, project: Option<&'a dyn ProjectTree>) -> Self {
        Self {
            collection,
            project,
        }
    }

    pub fn resolve(
        &self,
        key: &ArtifactKey,
        path: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ExistenceLocation {
        let in_collection = tolerate(self.collection.exists(key), "collection", key, path, diagnostics);
        let in_project = match self.project {
            Some(project) => tolerate(project.exists(key), "project", key, path, diagnostics),
            None => false,
        };
        ExistenceLocation::from_flags(in_collection, in_project)
    }
}

fn tolerate(
    outcome: Result<bool, ExistenceCheckError>,
    source: &str,
    key: &ArtifactKey,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    match outcome {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(key = %key, source, error = %e, "Existence check failed; treating as not present");
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::ExistenceCheck,
                path,
                format!("{} check for {} failed: {}", source, key, e),
            ));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockCollectionManifest, MockProjectTree};
    use common::EntityType;
    use std::path::PathBuf;

    fn key() -> ArtifactKey {
        ArtifactKey::new(EntityType::Skill, "pdf")
    }

    #[test]
    fn combines_collection_and_project_presence() {
        let mut collection = MockCollectionManifest::new();
        collection.expect_exists().returning(|_| Ok(true));
        let mut project = MockProjectTree::new();
        project.expect_exists().returning(|_| Ok(true));

        let resolver = ExistenceResolver::new(&collection, Some(&project));
        let mut diagnostics = Vec::new();
        assert_eq!(
            resolver.resolve(&key(), "skills/pdf", &mut diagnostics),
            ExistenceLocation::Both
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn project_check_is_skipped_without_scope() {
        let mut collection = MockCollectionManifest::new();
        collection.expect_exists().returning(|_| Ok(false));

        let resolver = ExistenceResolver::new(&collection, None);
        let mut diagnostics = Vec::new();
        assert_eq!(
            resolver.resolve(&key(), "skills/pdf", &mut diagnostics),
            ExistenceLocation::None
        );
    }

    #[test]
    fn reader_failures_degrade_to_not_present() {
        let mut collection = MockCollectionManifest::new();
        collection.expect_exists().returning(|_| {
            Err(ExistenceCheckError::Parse {
                path: PathBuf::from("collection.toml"),
                message: "bad".to_string(),
            })
        });
        let mut project = MockProjectTree::new();
        project.expect_exists().times(1).returning(|_| Ok(true));

        let resolver = ExistenceResolver::new(&collection, Some(&project));
        let mut diagnostics = Vec::new();
        assert_eq!(
            resolver.resolve(&key(), "skills/pdf", &mut diagnostics),
            ExistenceLocation::Project
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ExistenceCheck);
    }
}
