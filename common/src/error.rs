use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure to start a scan. Nothing else aborts discovery.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),
    #[error("scan root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("scan root is not readable: {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestParseError {
    #[error("Missing frontmatter")]
    MissingFrontmatter,
    #[error("Failed to parse YAML frontmatter: {0}")]
    InvalidYaml(String),
    #[error("Frontmatter is not a mapping")]
    NotAMapping,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Failed to parse JSON manifest: {0}")]
    InvalidJson(String),
    #[error("Manifest is not valid UTF-8 (invalid byte at offset {valid_up_to})")]
    InvalidEncoding { valid_up_to: usize },
}

/// Raised by collection/project readers. The existence resolver treats it as
/// "not present".
#[derive(Debug, Error)]
pub enum ExistenceCheckError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum SkipStoreError {
    #[error("skip preference file I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("skip preference file {} is corrupt: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize skip preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid artifact key '{0}', expected <type>:<name>")]
    InvalidKey(String),
}
