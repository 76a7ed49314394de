pub mod domain;
pub mod error;
pub mod repositories;
pub mod settings;

pub use domain::entity::{infer_type, ArtifactKey, EntityType, TypeHint};
pub use domain::skip::{SkipPreferenceEntry, SkipSnapshot};
