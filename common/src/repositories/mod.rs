pub mod collection;
pub mod project;
pub mod skip_preferences;

pub use collection::CollectionManifestFile;
pub use project::ProjectTreeDir;
pub use skip_preferences::SkipPreferenceFile;
