pub mod classify;
pub mod domain;
pub mod existence;
pub mod index;
pub mod pipeline;
pub mod ports;
pub mod score;
pub mod service;


pub use domain::{
    ConfidenceTier, Diagnostic, DiagnosticKind, DiscoveredArtifact, DiscoveryOptions,
    DiscoveryResult, ExistenceLocation, ImportStatus,
};
pub use pipeline::Discoverer;
pub use score::ScoreBreakdown;
pub use service::DiscoveryService;
