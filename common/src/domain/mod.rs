pub mod artifact;
pub mod entity;
pub mod markdown;
pub mod skip;
