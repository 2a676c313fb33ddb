//! Core types shared across all backbone crates

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, save_config, Config};
pub use error::{BackboneError, BackboneResult};

pub use types::{
    Classification, ClassificationConflict, Kingdom, NameParser, NameType, NodeId, Origin,
    ParsedName, Rank, TaxonomicStatus, Usage, UsageLabel,
};

/// Version information for the backbone project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
