/// Core types shared across all backbone crates
pub mod classification;
pub mod ids;
pub mod name;
pub mod rank;
pub mod status;
pub mod usage;

// Re-export commonly used types at module level
pub use classification::{Classification, ClassificationConflict};
pub use ids::NodeId;
pub use name::{NameParser, NameType, ParsedName};
pub use rank::Rank;
pub use status::{Kingdom, Origin, TaxonomicStatus};
pub use usage::{Usage, UsageLabel};
