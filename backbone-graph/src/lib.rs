//! Usage graph of a taxonomic backbone
//!
//! Holds name usages as nodes with parent, synonym and basionym edges,
//! normalizes verbatim checklists into that graph, validates its structure
//! and walks it in taxonomic order.

// Storage
pub mod graph;
pub mod store;

// Ingestion
pub mod normalizer;
pub mod record;

// Validation
pub mod report;
pub mod validator;

// Traversal
pub mod chunking;
pub mod metrics;
pub mod walker;

// Re-export commonly used types
pub use chunking::{ChunkUnit, ChunkingEvaluator};
pub use graph::{Edge, GraphSnapshot, UsageGraph};
pub use metrics::{UsageMetrics, UsageMetricsHandler, WalkStats};
pub use normalizer::{GraphNormalizer, NormalizerResult, NormalizerStats};
pub use record::{TabularRecordReader, VerbatimRecord};
pub use report::{IssueSeverity, ValidationIssue, ValidationReport};
pub use store::{with_transaction, GraphStore, NameMatch, RelType};
pub use validator::{GraphStoreValidator, GraphValidator, TableValidator, UsageRow, UsageTable};
pub use walker::{walk_with_handler, StartEndHandler, TreeWalker, Walk, WalkCursor, WalkEvent};
