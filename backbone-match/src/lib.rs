//! Name matching against a built backbone
//!
//! A [`MatchingIndex`] is built once from a committed usage graph and then
//! shared read-only between threads. Queries are scored on name,
//! classification, rank and status similarity; homonyms are resolved
//! through their classification or reported as ambiguous.

pub mod assertions;
pub mod index;
pub mod matcher;
pub mod normalize;
pub mod scoring;
pub mod similarity;
pub mod soundalike;

pub use assertions::{
    read_homonym_assertions, read_homonym_assertions_file, read_usage_assertions, read_usage_assertions_file,
    FixtureRunner, HomonymAssertion, UsageAssertion,
};
pub use index::{IndexEntry, MatchingIndex, NameHit};
pub use matcher::{FactorKind, MatchCandidate, MatchQuery, MatchResult, MatchType, ScoreFactor};
pub use normalize::normalize;
pub use similarity::{DamerauLevenshtein, ScientificNameSimilarity, StringSimilarity, WeightedDamerauLevenshtein};
pub use soundalike::sound_alike;
