//! Test utilities for the backbone workspace
//!
//! Common helpers, canned checklists and custom assertions shared by the
//! integration tests of every crate.
//!
//! # Features
//!
//! - **Test Environment**: Isolated temp directories with automatic cleanup
//! - **Checklists**: Record builders, TSV rendering and canned sources
//! - **Graphs**: Ready made usage graphs for walker, chunking and matching tests
//! - **Assertions**: Structural assertions over usage graphs

pub mod assertions;
pub mod environment;
pub mod fixtures;

// Re-export commonly used items
pub use environment::{TestConfig, TestEnvironment};
pub use fixtures::{
    deep_chunk_graph, flat_chunk_graph, normalize_sources, normalize_sources_with, oenanthe_checklist,
    oenanthe_graph, passeriformes_sources, Checklist,
};
pub use assertions::{
    assert_acyclic, assert_classification_follows_parents, assert_parent_chain, assert_synonyms_resolved,
    parent_classification,
};

// Re-export test dependencies for convenience
pub use anyhow::{Context, Result};
pub use tempfile;

use once_cell::sync::OnceCell;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Initialize test logging, safe to call from every test.
///
/// Honours `RUST_LOG`, defaults to `warn`. Output goes through the test
/// writer so it only shows up for failing tests.
pub fn init_test_logging() {
    LOGGING.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Run a test with a clean environment
///
/// # Example
/// ```rust
/// use backbone_test::with_test_env;
///
/// with_test_env(|env| {
///     env.write_file("sources/a.tsv", b"taxonID\tscientificName\n1\tAves\n")?;
///     assert!(env.sources_dir().join("a.tsv").exists());
///     Ok(())
/// })
/// .unwrap();
/// ```
pub fn with_test_env<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&TestEnvironment) -> Result<R>,
{
    let env = TestEnvironment::new()?;
    f(&env)
}

/// Run a test with a configured environment
pub fn with_configured_env<F, R>(config: TestConfig, f: F) -> Result<R>
where
    F: FnOnce(&TestEnvironment) -> Result<R>,
{
    let env = TestEnvironment::with_config(config)?;
    f(&env)
}
