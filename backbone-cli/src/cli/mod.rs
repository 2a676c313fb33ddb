pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use backbone_core::{load_config, Config};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "backbone",
    version,
    about = "Build, check and query a taxonomic backbone",
    long_about = "Backbone normalizes tab separated checklists into a single usage graph, \
                  validates its structure against fixtures, matches names against it and \
                  partitions it into clade aligned chunks."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE", env = "BACKBONE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize checklists into one usage graph
    Normalize(commands::normalize::NormalizeArgs),

    /// Check graph structure and fixture assertions
    Validate(commands::validate::ValidateArgs),

    /// Match names against the backbone
    Match(commands::matching::MatchArgs),

    /// Print the tree in taxonomic order
    Walk(commands::walk::WalkArgs),

    /// Partition the tree into chunks
    Chunk(commands::chunk::ChunkArgs),
}

/// Raised when a validation run found errors
#[derive(Debug, thiserror::Error)]
#[error("validation failed with {issues} errors")]
pub struct ValidationFailed {
    pub issues: usize,
}

/// Configuration file if given, defaults otherwise
pub fn load_settings(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            load_config(path).with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}
