use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;

use crate::cli::{Cli, Commands, ValidationFailed};
use backbone_core::BackboneError;

fn init_logging(verbose: u8) {
    // RUST_LOG wins, then BACKBONE_LOG, then the -v level
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("BACKBONE_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<ValidationFailed>().is_some() {
        return 5;
    }
    match e.downcast_ref::<BackboneError>() {
        Some(BackboneError::Configuration(_)) => 2,
        Some(BackboneError::Io(_)) => 3,
        Some(BackboneError::Parse(_)) | Some(BackboneError::CorruptStream(_)) => 4,
        _ => match e.downcast_ref::<std::io::Error>() {
            Some(_) => 3,
            None => 1,
        },
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()?;
    }
    let config = cli::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Normalize(args) => crate::cli::commands::normalize::run(args, &config),
        Commands::Validate(args) => crate::cli::commands::validate::run(args, &config),
        Commands::Match(args) => crate::cli::commands::matching::run(args, &config),
        Commands::Walk(args) => crate::cli::commands::walk::run(args, &config),
        Commands::Chunk(args) => crate::cli::commands::chunk::run(args, &config),
    }
}
