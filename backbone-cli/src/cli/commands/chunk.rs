use crate::cli::commands::load_graph;
use crate::cli::output::*;
use anyhow::Result;
use backbone_core::config::ChunkingConfig;
use backbone_core::Config;
use backbone_graph::{walk_with_handler, ChunkUnit, ChunkingEvaluator, GraphStore, TreeWalker, UsageMetricsHandler};
use clap::Args;
use comfy_table::Cell;
use std::path::PathBuf;

#[derive(Args)]
pub struct ChunkArgs {
    /// Checklists to normalize, or a single JSON snapshot
    #[arg(required = true, value_name = "TSV")]
    pub sources: Vec<PathBuf>,

    /// Smallest subtree worth a chunk of its own
    #[arg(long = "min", value_name = "N")]
    pub min_chunk_size: Option<usize>,

    /// Largest subtree processed as one chunk
    #[arg(long = "size", value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Only print the summary
    #[arg(long)]
    pub summary: bool,
}

impl ChunkArgs {
    /// Command line sizes override the configured ones
    pub fn chunking(&self, config: &ChunkingConfig) -> ChunkingConfig {
        ChunkingConfig {
            min_chunk_size: self.min_chunk_size.unwrap_or(config.min_chunk_size),
            chunk_size: self.chunk_size.unwrap_or(config.chunk_size),
        }
    }
}

pub fn run(args: ChunkArgs, config: &Config) -> Result<()> {
    let chunking = args.chunking(&config.chunking);
    chunking.validate()?;

    let graph = load_graph(&args.sources, &config.normalizer)?;
    let walker = TreeWalker::full(&graph);

    let pb = create_spinner("Collecting subtree sizes...");
    let mut metrics = UsageMetricsHandler::new();
    walk_with_handler(&walker, &mut metrics);
    let evaluator = ChunkingEvaluator::from_config(metrics, &chunking)?;
    let units: Vec<ChunkUnit> = evaluator.chunks(&walker).collect();
    pb.finish_and_clear();

    let clades = units.iter().filter(|u| u.is_clade()).count();
    if !args.summary {
        section_header("Chunks");
        let mut table = create_standard_table();
        table.set_header(vec![
            header_cell("Unit"),
            header_cell("Id"),
            header_cell("Rank"),
            header_cell("Scientific name"),
            header_cell("Size"),
        ]);
        for unit in &units {
            let usage = graph.node(unit.node());
            let (kind, size) = match unit {
                ChunkUnit::Clade { size, .. } => ("clade", format_number(*size)),
                ChunkUnit::Single(_) => ("single", "1".to_string()),
            };
            table.add_row(vec![
                Cell::new(kind),
                Cell::new(unit.node()),
                Cell::new(or_dash(usage.and_then(|u| u.rank))),
                Cell::new(usage.map(|u| u.scientific_name.as_str()).unwrap_or("-")),
                Cell::new(size),
            ]);
        }
        println!("{}", table);
    }

    section_header("Summary");
    tree_item(false, "Min chunk size", Some(&chunking.min_chunk_size.to_string()));
    tree_item(false, "Chunk size", Some(&chunking.chunk_size.to_string()));
    tree_item(false, "Clade chunks", Some(&format_number(clades)));
    tree_item(true, "Single usages", Some(&format_number(units.len() - clades)));
    Ok(())
}
