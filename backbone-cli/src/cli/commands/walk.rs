use crate::cli::commands::load_graph;
use crate::cli::output::*;
use anyhow::Result;
use backbone_core::{BackboneError, Config, NodeId, Rank, Usage};
use backbone_graph::{walk_with_handler, GraphStore, TreeWalker, UsageGraph, UsageMetricsHandler, WalkEvent};
use clap::Args;
use colored::*;
use std::path::PathBuf;

#[derive(Args)]
pub struct WalkArgs {
    /// Checklists to normalize, or a single JSON snapshot
    #[arg(required = true, value_name = "TSV")]
    pub sources: Vec<PathBuf>,

    /// Leave out synonyms
    #[arg(long)]
    pub accepted: bool,

    /// Only walk the subtree of this usage id
    #[arg(long, value_name = "ID")]
    pub root: Option<u32>,

    /// Do not descend below this rank
    #[arg(long)]
    pub lowest_rank: Option<Rank>,

    /// Print walk statistics at the end
    #[arg(long)]
    pub stats: bool,
}

impl WalkArgs {
    pub fn walker<'g>(&self, graph: &'g UsageGraph) -> Result<TreeWalker<'g>> {
        let mut walker = if self.accepted {
            TreeWalker::accepted(graph)
        } else {
            TreeWalker::full(graph)
        };
        if let Some(root) = self.root {
            let root = NodeId::from(root);
            if graph.node(root).is_none() {
                return Err(BackboneError::NotFound(format!("usage {}", root)).into());
            }
            walker = walker.root(root);
        }
        if let Some(rank) = self.lowest_rank {
            walker = walker.lowest_rank(rank);
        }
        Ok(walker)
    }
}

/// One indented line of the tree
fn tree_line(usage: &Usage, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let rank = usage.rank.map(|r| r.to_string()).unwrap_or_else(|| "unranked".to_string());
    if usage.is_synonym() {
        format!("{}= {} {} [{}]", indent, rank.dimmed(), usage.scientific_name.italic(), usage.id)
    } else {
        format!("{}{} {} [{}]", indent, rank.dimmed(), usage.scientific_name, usage.id)
    }
}

pub fn run(args: WalkArgs, config: &Config) -> Result<()> {
    let graph = load_graph(&args.sources, &config.normalizer)?;
    let walker = args.walker(&graph)?;

    let mut printed = 0usize;
    for event in walker.walk() {
        if let WalkEvent::Start { node, depth } = event {
            if let Some(usage) = graph.node(node) {
                println!("{}", tree_line(usage, depth));
                printed += 1;
            }
        }
    }

    if args.stats {
        let mut metrics = UsageMetricsHandler::new();
        walk_with_handler(&walker, &mut metrics);
        let stats = metrics.stats();
        section_header("Walk");
        tree_item(false, "Usages", Some(&format_number(printed)));
        tree_item(false, "Roots", Some(&format_number(stats.roots)));
        tree_item(false, "Accepted", Some(&format_number(stats.accepted)));
        tree_item(false, "Synonyms", Some(&format_number(stats.synonyms)));
        tree_item(true, "Max depth", Some(&stats.max_depth.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use backbone_core::TaxonomicStatus;

    #[test]
    fn test_tree_line_indents_by_depth() {
        colored::control::set_override(false);
        let usage = Usage::new("Turdus merula", Some(Rank::Species), TaxonomicStatus::Accepted);
        assert_eq!(tree_line(&usage, 2), "    species Turdus merula [0]");

        let synonym = Usage::new("Merula vulgaris", Some(Rank::Species), TaxonomicStatus::Synonym);
        assert_eq!(tree_line(&synonym, 1), "  = species Merula vulgaris [0]");
    }
}
