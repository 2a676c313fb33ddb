use crate::cli::commands::load_graph;
use crate::cli::output::*;
use anyhow::{Context, Result};
use backbone_core::{Config, Rank};
use backbone_match::{MatchQuery, MatchResult, MatchType, MatchingIndex};
use clap::Args;
use comfy_table::{Cell, Color};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct MatchArgs {
    /// Checklists to normalize, or a single JSON snapshot
    #[arg(required = true, value_name = "TSV")]
    pub sources: Vec<PathBuf>,

    /// Name to match
    #[arg(short, long, conflicts_with = "names", required_unless_present = "names")]
    pub name: Option<String>,

    /// File with one name per line
    #[arg(long, value_name = "FILE")]
    pub names: Option<PathBuf>,

    /// Rank of the names
    #[arg(long)]
    pub rank: Option<Rank>,

    /// Kingdom the names belong to
    #[arg(long)]
    pub kingdom: Option<String>,

    /// Family the names belong to
    #[arg(long)]
    pub family: Option<String>,

    /// Only exact and normalized names, never a higher taxon
    #[arg(long)]
    pub strict: bool,

    /// Show synonyms as their accepted usage
    #[arg(long)]
    pub accepted: bool,

    /// Record how every candidate was scored
    #[arg(long)]
    pub explain: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct NamedResult<'a> {
    query: &'a str,
    #[serde(flatten)]
    result: &'a MatchResult,
}

impl MatchArgs {
    fn query(&self, name: &str) -> MatchQuery {
        let mut query = MatchQuery::new(name);
        if let Some(rank) = self.rank {
            query = query.with_rank(rank);
        }
        if let Some(kingdom) = &self.kingdom {
            query = query.with_kingdom(kingdom);
        }
        if let Some(family) = &self.family {
            query.classification.set(Rank::Family, Some(family.clone()));
        }
        if self.strict {
            query = query.strict();
        }
        if self.explain {
            query = query.verbose();
        }
        query
    }
}

/// Non blank lines that are not `#` comments
pub fn read_names(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub fn run(args: MatchArgs, config: &Config) -> Result<()> {
    let names = match (&args.name, &args.names) {
        (Some(name), _) => vec![name.clone()],
        (None, Some(path)) => read_names(path)?,
        (None, None) => anyhow::bail!("Give a --name or a --names file"),
    };

    let graph = load_graph(&args.sources, &config.normalizer)?;
    let pb = create_spinner("Building matching index...");
    let index = MatchingIndex::build(&graph, config.matching.clone())?;
    pb.set_message(format!("Matching {} names...", format_number(names.len())));

    let results: Vec<MatchResult> = names
        .par_iter()
        .map(|name| {
            let result = index.match_name(&args.query(name));
            if args.accepted {
                result.accepted_view()
            } else {
                result
            }
        })
        .collect();
    pb.finish_and_clear();

    if args.json {
        let named: Vec<NamedResult> = names
            .iter()
            .zip(&results)
            .map(|(query, result)| NamedResult { query, result })
            .collect();
        println!("{}", serde_json::to_string_pretty(&named)?);
        return Ok(());
    }

    print_results(&names, &results);
    if names.len() == 1 && config.output.include_alternatives {
        print_alternatives(&results[0]);
    }
    let matched = results.iter().filter(|r| r.is_match()).count();
    info(&format!("{} of {} names matched", format_number(matched), format_number(names.len())));
    Ok(())
}

fn type_cell(match_type: MatchType) -> Cell {
    let color = match match_type {
        MatchType::Exact => Color::Green,
        MatchType::Fuzzy => Color::Yellow,
        MatchType::HigherRank => Color::Blue,
        MatchType::None => Color::Red,
    };
    Cell::new(match_type).fg(color)
}

fn print_results(names: &[String], results: &[MatchResult]) {
    section_header("Matches");
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Query"),
        header_cell("Type"),
        header_cell("Confidence"),
        header_cell("Id"),
        header_cell("Scientific name"),
        header_cell("Rank"),
        header_cell("Kingdom"),
        header_cell("Accepted"),
        header_cell("Note"),
    ]);
    for (name, result) in names.iter().zip(results) {
        let best = result.best.as_ref();
        table.add_row(vec![
            Cell::new(name),
            type_cell(result.match_type),
            Cell::new(result.confidence),
            Cell::new(or_dash(result.usage_id())),
            Cell::new(result.scientific_name().unwrap_or("-")),
            Cell::new(or_dash(best.and_then(|b| b.usage.rank))),
            Cell::new(or_dash(best.map(|b| b.usage.kingdom))),
            Cell::new(or_dash(best.and_then(|b| b.accepted.as_ref()).map(|a| &a.scientific_name))),
            Cell::new(result.note.as_deref().unwrap_or("")),
        ]);
    }
    println!("{}", table);
}

fn print_alternatives(result: &MatchResult) {
    if result.alternatives.is_empty() {
        return;
    }
    section_header("Alternatives");
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Id"),
        header_cell("Scientific name"),
        header_cell("Rank"),
        header_cell("Status"),
        header_cell("Kingdom"),
        header_cell("Confidence"),
    ]);
    for candidate in &result.alternatives {
        table.add_row(vec![
            Cell::new(candidate.id()),
            Cell::new(&candidate.usage.scientific_name),
            Cell::new(or_dash(candidate.usage.rank)),
            Cell::new(candidate.usage.status),
            Cell::new(candidate.usage.kingdom),
            Cell::new(candidate.confidence),
        ]);
    }
    println!("{}", table);
}
