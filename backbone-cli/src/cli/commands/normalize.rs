use crate::cli::commands::normalize_sources;
use crate::cli::output::*;
use anyhow::{Context, Result};
use backbone_core::Config;
use backbone_graph::{IssueSeverity, NormalizerResult, ValidationReport};
use clap::Args;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct NormalizeArgs {
    /// Tab separated checklists, in priority order
    #[arg(required = true, value_name = "TSV")]
    pub sources: Vec<PathBuf>,

    /// Write a JSON snapshot of the built graph
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Write the normalization report
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Normalize every source into its own graph, in parallel
    #[arg(long, conflicts_with = "json")]
    pub separate: bool,
}

pub fn run(args: NormalizeArgs, config: &Config) -> Result<()> {
    let results = if args.separate {
        args.sources
            .par_iter()
            .map(|path| {
                normalize_sources(std::slice::from_ref(path), &config.normalizer)
                    .map(|(_, mut results)| results.remove(0))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        let (graph, results) = normalize_sources(&args.sources, &config.normalizer)?;
        if let Some(path) = &args.json {
            let json = graph.to_json()?;
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            success(&format!("Snapshot written to {}", path.display()));
        }
        results
    };

    print_stats(&results);

    let mut report = ValidationReport::new();
    for result in &results {
        report.merge(result.report.clone());
    }
    if let Some(path) = &args.report {
        write_report(&report, path, &config.output.format)?;
        success(&format!("Report written to {}", path.display()));
    }
    if report.count(IssueSeverity::Warning) > 0 {
        warning(&format!(
            "{} warnings while normalizing {} sources",
            report.count(IssueSeverity::Warning),
            args.sources.len()
        ));
    }
    Ok(())
}

fn print_stats(results: &[NormalizerResult]) {
    section_header("Normalization");
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Records"),
        header_cell("Created"),
        header_cell("Merged"),
        header_cell("Ignored"),
        header_cell("Synonyms"),
        header_cell("Roots"),
        header_cell("Depth"),
        header_cell("Issues"),
    ]);
    for result in results {
        let stats = &result.stats;
        table.add_row(vec![
            stats.source.clone(),
            format_number(stats.records),
            format_number(stats.created),
            format_number(stats.merged),
            format_number(stats.ignored),
            format_number(stats.synonyms),
            format_number(stats.roots),
            stats.max_depth.to_string(),
            format_number(result.report.len()),
        ]);
    }
    println!("{}", table);

    for result in results {
        if !result.stats.cycles.is_empty() {
            warning(&format!(
                "{}: cut synonym cycles at {}",
                result.stats.source,
                result.stats.cycles.join(", ")
            ));
        }
    }
}

/// Write a report as JSON for `.json` files or when configured, as text otherwise
pub fn write_report(report: &ValidationReport, path: &Path, format: &str) -> Result<()> {
    let json = format.eq_ignore_ascii_case("json")
        || path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let content = if json { report.to_json()? } else { report.render_text() };
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
