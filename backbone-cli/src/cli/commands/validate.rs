use crate::cli::commands::load_graph;
use crate::cli::commands::normalize::write_report;
use crate::cli::output::*;
use crate::cli::ValidationFailed;
use anyhow::{Context, Result};
use backbone_core::Config;
use backbone_graph::{
    GraphStoreValidator, GraphValidator, IssueSeverity, TableValidator, UsageTable, ValidationReport,
};
use backbone_match::{read_homonym_assertions_file, read_usage_assertions_file, FixtureRunner, MatchingIndex};
use clap::{Args, ValueEnum};
use colored::*;
use comfy_table::Cell;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Query the usage graph directly
    Graph,
    /// Query a relational projection of the graph
    Table,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Checklists to normalize, or a single JSON snapshot
    #[arg(required = true, value_name = "TSV")]
    pub sources: Vec<PathBuf>,

    /// Usage assertions to check
    #[arg(long, value_name = "TSV")]
    pub fixture: Option<PathBuf>,

    /// Homonym counts to check, as rank;name;count lines
    #[arg(long, value_name = "FILE")]
    pub homonyms: Option<PathBuf>,

    /// Validator backend
    #[arg(long, value_enum, default_value = "graph")]
    pub backend: Backend,

    /// Write the validation report
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

pub fn run(args: ValidateArgs, config: &Config) -> Result<()> {
    let graph = load_graph(&args.sources, &config.normalizer)?;
    let table;
    let validator: Box<dyn GraphValidator + '_> = match args.backend {
        Backend::Graph => Box::new(GraphStoreValidator::new(&graph)),
        Backend::Table => {
            table = UsageTable::from_graph(&graph);
            Box::new(TableValidator::new(&table))
        }
    };

    let pb = create_spinner("Validating structure...");
    let mut report = validator.validate();

    if let Some(path) = &args.fixture {
        pb.set_message("Checking usage assertions...");
        let assertions =
            read_usage_assertions_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
        report.merge(FixtureRunner::new(validator.as_ref()).run_usages(&assertions));
    }
    if let Some(path) = &args.homonyms {
        pb.set_message("Checking homonym counts...");
        let assertions =
            read_homonym_assertions_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let index = MatchingIndex::build(&graph, config.matching.clone())?;
        report.merge(
            FixtureRunner::new(validator.as_ref())
                .with_index(&index)
                .run_homonyms(&assertions),
        );
    }
    pb.finish_and_clear();

    print_report(&report, validator.backend_name());
    if let Some(path) = &args.report {
        write_report(&report, path, &config.output.format)?;
        success(&format!("Report written to {}", path.display()));
    }

    if !report.is_valid() {
        return Err(ValidationFailed {
            issues: report.count(IssueSeverity::Error) + report.count(IssueSeverity::Critical),
        }
        .into());
    }
    success("Backbone is valid");
    Ok(())
}

fn severity_cell(severity: IssueSeverity) -> Cell {
    let color = match severity {
        IssueSeverity::Warning => comfy_table::Color::Yellow,
        IssueSeverity::Error => comfy_table::Color::Red,
        IssueSeverity::Critical => comfy_table::Color::Magenta,
    };
    Cell::new(severity.as_str()).fg(color)
}

fn print_report(report: &ValidationReport, backend: &str) {
    section_header(&format!("Validation ({} backend)", backend));
    tree_item(false, "Warnings", Some(&report.count(IssueSeverity::Warning).to_string()));
    tree_item(false, "Errors", Some(&report.count(IssueSeverity::Error).to_string()));
    tree_item(true, "Critical", Some(&report.count(IssueSeverity::Critical).to_string()));

    if report.is_empty() {
        return;
    }
    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Check"),
        header_cell("Usage"),
        header_cell("Description"),
    ]);
    for issue in &report.issues {
        table.add_row(vec![
            severity_cell(issue.severity),
            Cell::new(&issue.component),
            Cell::new(or_dash(issue.node)),
            Cell::new(&issue.description),
        ]);
    }
    println!("{}", table);
    if !report.is_valid() {
        println!("{}", "Backbone is invalid".red().bold());
    }
}
