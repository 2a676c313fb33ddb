pub mod chunk;
pub mod matching;
pub mod normalize;
pub mod validate;
pub mod walk;

use crate::cli::output::create_spinner;
use anyhow::{Context, Result};
use backbone_core::config::NormalizerConfig;
use backbone_graph::{GraphNormalizer, NormalizerResult, TabularRecordReader, UsageGraph};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of a source checklist, taken from its file name
pub fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_snapshot(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Normalize the checklists in order into one graph
pub fn normalize_sources(paths: &[PathBuf], config: &NormalizerConfig) -> Result<(UsageGraph, Vec<NormalizerResult>)> {
    let mut graph = UsageGraph::new();
    let mut results = Vec::with_capacity(paths.len());
    {
        let mut normalizer = GraphNormalizer::new(&mut graph, config.clone());
        for path in paths {
            let source = source_name(path);
            let pb = create_spinner(&format!("Normalizing {}...", source));
            let reader = TabularRecordReader::from_path(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let result = normalizer
                .normalize(&source, reader)
                .with_context(|| format!("Failed to normalize {}", path.display()))?;
            pb.finish_and_clear();
            info!("{} gave {} new and {} merged usages", source, result.stats.created, result.stats.merged);
            results.push(result);
        }
    }
    Ok((graph, results))
}

/// A graph from a single JSON snapshot or from normalizing checklists
pub fn load_graph(paths: &[PathBuf], config: &NormalizerConfig) -> Result<UsageGraph> {
    if let [path] = paths {
        if is_snapshot(path) {
            let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let graph = UsageGraph::from_json(&json).with_context(|| format!("Failed to load {}", path.display()))?;
            return Ok(graph);
        }
    }
    let (graph, _) = normalize_sources(paths, config)?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name() {
        assert_eq!(source_name(Path::new("/data/col.tsv")), "col");
        assert_eq!(source_name(Path::new("itis")), "itis");
    }

    #[test]
    fn test_snapshot_detection() {
        assert!(is_snapshot(Path::new("backbone.json")));
        assert!(is_snapshot(Path::new("backbone.JSON")));
        assert!(!is_snapshot(Path::new("backbone.tsv")));
    }
}
