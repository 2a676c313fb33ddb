//! Chunk partitioning over canned trees

use backbone_core::{NodeId, Rank};
use backbone_graph::{
    walk_with_handler, ChunkUnit, ChunkingEvaluator, GraphStore, TreeWalker, UsageGraph, UsageMetricsHandler,
};
use backbone_test::{deep_chunk_graph, flat_chunk_graph, init_test_logging};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::{HashMap, HashSet};

fn evaluator(graph: &UsageGraph, min: usize, size: usize) -> ChunkingEvaluator {
    let mut metrics = UsageMetricsHandler::new();
    walk_with_handler(&TreeWalker::full(graph), &mut metrics);
    ChunkingEvaluator::new(metrics, min, size).unwrap()
}

#[test]
fn test_deep_tree_chunks_at_families() {
    init_test_logging();
    let graph = deep_chunk_graph().unwrap();
    let eval = evaluator(&graph, 50, 500);
    let units: Vec<ChunkUnit> = eval.chunks(&TreeWalker::full(&graph)).collect();

    let clades: Vec<&ChunkUnit> = units.iter().filter(|u| u.is_clade()).collect();
    assert_eq!(clades.len(), 72);
    assert_eq!(units.len() - clades.len(), 16);
    for clade in clades {
        let usage = graph.node(clade.node()).unwrap();
        assert_eq!(usage.rank, Some(Rank::Family));
        assert_eq!(*clade, ChunkUnit::Clade { root: usage.id, size: 260 });
    }
    // the walk is depth first, so the first clade follows kingdom, phylum and order
    assert!(!units[0].is_clade());
    assert!(!units[2].is_clade());
    assert!(units[3].is_clade());
}

#[test]
fn test_every_accepted_node_covered_once() {
    let graph = deep_chunk_graph().unwrap();
    let eval = evaluator(&graph, 50, 500);
    let covered: usize = eval
        .chunks(&TreeWalker::accepted(&graph))
        .map(|u| match u {
            ChunkUnit::Clade { size, .. } => size + 1,
            ChunkUnit::Single(_) => 1,
        })
        .sum();
    let synonyms = 720 * 7 * 3;
    assert_eq!(covered, graph.usages().count() - synonyms);
    assert_eq!(covered, 18808);
}

/// Members of every unit, a clade with its whole accepted subtree
fn unit_members(graph: &UsageGraph, units: &[ChunkUnit]) -> Vec<HashSet<NodeId>> {
    units
        .iter()
        .map(|unit| match unit {
            ChunkUnit::Clade { root, .. } => TreeWalker::accepted(graph).root(*root).nodes().collect(),
            ChunkUnit::Single(node) => HashSet::from([*node]),
        })
        .collect()
}

#[rstest]
#[case::deep_families(deep_chunk_graph().unwrap(), 50, 500)]
#[case::deep_genera(deep_chunk_graph().unwrap(), 20, 30)]
#[case::flat(flat_chunk_graph().unwrap(), 5, 10)]
fn test_clades_are_never_split(#[case] graph: UsageGraph, #[case] min: usize, #[case] size: usize) {
    let eval = evaluator(&graph, min, size);
    let units: Vec<ChunkUnit> = eval.chunks(&TreeWalker::accepted(&graph)).collect();
    let members = unit_members(&graph, &units);

    let mut owner: HashMap<NodeId, usize> = HashMap::new();
    for (i, set) in members.iter().enumerate() {
        for node in set {
            if let Some(other) = owner.insert(*node, i) {
                panic!("usage {} is in unit {:?} and unit {:?}", node, units[other], units[i]);
            }
        }
    }
    // no unit root lies inside another clade
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(owner[&unit.node()], i, "{:?}", unit);
    }
    let accepted: HashSet<NodeId> = TreeWalker::accepted(&graph).nodes().collect();
    assert_eq!(owner.len(), accepted.len());
}

#[test]
fn test_flat_tree() {
    let graph = flat_chunk_graph().unwrap();
    let eval = evaluator(&graph, 5, 10);
    let units: Vec<ChunkUnit> = eval.chunks(&TreeWalker::full(&graph)).collect();
    assert_eq!(units.iter().filter(|u| u.is_clade()).count(), 1);
    assert_eq!(units.iter().filter(|u| !u.is_clade()).count(), 2);
}

#[test]
fn test_chunk_sizes_follow_config() {
    let graph = deep_chunk_graph().unwrap();
    // synonyms count for their species, so a genus holds 25
    let eval = evaluator(&graph, 20, 30);
    let units: Vec<ChunkUnit> = eval.chunks(&TreeWalker::full(&graph)).collect();
    let clades = units.iter().filter(|u| u.is_clade()).count();
    assert_eq!(clades, 720);
}
