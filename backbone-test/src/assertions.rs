//! Custom assertions for testing
//!
//! Structural checks over usage graphs that panic with a readable message.

use backbone_core::Classification;
use backbone_graph::{GraphStore, UsageGraph};
use std::collections::HashSet;

/// Assert that no parent chain loops back on itself
pub fn assert_acyclic(graph: &UsageGraph) {
    for id in graph.node_ids() {
        let mut seen = HashSet::from([id]);
        let mut current = graph.parent(id);
        while let Some(p) = current {
            assert!(seen.insert(p), "parent cycle through usage {}", id);
            current = graph.parent(p);
        }
    }
}

/// Assert that every live synonym points to at least one accepted usage and
/// no accepted usage carries a synonym edge
pub fn assert_synonyms_resolved(graph: &UsageGraph) {
    for usage in graph.usages() {
        let targets = graph.accepted(usage.id);
        if usage.is_synonym() {
            assert!(!targets.is_empty(), "synonym {} has no accepted usage", usage);
            for t in targets {
                let target = graph.node(*t).expect("accepted target exists");
                assert!(!target.is_synonym(), "synonym {} points to synonym {}", usage, target);
                assert!(!target.superseded, "synonym {} points to superseded {}", usage, target);
            }
            assert!(graph.children(usage.id).is_empty(), "synonym {} has children", usage);
        } else {
            assert!(targets.is_empty(), "{} {} has an accepted usage", usage.status, usage);
        }
    }
}

/// Assert the canonical names of the ancestors of the single usage called
/// `name`, nearest first
pub fn assert_parent_chain(graph: &UsageGraph, name: &str, expected: &[&str]) {
    let ids: Vec<_> = graph
        .usages()
        .filter(|u| u.name() == name)
        .map(|u| u.id)
        .collect();
    assert_eq!(ids.len(), 1, "expected a single usage named {}, found {}", name, ids.len());
    let chain = graph.parent_chain_names(ids[0]);
    assert_eq!(chain, expected, "parent chain of {}", name);
}

/// Higher taxa of a usage collected from itself and its parent chain, the
/// nearest name per rank
pub fn parent_classification(graph: &UsageGraph, id: backbone_core::NodeId) -> Classification {
    let mut expected = Classification::new();
    for node in std::iter::once(id).chain(graph.ancestors(id)) {
        let usage = graph.node(node).expect("ancestor exists");
        if let Some(rank) = usage.rank {
            if expected.get(rank).is_none() {
                expected.set(rank, Some(usage.name().to_string()));
            }
        }
    }
    expected
}

/// Assert that the classification of every accepted usage is exactly what
/// its parent chain gives
pub fn assert_classification_follows_parents(graph: &UsageGraph) {
    for usage in graph.usages().filter(|u| !u.is_synonym()) {
        assert_eq!(
            usage.classification,
            parent_classification(graph, usage.id),
            "classification of {}",
            usage
        );
    }
}
