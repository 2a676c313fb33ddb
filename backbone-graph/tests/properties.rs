//! Structural invariants of normalized graphs over arbitrary references

use backbone_graph::{GraphNormalizer, GraphStoreValidator, GraphValidator, IssueSeverity, UsageGraph, VerbatimRecord};
use backbone_test::{
    assert_acyclic, assert_classification_follows_parents, assert_synonyms_resolved, normalize_sources,
    oenanthe_checklist, passeriformes_sources,
};
use proptest::prelude::*;
use rstest::rstest;

const HIGHER_RANKS: [&str; 6] = ["kingdom", "phylum", "class", "order", "family", "genus"];

/// Letters only, the name parser rejects digits
fn genus_name(i: usize) -> String {
    let first = (b'a' + (i / 26) as u8) as char;
    let second = (b'a' + (i % 26) as u8) as char;
    format!("Gen{}{}", first, second)
}

#[derive(Debug, Clone)]
struct Row {
    parent: Option<usize>,
    accepted: Option<usize>,
}

fn rows() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec(
        (prop::option::of(0usize..40), prop::option::weighted(0.3, 0usize..40))
            .prop_map(|(parent, accepted)| Row { parent, accepted }),
        1..40,
    )
}

fn records(rows: &[Row]) -> Vec<VerbatimRecord> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut record = VerbatimRecord::new(&i.to_string(), &genus_name(i)).with_rank("genus");
            if let Some(p) = row.parent {
                record = record.with_parent(&p.to_string());
            }
            if let Some(a) = row.accepted {
                record = record.with_accepted(&a.to_string());
            }
            record
        })
        .collect()
}

/// Trees where every child sits one or more linnean ranks below its parent.
/// A child that would fall below genus starts a new kingdom.
fn ranked_tree() -> impl Strategy<Value = Vec<(Option<usize>, usize)>> {
    prop::collection::vec((any::<prop::sample::Index>(), prop::bool::weighted(0.8), 1usize..3), 1..40).prop_map(
        |draws| {
            let mut nodes: Vec<(Option<usize>, usize)> = Vec::with_capacity(draws.len());
            for (i, (pick, attach, gap)) in draws.into_iter().enumerate() {
                let node = if i > 0 && attach {
                    let parent = pick.index(i);
                    let rank = nodes[parent].1 + gap;
                    if rank < HIGHER_RANKS.len() {
                        (Some(parent), rank)
                    } else {
                        (None, 0)
                    }
                } else {
                    (None, 0)
                };
                nodes.push(node);
            }
            nodes
        },
    )
}

fn ranked_records(nodes: &[(Option<usize>, usize)]) -> Vec<VerbatimRecord> {
    nodes
        .iter()
        .enumerate()
        .map(|(i, (parent, rank))| {
            let mut record = VerbatimRecord::new(&i.to_string(), &genus_name(i)).with_rank(HIGHER_RANKS[*rank]);
            if let Some(p) = parent {
                record = record.with_parent(&p.to_string());
            }
            record
        })
        .collect()
}

#[rstest]
#[case::merged_sources(passeriformes_sources())]
#[case::homonyms(vec![oenanthe_checklist()])]
fn test_classification_follows_parents(#[case] sources: Vec<backbone_test::Checklist>) {
    let (graph, _) = normalize_sources(&sources).unwrap();
    assert_classification_follows_parents(&graph);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn normalized_graph_is_a_forest(rows in rows()) {
        let mut graph = UsageGraph::new();
        let result = GraphNormalizer::new(&mut graph, Default::default())
            .normalize("random", records(&rows).into_iter().map(Ok))
            .unwrap();

        assert_acyclic(&graph);
        assert_synonyms_resolved(&graph);
        prop_assert_eq!(result.stats.records, rows.len());

        let report = GraphStoreValidator::new(&graph).validate();
        prop_assert_eq!(report.count(IssueSeverity::Critical), 0);
        prop_assert_eq!(report.by_component("synonyms").count(), 0);
        prop_assert_eq!(report.by_component("self_loop").count(), 0);
    }

    #[test]
    fn classification_follows_parents(nodes in ranked_tree()) {
        let mut graph = UsageGraph::new();
        let result = GraphNormalizer::new(&mut graph, Default::default())
            .normalize("ranked", ranked_records(&nodes).into_iter().map(Ok))
            .unwrap();
        prop_assert_eq!(result.stats.records, nodes.len());
        assert_classification_follows_parents(&graph);
    }

    #[test]
    fn rejected_references_are_reported(rows in rows()) {
        let mut graph = UsageGraph::new();
        let result = GraphNormalizer::new(&mut graph, Default::default())
            .normalize("random", records(&rows).into_iter().map(Ok))
            .unwrap();
        let dangling = rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let missing = |x: &Option<usize>| x.is_some_and(|x| x >= rows.len() && x != i);
                // synonyms with a resolvable accepted id never look at their parent
                let parent_read = r.accepted.map_or(true, |a| a == i || a >= rows.len());
                usize::from(missing(&r.accepted)) + usize::from(parent_read && missing(&r.parent))
            })
            .sum::<usize>();
        prop_assert_eq!(result.report.by_component("DanglingReference").count(), dangling);
    }
}
