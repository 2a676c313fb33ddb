//! Multi source normalization

use backbone_core::{Classification, Kingdom, NodeId, Origin, Rank, TaxonomicStatus};
use std::collections::BTreeMap;
use backbone_graph::{
    GraphNormalizer, GraphStore, GraphStoreValidator, GraphValidator, NameMatch, TabularRecordReader, UsageGraph,
};
use backbone_test::{
    assert_acyclic, assert_parent_chain, assert_synonyms_resolved, init_test_logging, normalize_sources,
    oenanthe_graph, passeriformes_sources, with_test_env,
};
use pretty_assertions::assert_eq;

fn only(graph: &UsageGraph, name: &str) -> backbone_core::NodeId {
    let ids = graph.find_by_name(name, NameMatch::Canonical);
    assert_eq!(ids.len(), 1, "{}", name);
    ids[0]
}

#[test]
fn test_second_source_patches_classification_gap() {
    init_test_logging();
    let (graph, results) = normalize_sources(&passeriformes_sources()).unwrap();

    assert_eq!(results[0].stats.created, 6);
    assert_eq!(results[1].stats.merged, 3);
    assert_eq!(results[1].stats.created, 2);

    assert_parent_chain(&graph, "Turdus merula", &["Turdus", "Turdidae", "Passeriformes", "Aves", "Animalia"]);
    assert_parent_chain(&graph, "Turdus pilaris", &["Turdus", "Turdidae", "Passeriformes", "Aves", "Animalia"]);

    let merula = graph.node(only(&graph, "Turdus merula")).unwrap();
    assert_eq!(merula.source, "A");
    assert_eq!(merula.classification.get(Rank::Order), Some("Passeriformes"));
    assert_eq!(merula.classification.get(Rank::Family), Some("Turdidae"));
    assert_eq!(merula.kingdom, Kingdom::Animalia);

    let turdus = graph.node(only(&graph, "Turdus")).unwrap();
    assert_eq!(turdus.merged_ids, vec!["B:d".to_string()]);

    // the synonym shares the classification of its accepted name
    let synonym = graph.node(only(&graph, "Merula vulgaris")).unwrap();
    assert_eq!(synonym.classification.get(Rank::Order), Some("Passeriformes"));

    assert_eq!(graph.roots().len(), 1);
    assert_acyclic(&graph);
    assert_synonyms_resolved(&graph);
}

#[test]
fn test_second_source_only_fills_the_missing_order() {
    init_test_logging();
    let sources = passeriformes_sources();
    let mut graph = UsageGraph::new();
    let mut normalizer = GraphNormalizer::new(&mut graph, Default::default());
    normalizer.normalize(&sources[0].source, sources[0].stream()).unwrap();

    let before: BTreeMap<NodeId, (String, Classification)> = normalizer
        .graph()
        .usages()
        .map(|u| (u.id, (u.name().to_string(), u.classification.clone())))
        .collect();
    assert!(before.values().all(|(_, cl)| cl.order.is_none()));

    normalizer.normalize(&sources[1].source, sources[1].stream()).unwrap();
    let below_order = ["Turdidae", "Turdus", "Turdus merula", "Merula vulgaris"];
    for (id, (name, old)) in &before {
        let now = &normalizer.graph().node(*id).unwrap().classification;
        let mut expected = old.clone();
        if below_order.contains(&name.as_str()) {
            expected.order = Some("Passeriformes".to_string());
        }
        assert_eq!(now, &expected, "classification of {}", name);
    }
}

#[test]
fn test_normalized_sources_validate() {
    let (graph, _) = normalize_sources(&passeriformes_sources()).unwrap();
    let report = GraphStoreValidator::new(&graph).validate();
    assert!(report.is_empty(), "{}", report.render_text());

    let (graph, _) = normalize_sources(&[backbone_test::oenanthe_checklist()]).unwrap();
    let report = GraphStoreValidator::new(&graph).validate();
    assert!(report.is_valid(), "{}", report.render_text());
}

#[test]
fn test_homonyms_stay_apart() {
    let graph = oenanthe_graph().unwrap();
    let genera = graph.find_by_canonical_and_rank("Oenanthe", Some(Rank::Genus));
    assert_eq!(genera.len(), 2);
    let mut families: Vec<String> = genera
        .iter()
        .map(|id| graph.node(*id).unwrap().classification.get(Rank::Family).unwrap().to_string())
        .collect();
    families.sort();
    assert_eq!(families, vec!["Apiaceae", "Muscicapidae"]);

    let synonym = graph.node(only(&graph, "Phellandrium aquaticum")).unwrap();
    assert_eq!(synonym.status, TaxonomicStatus::Synonym);
    assert_eq!(synonym.kingdom, Kingdom::Plantae);
}

#[test]
fn test_tsv_source_round_trip() {
    with_test_env(|env| {
        let sources = passeriformes_sources();
        let paths: Vec<_> = sources
            .iter()
            .map(|c| c.write_to(&env.sources_dir()))
            .collect::<Result<_, _>>()?;

        let mut graph = UsageGraph::new();
        {
            let mut normalizer = GraphNormalizer::new(&mut graph, Default::default());
            for (checklist, path) in sources.iter().zip(&paths) {
                let reader = TabularRecordReader::from_path(path)?;
                normalizer.normalize(&checklist.source, reader)?;
            }
        }
        let (expected, _) = normalize_sources(&sources)?;
        assert_eq!(graph.to_snapshot(), expected.to_snapshot());
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_snapshot_round_trip_keeps_graph() {
    let (graph, _) = normalize_sources(&passeriformes_sources()).unwrap();
    let json = graph.to_json().unwrap();
    let back = UsageGraph::from_json(&json).unwrap();
    assert_eq!(back.to_snapshot(), graph.to_snapshot());
    let merula = only(&back, "Turdus merula");
    assert_eq!(back.parent_chain_names(merula), graph.parent_chain_names(merula));
}

#[test]
fn test_corrupt_second_source_keeps_first() {
    with_test_env(|env| {
        let sources = passeriformes_sources();
        let mut graph = UsageGraph::new();
        let mut normalizer = GraphNormalizer::new(&mut graph, Default::default());
        normalizer.normalize(&sources[0].source, sources[0].stream())?;
        let before = normalizer.graph().to_snapshot();

        // the third row has one cell too many
        let path = env.write_file(
            "sources/broken.tsv",
            b"taxonID\tscientificName\ttaxonRank\n1\tPasseriformes\torder\n2\tTurdidae\tfamily\textra\n",
        )?;
        let err = normalizer
            .normalize("broken", TabularRecordReader::from_path(path)?)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(normalizer.graph().to_snapshot(), before);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_origin_counts() {
    let (_, results) = normalize_sources(&[backbone_test::Checklist::new("flat")
        .with(
            backbone_graph::VerbatimRecord::new("1", "Abies alba Mill.")
                .with_rank("species")
                .with_higher(Rank::Kingdom, "Plantae")
                .with_higher(Rank::Family, "Pinaceae"),
        )
        .with(backbone_graph::VerbatimRecord::new("2", "Abies alba var. acutifolia").with_parent("1"))])
    .unwrap();
    let stats = &results[0].stats;
    assert_eq!(stats.count_by_origin(Origin::Source), 2);
    // kingdom and family from the flat fields, genus implied by the binomial
    assert_eq!(stats.count_by_origin(Origin::DenormedClassification), 2);
    assert_eq!(stats.count_by_origin(Origin::ImplicitName), 1);
    assert_eq!(stats.count_by_origin(Origin::Autonym), 1);
    assert_eq!(stats.max_depth, 4);
}
