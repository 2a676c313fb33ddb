//! Test fixtures and canned checklists
//!
//! Common test data for use across the backbone workspace.

use anyhow::{Context, Result};
use backbone_core::config::NormalizerConfig;
use backbone_core::{Kingdom, NodeId, Rank, TaxonomicStatus, Usage};
use backbone_graph::{
    with_transaction, GraphNormalizer, GraphStore, NormalizerResult, RelType, UsageGraph, VerbatimRecord,
};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column order used when rendering checklists as TSV
pub const TSV_COLUMNS: [&str; 19] = [
    "taxonID",
    "parentNameUsageID",
    "acceptedNameUsageID",
    "originalNameUsageID",
    "parentNameUsage",
    "acceptedNameUsage",
    "originalNameUsage",
    "scientificName",
    "scientificNameAuthorship",
    "taxonRank",
    "verbatimTaxonRank",
    "taxonomicStatus",
    "kingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "subgenus",
];

/// A named source checklist built in code
#[derive(Debug, Clone, Default)]
pub struct Checklist {
    pub source: String,
    pub records: Vec<VerbatimRecord>,
}

impl Checklist {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            records: Vec::new(),
        }
    }

    /// Add a record
    pub fn with(mut self, record: VerbatimRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Add an accepted record below `parent`
    pub fn taxon(self, id: &str, name: &str, rank: &str, parent: Option<&str>) -> Self {
        let mut record = VerbatimRecord::new(id, name).with_rank(rank);
        if let Some(parent) = parent {
            record = record.with_parent(parent);
        }
        self.with(record)
    }

    /// Add a synonym of `accepted`
    pub fn synonym(self, id: &str, name: &str, rank: &str, accepted: &str) -> Self {
        self.with(
            VerbatimRecord::new(id, name)
                .with_rank(rank)
                .with_accepted(accepted)
                .with_status("synonym"),
        )
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records as the stream the normalizer consumes
    pub fn stream(&self) -> impl Iterator<Item = backbone_core::BackboneResult<VerbatimRecord>> + '_ {
        self.records.iter().cloned().map(Ok)
    }

    /// Render as a Darwin Core TSV file with a header row
    pub fn to_tsv(&self) -> String {
        let mut out = TSV_COLUMNS.join("\t");
        out.push('\n');
        for r in &self.records {
            let cells = [
                &r.id,
                &r.parent_id,
                &r.accepted_id,
                &r.basionym_id,
                &r.parent_name,
                &r.accepted_name,
                &r.basionym_name,
                &r.scientific_name,
                &r.authorship,
                &r.taxon_rank,
                &r.verbatim_rank,
                &r.taxonomic_status,
                &r.kingdom,
                &r.phylum,
                &r.class,
                &r.order,
                &r.family,
                &r.genus,
                &r.subgenus,
            ];
            let line: Vec<&str> = cells.iter().map(|c| c.as_deref().unwrap_or("")).collect();
            let _ = writeln!(out, "{}", line.join("\t"));
        }
        out
    }

    /// Write the TSV rendering to `dir/<source>.tsv`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.tsv", self.source));
        std::fs::write(&path, self.to_tsv()).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Normalize sources in order into one graph
pub fn normalize_sources(sources: &[Checklist]) -> Result<(UsageGraph, Vec<NormalizerResult>)> {
    normalize_sources_with(sources, NormalizerConfig::default())
}

pub fn normalize_sources_with(
    sources: &[Checklist],
    config: NormalizerConfig,
) -> Result<(UsageGraph, Vec<NormalizerResult>)> {
    let mut graph = UsageGraph::new();
    let mut results = Vec::with_capacity(sources.len());
    {
        let mut normalizer = GraphNormalizer::new(&mut graph, config);
        for checklist in sources {
            let result = normalizer
                .normalize(&checklist.source, checklist.stream())
                .with_context(|| format!("Failed to normalize {}", checklist.source))?;
            info!("Fixture source {} gave {} usages", checklist.source, result.stats.created);
            results.push(result);
        }
    }
    Ok((graph, results))
}

/// Two accepted genera named Oenanthe, a bird and a plant
pub fn oenanthe_checklist() -> Checklist {
    Checklist::new("oenanthe")
        .taxon("1", "Animalia", "kingdom", None)
        .taxon("2", "Chordata", "phylum", Some("1"))
        .taxon("3", "Aves", "class", Some("2"))
        .taxon("4", "Passeriformes", "order", Some("3"))
        .taxon("5", "Muscicapidae", "family", Some("4"))
        .with(
            VerbatimRecord::new("6", "Oenanthe")
                .with_authorship("Vieillot, 1816")
                .with_rank("genus")
                .with_parent("5"),
        )
        .taxon("7", "Oenanthe oenanthe (Linnaeus, 1758)", "species", Some("6"))
        .taxon("10", "Plantae", "kingdom", None)
        .taxon("11", "Tracheophyta", "phylum", Some("10"))
        .taxon("12", "Magnoliopsida", "class", Some("11"))
        .taxon("13", "Apiales", "order", Some("12"))
        .taxon("14", "Apiaceae", "family", Some("13"))
        .with(
            VerbatimRecord::new("15", "Oenanthe")
                .with_authorship("L.")
                .with_rank("genus")
                .with_parent("14"),
        )
        .taxon("16", "Oenanthe aquatica (L.) Poir.", "species", Some("15"))
        .synonym("17", "Phellandrium aquaticum L.", "species", "16")
}

pub fn oenanthe_graph() -> Result<UsageGraph> {
    let (graph, _) = normalize_sources(&[oenanthe_checklist()])?;
    Ok(graph)
}

/// Source A knows Turdidae directly below Aves, source B adds the order
pub fn passeriformes_sources() -> Vec<Checklist> {
    let a = Checklist::new("A")
        .taxon("1", "Animalia", "kingdom", None)
        .taxon("2", "Aves", "class", Some("1"))
        .taxon("3", "Turdidae", "family", Some("2"))
        .taxon("4", "Turdus", "genus", Some("3"))
        .taxon("5", "Turdus merula Linnaeus, 1758", "species", Some("4"))
        .synonym("6", "Merula vulgaris Leach, 1816", "species", "5");
    let b = Checklist::new("B")
        .taxon("a", "Aves", "class", None)
        .taxon("b", "Passeriformes", "order", Some("a"))
        .taxon("c", "Turdidae", "family", Some("b"))
        .taxon("d", "Turdus", "genus", Some("c"))
        .taxon("e", "Turdus pilaris Linnaeus, 1758", "species", Some("d"));
    vec![a, b]
}

fn accepted(name: &str, rank: Rank) -> Usage {
    Usage::new(name, Some(rank), TaxonomicStatus::Accepted).with_kingdom(Kingdom::Animalia)
}

/// Kingdom, 3 phyla, 4 orders each, 6 families each, 10 genera each and 25
/// species each. Every fourth species carries 3 synonyms.
///
/// Families hold 260 accepted descendants, orders 1566.
pub fn deep_chunk_graph() -> Result<UsageGraph> {
    let mut graph = UsageGraph::new();
    with_transaction(&mut graph, |g| {
        let kingdom = g.create_node(accepted("Animalia", Rank::Kingdom))?;
        for p in 0..3 {
            let phylum = child(g, kingdom, accepted(&format!("Phylum{}", p), Rank::Phylum))?;
            for o in 0..4 {
                let order = child(g, phylum, accepted(&format!("Ordo{}x{}", p, o), Rank::Order))?;
                for f in 0..6 {
                    let family = child(g, order, accepted(&format!("Familia{}x{}x{}", p, o, f), Rank::Family))?;
                    for ge in 0..10 {
                        let genus_name = format!("Genus{}x{}x{}x{}", p, o, f, ge);
                        let genus = child(g, family, accepted(&genus_name, Rank::Genus))?;
                        for s in 0..25 {
                            let species = child(g, genus, accepted(&format!("{} sp{}", genus_name, s), Rank::Species))?;
                            if s % 4 == 0 {
                                for n in 0..3 {
                                    let syn = g.create_node(
                                        Usage::new(
                                            &format!("{} syn{}x{}", genus_name, s, n),
                                            Some(Rank::Species),
                                            TaxonomicStatus::Synonym,
                                        )
                                        .with_kingdom(Kingdom::Animalia),
                                    )?;
                                    g.create_edge(RelType::SynonymOf, syn, species)?;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    })
    .context("Failed to build deep chunk graph")?;
    Ok(graph)
}

/// Kingdom > family > family with 99 child families
pub fn flat_chunk_graph() -> Result<UsageGraph> {
    let mut graph = UsageGraph::new();
    with_transaction(&mut graph, |g| {
        let root = g.create_node(accepted("Animalia", Rank::Kingdom))?;
        let p1 = child(g, root, accepted("Aidae", Rank::Family))?;
        let p2 = child(g, p1, accepted("Bidae", Rank::Family))?;
        for i in 0..99 {
            child(g, p2, accepted(&format!("F{:02}idae", i), Rank::Family))?;
        }
        Ok(())
    })
    .context("Failed to build flat chunk graph")?;
    Ok(graph)
}

fn child(g: &mut UsageGraph, parent: NodeId, usage: Usage) -> backbone_core::BackboneResult<NodeId> {
    let id = g.create_node(usage)?;
    g.create_edge(RelType::ParentOf, parent, id)?;
    Ok(id)
}
