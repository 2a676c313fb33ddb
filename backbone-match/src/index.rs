//! Immutable name index built from a finished backbone graph
//!
//! Every active usage is indexed under its lower case canonical name, the
//! normalized key and the sound-alike key of that normalized key. Trigram
//! postings over the normalized keys feed the edit distance search.
//! Superseded usages are only kept for lookups by id.

use crate::matcher::MatchType;
use crate::normalize::{expand_umlauts, normalize, same_orthography};
use crate::similarity::{osa_distance, ScientificNameSimilarity};
use crate::soundalike::sound_alike;
use backbone_core::config::MatchingConfig;
use backbone_core::{
    BackboneError, BackboneResult, Classification, Kingdom, NameParser, NodeId, Rank, TaxonomicStatus, Usage,
};
use backbone_graph::{GraphStore, UsageGraph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Ranks for which entries carry the id of the usage holding that rank
pub const HIGHER_ID_RANKS: [Rank; 7] = [
    Rank::Kingdom,
    Rank::Phylum,
    Rank::Class,
    Rank::Order,
    Rank::Family,
    Rank::Genus,
    Rank::Species,
];

/// Denormalized view of one usage as seen by the matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: NodeId,
    pub scientific_name: String,
    pub canonical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Rank>,
    /// Accepted, synonym or doubtful
    pub status: TaxonomicStatus,
    pub kingdom: Kingdom,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub higher_ids: BTreeMap<Rank, NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_name: Option<String>,
    #[serde(default)]
    pub superseded: bool,
}

impl IndexEntry {
    pub fn is_synonym(&self) -> bool {
        self.status.is_synonym()
    }

    /// Id of the usage at `rank` in this entry's classification
    pub fn higher_id(&self, rank: Rank) -> Option<NodeId> {
        self.higher_ids.get(&rank).copied()
    }

    fn from_graph(graph: &UsageGraph, usage: &Usage) -> Self {
        let accepted_id = if usage.is_synonym() {
            graph.accepted(usage.id).first().copied()
        } else {
            None
        };
        let accepted_name = accepted_id
            .and_then(|id| graph.node(id))
            .map(|u| u.scientific_name.clone());

        // Synonyms take the classification of their accepted usage
        let start = accepted_id.unwrap_or(usage.id);
        let mut higher_ids = BTreeMap::new();
        let mut classification = Classification::new();
        for id in std::iter::once(start).chain(graph.ancestors(start)) {
            let Some(node) = graph.node(id) else { continue };
            let Some(rank) = node.rank else { continue };
            if HIGHER_ID_RANKS.contains(&rank) {
                higher_ids.entry(rank).or_insert(id);
            }
            if classification.get(rank).is_none() {
                classification.set(rank, Some(node.name().to_string()));
            }
        }
        classification.patch_from(&usage.classification);

        let kingdom = match usage.kingdom {
            Kingdom::IncertaeSedis => classification.kingdom_enum().unwrap_or(Kingdom::IncertaeSedis),
            k => k,
        };

        let status = match usage.status {
            TaxonomicStatus::ProParteSynonym => TaxonomicStatus::Synonym,
            other => other,
        };

        Self {
            id: usage.id,
            scientific_name: usage.scientific_name.clone(),
            canonical_name: usage.name().to_string(),
            rank: usage.rank,
            status,
            kingdom,
            classification,
            higher_ids,
            accepted_id,
            accepted_name,
            superseded: usage.superseded,
        }
    }
}

/// One entry found by a name lookup
#[derive(Debug, Clone, Copy)]
pub struct NameHit<'a> {
    pub entry: &'a IndexEntry,
    /// `Exact` when the canonical name is only spelled differently, ignoring
    /// case, diacritics, ligatures and whitespace
    pub match_type: MatchType,
    /// Edits between the normalized keys, sound-alike hits rank last
    pub distance: usize,
}

/// Name index over a built backbone.
///
/// Built once and shared behind an [`Arc`]; all lookups take `&self`.
#[derive(Debug)]
pub struct MatchingIndex {
    config: MatchingConfig,
    entries: HashMap<NodeId, IndexEntry>,
    exact: HashMap<String, Vec<NodeId>>,
    normalized: HashMap<String, Vec<NodeId>>,
    sound_alike: HashMap<String, Vec<NodeId>>,
    trigrams: HashMap<String, Vec<String>>,
    active: usize,
    pub(crate) parser: NameParser,
    pub(crate) similarity: ScientificNameSimilarity,
}

impl MatchingIndex {
    /// Index every usage of a committed graph
    pub fn build(graph: &UsageGraph, config: MatchingConfig) -> BackboneResult<Arc<Self>> {
        if graph.in_transaction() {
            return Err(BackboneError::Transaction(
                "cannot index a graph with an open transaction".to_string(),
            ));
        }

        let mut index = Self {
            config,
            entries: HashMap::with_capacity(graph.node_count()),
            exact: HashMap::new(),
            normalized: HashMap::new(),
            sound_alike: HashMap::new(),
            trigrams: HashMap::new(),
            active: 0,
            parser: NameParser::new(),
            similarity: ScientificNameSimilarity::new(),
        };

        for usage in graph.all_usages() {
            let entry = IndexEntry::from_graph(graph, usage);
            if !entry.superseded {
                index.add_keys(&entry);
                index.active += 1;
            }
            index.entries.insert(entry.id, entry);
        }

        info!(
            "Indexed {} usages ({} superseded) under {} normalized names",
            index.active,
            index.entries.len() - index.active,
            index.normalized.len()
        );
        Ok(Arc::new(index))
    }

    fn add_keys(&mut self, entry: &IndexEntry) {
        let key = normalize(&entry.canonical_name);
        if key.is_empty() {
            debug!("No index key for usage {}", entry.id);
            return;
        }
        self.exact
            .entry(entry.canonical_name.trim().to_lowercase())
            .or_default()
            .push(entry.id);
        self.sound_alike.entry(sound_alike(&key)).or_default().push(entry.id);

        // "Schäfer" is also findable as "Schaefer"
        let expanded = normalize(&expand_umlauts(&entry.canonical_name));
        if expanded != key {
            self.add_normalized(expanded, entry.id);
        }
        self.add_normalized(key, entry.id);
    }

    fn add_normalized(&mut self, key: String, id: NodeId) {
        let postings = self.normalized.entry(key.clone()).or_default();
        let first_posting = postings.is_empty();
        postings.push(id);
        if first_posting {
            for gram in trigrams(&key) {
                self.trigrams.entry(gram).or_default().push(key.clone());
            }
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Number of active (not superseded) entries
    pub fn len(&self) -> usize {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active == 0
    }

    /// Entry by id, superseded usages included
    pub fn entry(&self, id: NodeId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    /// Look up a canonical name.
    ///
    /// Without `fuzzy` only entries sharing the normalized key are returned.
    /// With it, keys within one edit (two for keys longer than ten letters)
    /// starting with the same letter and sound-alike keys are added. Names
    /// shorter than the configured minimum never match anything.
    pub fn match_by_name(&self, name: &str, fuzzy: bool) -> Vec<NameHit<'_>> {
        let key = normalize(name);
        if key.chars().count() < self.config.min_name_length {
            debug!("Name '{}' too short to match", name);
            return Vec::new();
        }

        let max_edits = if key.chars().count() > 10 { 2 } else { 1 };
        let mut found: Vec<(usize, NodeId)> = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut collect = |ids: &[NodeId], distance: usize, found: &mut Vec<(usize, NodeId)>| {
            for id in ids {
                if seen.insert(*id) {
                    found.push((distance, *id));
                }
            }
        };

        if let Some(ids) = self.exact.get(&name.trim().to_lowercase()) {
            collect(ids, 0, &mut found);
        }
        if let Some(ids) = self.normalized.get(&key) {
            collect(ids, 0, &mut found);
        }
        if let Some(ids) = self.normalized.get(&normalize(&expand_umlauts(name))) {
            collect(ids, 0, &mut found);
        }

        if fuzzy {
            for (candidate, distance) in self.fuzzy_keys(&key, max_edits) {
                if let Some(ids) = self.normalized.get(&candidate) {
                    collect(ids, distance, &mut found);
                }
            }
            if let Some(ids) = self.sound_alike.get(&sound_alike(&key)) {
                collect(ids, max_edits + 1, &mut found);
            }
        }

        found.sort();
        found.truncate(self.config.max_matches);

        found
            .into_iter()
            .filter_map(|(distance, id)| self.entries.get(&id).map(|e| (distance, e)))
            .map(|(distance, entry)| NameHit {
                entry,
                match_type: if distance == 0 && same_orthography(&entry.canonical_name, name) {
                    MatchType::Exact
                } else {
                    MatchType::Fuzzy
                },
                distance,
            })
            .collect()
    }

    /// Normalized keys within `max_edits` of `key`, excluding `key` itself
    fn fuzzy_keys(&self, key: &str, max_edits: usize) -> Vec<(String, usize)> {
        let first = key.chars().next();
        let length = key.chars().count();
        let mut candidates: HashSet<&String> = HashSet::new();
        for gram in trigrams(key) {
            if let Some(keys) = self.trigrams.get(&gram) {
                candidates.extend(keys.iter());
            }
        }

        let mut keys: Vec<(String, usize)> = candidates
            .into_iter()
            .filter(|c| c.as_str() != key && c.chars().next() == first)
            .filter(|c| c.chars().count().abs_diff(length) <= max_edits)
            .filter_map(|c| {
                let distance = osa_distance(key, c);
                (distance <= max_edits).then(|| (c.clone(), distance))
            })
            .collect();
        keys.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        keys
    }

    /// Active entries with exactly this canonical name, optionally of one rank
    pub fn count_exact(&self, name: &str, rank: Option<Rank>) -> usize {
        self.exact
            .get(&name.trim().to_lowercase())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entries.get(id))
                    .filter(|e| rank.is_none() || e.rank == rank)
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Padded character trigrams of a key
fn trigrams(key: &str) -> Vec<String> {
    let padded: Vec<char> = format!("  {} ", key).chars().collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}
