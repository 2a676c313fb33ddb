//! Per node subtree metrics gathered during a single walk

use crate::walker::StartEndHandler;
use backbone_core::{NodeId, Origin, Rank, Usage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const RANKS: usize = Rank::Unranked as usize + 1;

/// Subtree counts of one accepted usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub depth: usize,
    pub num_children: usize,
    /// Accepted descendants at any depth
    pub num_descendants: usize,
    /// Synonyms of this usage only
    pub num_synonyms: usize,
    pub descendants_by_rank: BTreeMap<Rank, usize>,
}

impl UsageMetrics {
    pub fn descendants_of_rank(&self, rank: Rank) -> usize {
        self.descendants_by_rank.get(&rank).copied().unwrap_or(0)
    }
}

/// Counts over a whole walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    pub roots: usize,
    pub max_depth: usize,
    pub accepted: usize,
    pub synonyms: usize,
    pub count_by_rank: BTreeMap<Rank, usize>,
    pub count_by_origin: BTreeMap<Origin, usize>,
}

struct OpenNode {
    id: NodeId,
    depth: usize,
    children: usize,
    synonyms: usize,
    counter_at_start: usize,
    ranks_at_start: [usize; RANKS],
}

/// Handler computing [`UsageMetrics`] for every accepted node it sees.
///
/// Descendant counts come from the difference of a running counter between
/// the start and end event of a node, so one walk is enough. Feed it a full
/// walk to get synonym counts; an accepted walk leaves them at zero.
pub struct UsageMetricsHandler {
    stack: Vec<OpenNode>,
    counter: usize,
    rank_counter: [usize; RANKS],
    metrics: HashMap<NodeId, UsageMetrics>,
    stats: WalkStats,
}

impl Default for UsageMetricsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageMetricsHandler {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            counter: 0,
            rank_counter: [0; RANKS],
            metrics: HashMap::new(),
            stats: WalkStats::default(),
        }
    }

    pub fn metrics(&self, id: NodeId) -> Option<&UsageMetrics> {
        self.metrics.get(&id)
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn into_metrics(self) -> HashMap<NodeId, UsageMetrics> {
        self.metrics
    }
}

impl StartEndHandler for UsageMetricsHandler {
    fn start(&mut self, usage: &Usage, depth: usize) {
        *self.stats.count_by_origin.entry(usage.origin).or_insert(0) += 1;
        if usage.is_synonym() {
            self.stats.synonyms += 1;
            if let Some(parent) = self.stack.last_mut() {
                parent.synonyms += 1;
            }
            return;
        }

        let rank = usage.rank.unwrap_or(Rank::Unranked);
        if let Some(parent) = self.stack.last_mut() {
            parent.children += 1;
        } else {
            self.stats.roots += 1;
        }
        self.stack.push(OpenNode {
            id: usage.id,
            depth,
            children: 0,
            synonyms: 0,
            counter_at_start: self.counter,
            ranks_at_start: self.rank_counter,
        });
        self.counter += 1;
        self.rank_counter[rank.ordinal() as usize] += 1;
        self.stats.accepted += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);
        *self.stats.count_by_rank.entry(rank).or_insert(0) += 1;
    }

    fn end(&mut self, usage: &Usage, _depth: usize) {
        if usage.is_synonym() {
            return;
        }
        let Some(open) = self.stack.pop() else {
            return;
        };
        let own_rank = usage.rank.unwrap_or(Rank::Unranked).ordinal() as usize;
        let mut descendants_by_rank = BTreeMap::new();
        for (idx, rank) in Rank::all().into_iter().enumerate() {
            let mut count = self.rank_counter[idx] - open.ranks_at_start[idx];
            if idx == own_rank {
                count -= 1;
            }
            if count > 0 {
                descendants_by_rank.insert(rank, count);
            }
        }
        self.metrics.insert(
            open.id,
            UsageMetrics {
                depth: open.depth,
                num_children: open.children,
                num_descendants: self.counter - open.counter_at_start - 1,
                num_synonyms: open.synonyms,
                descendants_by_rank,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::UsageGraph;
    use crate::store::{with_transaction, GraphStore, RelType};
    use crate::walker::{walk_with_handler, TreeWalker};
    use backbone_core::TaxonomicStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counts() {
        let mut graph = UsageGraph::new();
        let (family, genus) = with_transaction(&mut graph, |g| {
            let family = g.create_node(Usage::new("Turdidae", Some(Rank::Family), TaxonomicStatus::Accepted))?;
            let genus = g.create_node(Usage::new("Turdus", Some(Rank::Genus), TaxonomicStatus::Accepted))?;
            g.create_edge(RelType::ParentOf, family, genus)?;
            for epithet in ["merula", "iliacus", "pilaris"] {
                let sp = g.create_node(Usage::new(
                    &format!("Turdus {}", epithet),
                    Some(Rank::Species),
                    TaxonomicStatus::Accepted,
                ))?;
                g.create_edge(RelType::ParentOf, genus, sp)?;
            }
            let syn = g.create_node(Usage::new("Merula", Some(Rank::Genus), TaxonomicStatus::Synonym))?;
            g.create_edge(RelType::SynonymOf, syn, genus)?;
            Ok((family, genus))
        })
        .unwrap();

        let mut handler = UsageMetricsHandler::new();
        walk_with_handler(&TreeWalker::full(&graph), &mut handler);

        let fm = handler.metrics(family).unwrap();
        assert_eq!(fm.num_children, 1);
        assert_eq!(fm.num_descendants, 4);
        assert_eq!(fm.num_synonyms, 0);
        assert_eq!(fm.descendants_of_rank(Rank::Species), 3);
        assert_eq!(fm.descendants_of_rank(Rank::Genus), 1);
        assert_eq!(fm.descendants_of_rank(Rank::Family), 0);

        let gm = handler.metrics(genus).unwrap();
        assert_eq!(gm.num_children, 3);
        assert_eq!(gm.num_descendants, 3);
        assert_eq!(gm.num_synonyms, 1);
        assert_eq!(gm.depth, 1);

        let stats = handler.stats();
        assert_eq!(stats.roots, 1);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.accepted, 5);
        assert_eq!(stats.synonyms, 1);
        assert_eq!(stats.count_by_rank.get(&Rank::Species), Some(&3));
        assert_eq!(stats.count_by_origin.get(&Origin::Source), Some(&6));
    }

    #[test]
    fn test_accepted_walk_has_no_synonym_counts() {
        let mut graph = UsageGraph::new();
        let genus = with_transaction(&mut graph, |g| {
            let genus = g.create_node(Usage::new("Turdus", Some(Rank::Genus), TaxonomicStatus::Accepted))?;
            let syn = g.create_node(Usage::new("Merula", Some(Rank::Genus), TaxonomicStatus::Synonym))?;
            g.create_edge(RelType::SynonymOf, syn, genus)?;
            Ok(genus)
        })
        .unwrap();
        let mut handler = UsageMetricsHandler::new();
        walk_with_handler(&TreeWalker::accepted(&graph), &mut handler);
        assert_eq!(handler.metrics(genus).unwrap().num_synonyms, 0);
        assert_eq!(handler.len(), 1);
    }
}
