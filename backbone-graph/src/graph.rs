//! In-memory usage graph: an arena of usages plus adjacency maps per relation type

use crate::store::{GraphStore, NameMatch, RelType};
use backbone_core::{BackboneError, BackboneResult, NodeId, Rank, Usage, UsageLabel};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default, Clone)]
struct Adjacency {
    outgoing: HashMap<NodeId, Vec<NodeId>>,
    incoming: HashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    fn contains(&self, from: NodeId, to: NodeId) -> bool {
        self.outgoing.get(&from).is_some_and(|v| v.contains(&to))
    }

    fn insert(&mut self, from: NodeId, to: NodeId) {
        self.outgoing.entry(from).or_default().push(to);
        self.incoming.entry(to).or_default().push(from);
    }

    fn remove(&mut self, from: NodeId, to: NodeId) -> bool {
        let removed = remove_value(&mut self.outgoing, from, to);
        if removed {
            remove_value(&mut self.incoming, to, from);
        }
        removed
    }
}

fn remove_value(map: &mut HashMap<NodeId, Vec<NodeId>>, key: NodeId, value: NodeId) -> bool {
    let Some(list) = map.get_mut(&key) else {
        return false;
    };
    let Some(pos) = list.iter().position(|v| *v == value) else {
        return false;
    };
    list.remove(pos);
    if list.is_empty() {
        map.remove(&key);
    }
    true
}

/// Journal entry undoing one write
#[derive(Debug)]
enum Undo {
    Created(NodeId),
    Updated(Box<Usage>),
    EdgeAdded(RelType, NodeId, NodeId),
    EdgeRemoved(RelType, NodeId, NodeId),
}

#[derive(Debug, Default)]
struct Transaction {
    journal: Vec<Undo>,
    /// Nodes whose name index entries must be refreshed on commit
    touched: Vec<(NodeId, Option<Usage>)>,
}

/// One directed edge in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub rel: RelType,
    pub from: NodeId,
    pub to: NodeId,
}

/// Serializable form of a committed graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Usage>,
    pub edges: Vec<Edge>,
}

/// Arena backed implementation of [`GraphStore`].
///
/// Usages are addressed by their dense [`NodeId`], relations live in one
/// adjacency map per [`RelType`]. No language references between nodes exist,
/// which keeps cycles in the data harmless.
#[derive(Debug, Default)]
pub struct UsageGraph {
    nodes: Vec<Usage>,
    edges: [Adjacency; 3],
    exact_index: HashMap<String, Vec<NodeId>>,
    canonical_index: HashMap<String, Vec<NodeId>>,
    tx: Option<Transaction>,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl UsageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn tx_mut(&mut self) -> BackboneResult<&mut Transaction> {
        self.tx
            .as_mut()
            .ok_or_else(|| BackboneError::Transaction("no open transaction".to_string()))
    }

    fn check_node(&self, id: NodeId) -> BackboneResult<()> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(BackboneError::NotFound(format!("usage {}", id)))
        }
    }

    fn index_names(&mut self, usage_id: NodeId) {
        let Some(usage) = self.nodes.get(usage_id.index()) else {
            return;
        };
        if usage.superseded {
            return;
        }
        let exact = name_key(&usage.scientific_name);
        let canonical = name_key(usage.name());
        self.exact_index.entry(exact).or_default().push(usage_id);
        self.canonical_index.entry(canonical).or_default().push(usage_id);
    }

    fn unindex_names(&mut self, usage: &Usage) {
        remove_from_index(&mut self.exact_index, &name_key(&usage.scientific_name), usage.id);
        remove_from_index(&mut self.canonical_index, &name_key(usage.name()), usage.id);
    }

    fn adjacency(&self, rel: RelType) -> &Adjacency {
        &self.edges[rel.index()]
    }

    // ---- primitives ----

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.incoming(RelType::ParentOf, id).first().copied()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.outgoing(RelType::ParentOf, id)
    }

    /// Accepted targets of a synonym, several for pro parte synonyms
    pub fn accepted(&self, id: NodeId) -> &[NodeId] {
        self.outgoing(RelType::SynonymOf, id)
    }

    pub fn synonyms(&self, id: NodeId) -> &[NodeId] {
        self.incoming(RelType::SynonymOf, id)
    }

    /// Basionym the given combination derives from
    pub fn basionym(&self, id: NodeId) -> Option<NodeId> {
        self.incoming(RelType::BasionymOf, id).first().copied()
    }

    /// Combinations derived from the given basionym
    pub fn combinations(&self, id: NodeId) -> &[NodeId] {
        self.outgoing(RelType::BasionymOf, id)
    }

    /// Parent chain from the direct parent up to the root.
    ///
    /// Iterative and cycle safe: a repeated node ends the chain.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.parent(id);
        while let Some(p) = current {
            if !seen.insert(p) {
                break;
            }
            chain.push(p);
            current = self.parent(p);
        }
        chain
    }

    /// True when `candidate` lies below `ancestor` in the parent tree
    pub fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// Committed, non-superseded nodes without a parent that are not synonyms
    pub fn roots(&self) -> Vec<NodeId> {
        self.usages()
            .filter(|u| !u.is_synonym() && self.parent(u.id).is_none())
            .map(|u| u.id)
            .collect()
    }

    /// All non-superseded usages in id order
    pub fn usages(&self) -> impl Iterator<Item = &Usage> + '_ {
        self.nodes.iter().filter(|u| !u.superseded)
    }

    /// Every usage including superseded ones
    pub fn all_usages(&self) -> &[Usage] {
        &self.nodes
    }

    /// Replace the parent of `child`, keeping at most one `ParentOf` edge
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> BackboneResult<()> {
        if let Some(old) = self.parent(child) {
            if old == parent {
                return Ok(());
            }
            self.remove_edge(RelType::ParentOf, old, child)?;
        }
        self.create_edge(RelType::ParentOf, parent, child)?;
        Ok(())
    }

    /// Add or remove a label through a journaled update
    pub fn set_label(&mut self, id: NodeId, label: UsageLabel, on: bool) -> BackboneResult<()> {
        let mut usage = self.require(id)?.clone();
        let changed = if on {
            usage.labels.insert(label)
        } else {
            usage.labels.remove(&label)
        };
        if changed {
            self.update_node(usage)?;
        }
        Ok(())
    }

    /// Mark a node as superseded and detach it from every relation.
    ///
    /// The node keeps its id and stays reachable by id, but disappears from
    /// name lookups, roots and walks.
    pub fn supersede(&mut self, id: NodeId) -> BackboneResult<()> {
        for rel in RelType::ALL {
            for to in self.outgoing(rel, id).to_vec() {
                self.remove_edge(rel, id, to)?;
            }
            for from in self.incoming(rel, id).to_vec() {
                self.remove_edge(rel, from, id)?;
            }
        }
        let mut usage = self.require(id)?.clone();
        usage.superseded = true;
        usage.labels.remove(&UsageLabel::Root);
        debug!("Superseding usage {}", usage);
        self.update_node(usage)
    }

    /// Names of all ancestors, lowest first
    pub fn parent_chain_names(&self, id: NodeId) -> Vec<String> {
        self.ancestors(id)
            .into_iter()
            .filter_map(|p| self.node(p))
            .map(|u| u.name().to_string())
            .collect()
    }

    /// Committed nodes with the given canonical name and rank
    pub fn find_by_canonical_and_rank(&self, name: &str, rank: Option<Rank>) -> Vec<NodeId> {
        self.find_by_name(name, NameMatch::Canonical)
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|u| u.rank == rank))
            .collect()
    }

    pub fn edge_count(&self, rel: RelType) -> usize {
        self.adjacency(rel).outgoing.values().map(Vec::len).sum()
    }

    // ---- snapshots ----

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut edges = Vec::new();
        for rel in RelType::ALL {
            let mut froms: Vec<_> = self.adjacency(rel).outgoing.keys().copied().collect();
            froms.sort();
            for from in froms {
                for to in self.outgoing(rel, from) {
                    edges.push(Edge { rel, from, to: *to });
                }
            }
        }
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges,
        }
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> BackboneResult<Self> {
        let mut graph = UsageGraph::new();
        for (idx, usage) in snapshot.nodes.iter().enumerate() {
            if usage.id.index() != idx {
                return Err(BackboneError::Serialization(format!(
                    "snapshot node {} stored at position {}",
                    usage.id, idx
                )));
            }
        }
        graph.nodes = snapshot.nodes;
        for id in 0..graph.nodes.len() {
            graph.index_names(NodeId(id as u32));
        }
        for edge in snapshot.edges {
            graph.check_node(edge.from)?;
            graph.check_node(edge.to)?;
            graph.edges[edge.rel.index()].insert(edge.from, edge.to);
        }
        Ok(graph)
    }

    pub fn to_json(&self) -> BackboneResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> BackboneResult<Self> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        Self::from_snapshot(snapshot)
    }
}

fn remove_from_index(index: &mut HashMap<String, Vec<NodeId>>, key: &str, id: NodeId) {
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|x| *x != id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl GraphStore for UsageGraph {
    fn create_node(&mut self, mut usage: Usage) -> BackboneResult<NodeId> {
        let id = NodeId(self.nodes.len() as u32);
        let tx = self.tx_mut()?;
        tx.journal.push(Undo::Created(id));
        tx.touched.push((id, None));
        usage.id = id;
        self.nodes.push(usage);
        Ok(id)
    }

    fn node(&self, id: NodeId) -> Option<&Usage> {
        self.nodes.get(id.index())
    }

    fn update_node(&mut self, usage: Usage) -> BackboneResult<()> {
        self.check_node(usage.id)?;
        let previous = self.nodes[usage.id.index()].clone();
        let tx = self.tx_mut()?;
        tx.touched.push((usage.id, Some(previous.clone())));
        tx.journal.push(Undo::Updated(Box::new(previous)));
        let idx = usage.id.index();
        self.nodes[idx] = usage;
        Ok(())
    }

    fn find_by_name(&self, name: &str, mode: NameMatch) -> Vec<NodeId> {
        let index = match mode {
            NameMatch::Exact => &self.exact_index,
            NameMatch::Canonical => &self.canonical_index,
        };
        index.get(&name_key(name)).cloned().unwrap_or_default()
    }

    fn create_edge(&mut self, rel: RelType, from: NodeId, to: NodeId) -> BackboneResult<bool> {
        self.check_node(from)?;
        self.check_node(to)?;
        if from == to {
            return Err(BackboneError::InvalidInput(format!(
                "self loop {} on usage {}",
                rel, from
            )));
        }
        if self.adjacency(rel).contains(from, to) {
            return Ok(false);
        }
        match rel {
            RelType::ParentOf if self.parent(to).is_some() => {
                return Err(BackboneError::InvalidInput(format!(
                    "usage {} already has a parent",
                    to
                )));
            }
            RelType::SynonymOf
                if !self.accepted(from).is_empty()
                    && self.nodes[from.index()].status
                        != backbone_core::TaxonomicStatus::ProParteSynonym =>
            {
                return Err(BackboneError::InvalidInput(format!(
                    "usage {} is not pro parte and already has an accepted name",
                    from
                )));
            }
            _ => {}
        }
        self.tx_mut()?.journal.push(Undo::EdgeAdded(rel, from, to));
        self.edges[rel.index()].insert(from, to);
        Ok(true)
    }

    fn remove_edge(&mut self, rel: RelType, from: NodeId, to: NodeId) -> BackboneResult<bool> {
        if !self.adjacency(rel).contains(from, to) {
            return Ok(false);
        }
        self.tx_mut()?.journal.push(Undo::EdgeRemoved(rel, from, to));
        Ok(self.edges[rel.index()].remove(from, to))
    }

    fn outgoing(&self, rel: RelType, id: NodeId) -> &[NodeId] {
        self.adjacency(rel)
            .outgoing
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn incoming(&self, rel: RelType, id: NodeId) -> &[NodeId] {
        self.adjacency(rel)
            .incoming
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn begin(&mut self) -> BackboneResult<()> {
        if self.tx.is_some() {
            return Err(BackboneError::Transaction(
                "nested transactions are not supported".to_string(),
            ));
        }
        self.tx = Some(Transaction::default());
        Ok(())
    }

    fn commit(&mut self) -> BackboneResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| BackboneError::Transaction("commit without transaction".to_string()))?;
        // Refresh the name index once per touched node, using the state at begin
        let mut seen = HashSet::new();
        let mut first_state: Vec<(NodeId, Option<Usage>)> = Vec::new();
        for (id, before) in tx.touched {
            if seen.insert(id) {
                first_state.push((id, before));
            }
        }
        for (id, before) in first_state {
            if let Some(before) = before {
                self.unindex_names(&before);
            }
            self.index_names(id);
        }
        Ok(())
    }

    fn rollback(&mut self) -> BackboneResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| BackboneError::Transaction("rollback without transaction".to_string()))?;
        debug!("Rolling back {} graph writes", tx.journal.len());
        for undo in tx.journal.into_iter().rev() {
            match undo {
                Undo::Created(id) => {
                    // Creation is journaled in id order, so the node is the last one
                    if id.index() + 1 == self.nodes.len() {
                        self.nodes.pop();
                    }
                }
                Undo::Updated(previous) => {
                    let idx = previous.id.index();
                    if idx < self.nodes.len() {
                        self.nodes[idx] = *previous;
                    }
                }
                Undo::EdgeAdded(rel, from, to) => {
                    self.edges[rel.index()].remove(from, to);
                }
                Undo::EdgeRemoved(rel, from, to) => {
                    self.edges[rel.index()].insert(from, to);
                }
            }
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len() as u32).map(NodeId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::with_transaction;
    use backbone_core::TaxonomicStatus;
    use pretty_assertions::assert_eq;

    fn usage(name: &str, rank: Rank) -> Usage {
        Usage::new(name, Some(rank), TaxonomicStatus::Accepted)
    }

    fn small_tree() -> (UsageGraph, NodeId, NodeId, NodeId) {
        let mut g = UsageGraph::new();
        let (k, f, s) = with_transaction(&mut g, |g| {
            let k = g.create_node(usage("Animalia", Rank::Kingdom))?;
            let f = g.create_node(usage("Turdidae", Rank::Family))?;
            let s = g.create_node(usage("Turdus merula", Rank::Species))?;
            g.create_edge(RelType::ParentOf, k, f)?;
            g.create_edge(RelType::ParentOf, f, s)?;
            Ok((k, f, s))
        })
        .unwrap();
        (g, k, f, s)
    }

    #[test]
    fn test_create_and_lookup() {
        let (g, k, f, s) = small_tree();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.find_by_name("turdus MERULA", NameMatch::Exact), vec![s]);
        assert_eq!(g.parent(s), Some(f));
        assert_eq!(g.children(k), &[f]);
        assert_eq!(g.ancestors(s), vec![f, k]);
        assert!(g.is_descendant(s, k));
        assert!(!g.is_descendant(k, s));
        assert_eq!(g.roots(), vec![k]);
    }

    #[test]
    fn test_mutation_requires_transaction() {
        let mut g = UsageGraph::new();
        let err = g.create_node(usage("Aves", Rank::Class)).unwrap_err();
        assert!(matches!(err, BackboneError::Transaction(_)));
    }

    #[test]
    fn test_nodes_invisible_until_commit() {
        let mut g = UsageGraph::new();
        g.begin().unwrap();
        let id = g.create_node(usage("Aves", Rank::Class)).unwrap();
        assert!(g.find_by_name("Aves", NameMatch::Exact).is_empty());
        g.commit().unwrap();
        assert_eq!(g.find_by_name("Aves", NameMatch::Canonical), vec![id]);
    }

    #[test]
    fn test_rollback_restores_state() {
        let (mut g, k, f, s) = small_tree();
        let result: BackboneResult<()> = with_transaction(&mut g, |g| {
            let extra = g.create_node(usage("Passeriformes", Rank::Order))?;
            g.remove_edge(RelType::ParentOf, k, f)?;
            g.create_edge(RelType::ParentOf, extra, f)?;
            let mut renamed = g.require(s)?.clone();
            renamed.scientific_name = "Turdus torquatus".to_string();
            renamed.canonical_name = "Turdus torquatus".to_string();
            g.update_node(renamed)?;
            Err(BackboneError::Other("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(!g.in_transaction());
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.parent(f), Some(k));
        assert_eq!(g.node(s).unwrap().scientific_name, "Turdus merula");
        assert_eq!(g.find_by_name("Turdus merula", NameMatch::Exact), vec![s]);
        assert!(g.find_by_name("Turdus torquatus", NameMatch::Exact).is_empty());
    }

    #[test]
    fn test_edge_rules() {
        let (mut g, k, f, s) = small_tree();
        g.begin().unwrap();
        assert!(g.create_edge(RelType::ParentOf, k, k).is_err());
        assert!(g.create_edge(RelType::ParentOf, k, s).is_err());
        assert!(!g.create_edge(RelType::ParentOf, f, s).unwrap());

        let syn = g
            .create_node(Usage::new("Merula vulgaris", Some(Rank::Species), TaxonomicStatus::Synonym))
            .unwrap();
        assert!(g.create_edge(RelType::SynonymOf, syn, s).unwrap());
        assert!(g.create_edge(RelType::SynonymOf, syn, f).is_err());
        g.commit().unwrap();
        assert_eq!(g.synonyms(s), &[syn]);
        assert_eq!(g.accepted(syn), &[s]);
    }

    #[test]
    fn test_set_parent_replaces() {
        let (mut g, k, f, s) = small_tree();
        with_transaction(&mut g, |g| g.set_parent(s, k)).unwrap();
        assert_eq!(g.parent(s), Some(k));
        assert!(g.children(f).is_empty());
    }

    #[test]
    fn test_supersede_keeps_identity() {
        let (mut g, k, f, s) = small_tree();
        with_transaction(&mut g, |g| g.supersede(f)).unwrap();
        assert!(g.node(f).unwrap().superseded);
        assert!(g.find_by_name("Turdidae", NameMatch::Exact).is_empty());
        assert!(g.children(k).is_empty());
        assert_eq!(g.parent(s), None);
        assert_eq!(g.usages().count(), 2);
        assert_eq!(g.all_usages().len(), 3);
    }

    #[test]
    fn test_ancestors_stop_on_cycle() {
        let (mut g, k, _f, s) = small_tree();
        // Force a cycle directly through the adjacency to test the guard
        g.edges[RelType::ParentOf.index()].insert(s, k);
        let chain = g.ancestors(s);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (g, _k, f, s) = small_tree();
        let json = g.to_json().unwrap();
        let back = UsageGraph::from_json(&json).unwrap();
        assert_eq!(back.node_count(), 3);
        assert_eq!(back.parent(s), Some(f));
        assert_eq!(back.find_by_name("Turdidae", NameMatch::Canonical), vec![f]);
        assert_eq!(back.edge_count(RelType::ParentOf), 2);
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let mut g = UsageGraph::new();
        g.begin().unwrap();
        assert!(g.begin().is_err());
        g.rollback().unwrap();
        assert!(g.commit().is_err());
    }
}
