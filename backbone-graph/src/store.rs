//! Abstract graph storage consumed by the normalizer, validators and walkers

use backbone_core::{BackboneError, BackboneResult, NodeId, Usage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directed relation types between usages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelType {
    /// Parent -> child in the accepted hierarchy
    ParentOf,
    /// Synonym -> accepted
    SynonymOf,
    /// Basionym -> combination derived from it
    BasionymOf,
}

impl RelType {
    pub const ALL: [RelType; 3] = [RelType::ParentOf, RelType::SynonymOf, RelType::BasionymOf];

    pub fn index(&self) -> usize {
        match self {
            RelType::ParentOf => 0,
            RelType::SynonymOf => 1,
            RelType::BasionymOf => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::ParentOf => "PARENT_OF",
            RelType::SynonymOf => "SYNONYM_OF",
            RelType::BasionymOf => "BASIONYM_OF",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which name a lookup compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Full scientific name, case insensitive
    Exact,
    /// Canonical name without authorship, case insensitive
    Canonical,
}

/// Node and edge store with explicit transaction scoping.
///
/// Every mutation must happen between `begin` and `commit`. Nodes created
/// inside a transaction are only visible to name lookups after commit, and
/// `rollback` restores the state seen at `begin`.
pub trait GraphStore {
    fn create_node(&mut self, usage: Usage) -> BackboneResult<NodeId>;

    fn node(&self, id: NodeId) -> Option<&Usage>;

    /// Replace the payload of an existing node; the id inside `usage` selects it.
    fn update_node(&mut self, usage: Usage) -> BackboneResult<()>;

    /// Ids of committed, non-superseded nodes with the given name
    fn find_by_name(&self, name: &str, mode: NameMatch) -> Vec<NodeId>;

    /// Returns false when the edge already existed
    fn create_edge(&mut self, rel: RelType, from: NodeId, to: NodeId) -> BackboneResult<bool>;

    /// Returns false when there was no such edge
    fn remove_edge(&mut self, rel: RelType, from: NodeId, to: NodeId) -> BackboneResult<bool>;

    fn outgoing(&self, rel: RelType, id: NodeId) -> &[NodeId];

    fn incoming(&self, rel: RelType, id: NodeId) -> &[NodeId];

    fn begin(&mut self) -> BackboneResult<()>;

    fn commit(&mut self) -> BackboneResult<()>;

    fn rollback(&mut self) -> BackboneResult<()>;

    fn in_transaction(&self) -> bool;

    fn node_count(&self) -> usize;

    fn node_ids(&self) -> Vec<NodeId>;

    /// Node lookup that treats a missing id as an error
    fn require(&self, id: NodeId) -> BackboneResult<&Usage> {
        self.node(id)
            .ok_or_else(|| BackboneError::NotFound(format!("usage {}", id)))
    }
}

/// Run `f` inside a transaction, committing on success and rolling back on error.
pub fn with_transaction<S, T, F>(store: &mut S, f: F) -> BackboneResult<T>
where
    S: GraphStore + ?Sized,
    F: FnOnce(&mut S) -> BackboneResult<T>,
{
    store.begin()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            store.rollback()?;
            Err(e)
        }
    }
}
