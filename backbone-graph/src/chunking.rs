//! Partition a walk into clade aligned chunks of bounded size

use crate::metrics::UsageMetricsHandler;
use crate::walker::{TreeWalker, Walk, WalkEvent};
use backbone_core::config::ChunkingConfig;
use backbone_core::{BackboneError, BackboneResult, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One unit of work produced by [`ChunkingEvaluator::chunks`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkUnit {
    /// A whole subtree processed together
    Clade { root: NodeId, size: usize },
    /// A node outside any clade chunk, processed on its own
    Single(NodeId),
}

impl ChunkUnit {
    pub fn node(&self) -> NodeId {
        match self {
            ChunkUnit::Clade { root, .. } => *root,
            ChunkUnit::Single(node) => *node,
        }
    }

    pub fn is_clade(&self) -> bool {
        matches!(self, ChunkUnit::Clade { .. })
    }
}

/// Decides which nodes root a chunk, based on metrics from a previous walk
pub struct ChunkingEvaluator {
    metrics: UsageMetricsHandler,
    min_chunk_size: usize,
    chunk_size: usize,
}

impl ChunkingEvaluator {
    pub fn new(metrics: UsageMetricsHandler, min_chunk_size: usize, chunk_size: usize) -> BackboneResult<Self> {
        if chunk_size == 0 {
            return Err(BackboneError::Configuration("chunk size must be positive".to_string()));
        }
        if min_chunk_size >= chunk_size {
            return Err(BackboneError::Configuration(format!(
                "minimum chunk size {} must be below chunk size {}",
                min_chunk_size, chunk_size
            )));
        }
        Ok(Self {
            metrics,
            min_chunk_size,
            chunk_size,
        })
    }

    pub fn from_config(metrics: UsageMetricsHandler, config: &ChunkingConfig) -> BackboneResult<Self> {
        Self::new(metrics, config.min_chunk_size, config.chunk_size)
    }

    /// Accepted descendants plus own synonyms
    pub fn size(&self, id: NodeId) -> Option<usize> {
        self.metrics
            .metrics(id)
            .map(|m| m.num_descendants + m.num_synonyms)
    }

    /// A node roots a chunk when it is big enough and either small enough or
    /// mostly made of its direct children
    pub fn is_chunk(&self, id: NodeId) -> bool {
        let Some(m) = self.metrics.metrics(id) else {
            return false;
        };
        let size = m.num_descendants + m.num_synonyms;
        size > self.min_chunk_size
            && (size < self.chunk_size || size.saturating_sub(m.num_children) < self.min_chunk_size)
    }

    pub fn chunks<'g>(&'g self, walker: &TreeWalker<'g>) -> Chunks<'g> {
        Chunks {
            evaluator: self,
            walk: walker.walk(),
        }
    }
}

/// Lazy chunk sequence; pruned below every clade root
pub struct Chunks<'g> {
    evaluator: &'g ChunkingEvaluator,
    walk: Walk<'g>,
}

impl<'g> Iterator for Chunks<'g> {
    type Item = ChunkUnit;

    fn next(&mut self) -> Option<ChunkUnit> {
        loop {
            let WalkEvent::Start { node, .. } = self.walk.next()? else {
                continue;
            };
            if self.evaluator.is_chunk(node) {
                self.walk.skip_descendants();
                let size = self.evaluator.size(node).unwrap_or(0);
                debug!("Chunk rooted at {} with {} usages", node, size);
                return Some(ChunkUnit::Clade { root: node, size });
            }
            return Some(ChunkUnit::Single(node));
        }
    }
}
