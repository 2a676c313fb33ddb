//! Deterministic, pull based traversal of the parent tree

use crate::graph::UsageGraph;
use crate::store::GraphStore;
use backbone_core::{BackboneError, BackboneResult, NodeId, Rank, Usage};
use std::cmp::Ordering;

/// One step of a depth first walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent {
    Start { node: NodeId, depth: usize },
    End { node: NodeId, depth: usize },
}

impl WalkEvent {
    pub fn node(&self) -> NodeId {
        match self {
            WalkEvent::Start { node, .. } | WalkEvent::End { node, .. } => *node,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            WalkEvent::Start { depth, .. } | WalkEvent::End { depth, .. } => *depth,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, WalkEvent::Start { .. })
    }
}

/// Position inside a walk, restorable on an unchanged graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkCursor {
    /// Node ids from the walk root down to the last emitted node
    pub path: Vec<NodeId>,
    /// The end event of the last node was emitted as well
    pub finished: bool,
}

impl WalkCursor {
    pub fn node(&self) -> Option<NodeId> {
        self.path.last().copied()
    }
}

/// Callbacks receiving start and end events of a walk
pub trait StartEndHandler {
    fn start(&mut self, usage: &Usage, depth: usize);

    fn end(&mut self, usage: &Usage, depth: usize);
}

/// Walk configuration over a graph. Cheap to copy.
#[derive(Debug, Clone, Copy)]
pub struct TreeWalker<'g> {
    graph: &'g UsageGraph,
    include_synonyms: bool,
    root: Option<NodeId>,
    lowest_rank: Option<Rank>,
    highest_rank: Option<Rank>,
}

fn rank_key(usage: &Usage) -> Rank {
    usage.rank.unwrap_or(Rank::Unranked)
}

impl<'g> TreeWalker<'g> {
    /// Accepted tree with synonyms visited right after their accepted node
    pub fn full(graph: &'g UsageGraph) -> Self {
        Self {
            graph,
            include_synonyms: true,
            root: None,
            lowest_rank: None,
            highest_rank: None,
        }
    }

    /// Accepted tree only
    pub fn accepted(graph: &'g UsageGraph) -> Self {
        Self {
            include_synonyms: false,
            ..Self::full(graph)
        }
    }

    /// Start at a subtree root instead of all graph roots
    pub fn root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    /// Do not emit or descend into nodes ranked below `rank`
    pub fn lowest_rank(mut self, rank: Rank) -> Self {
        self.lowest_rank = Some(rank);
        self
    }

    /// Do not emit nodes ranked above `rank`; their descendants are still walked
    pub fn highest_rank(mut self, rank: Rank) -> Self {
        self.highest_rank = Some(rank);
        self
    }

    pub fn graph(&self) -> &'g UsageGraph {
        self.graph
    }

    pub fn includes_synonyms(&self) -> bool {
        self.include_synonyms
    }

    pub fn walk(&self) -> Walk<'g> {
        Walk {
            walker: *self,
            roots: self.roots(),
            next_root: 0,
            stack: Vec::new(),
            last: None,
        }
    }

    /// Start events only
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + 'g {
        self.walk().filter(WalkEvent::is_start).map(|e| e.node())
    }

    /// Continue a walk right after the event the cursor was taken at.
    ///
    /// Fails with `NotFound` when the cursor path no longer exists.
    pub fn resume(&self, cursor: &WalkCursor) -> BackboneResult<Walk<'g>> {
        let mut walk = self.walk();
        let Some((first, rest)) = cursor.path.split_first() else {
            return Ok(walk);
        };
        let root_pos = walk
            .roots
            .iter()
            .position(|r| r == first)
            .ok_or_else(|| BackboneError::NotFound(format!("walk root {}", first)))?;
        walk.next_root = root_pos + 1;
        let mut frame = walk.frame(*first, 0, false);
        frame.started = true;
        walk.stack.push(frame);

        for id in rest {
            let top = walk
                .stack
                .last_mut()
                .ok_or_else(|| BackboneError::Other("empty walk stack".to_string()))?;
            let pos = top
                .children
                .iter()
                .position(|(child, _)| child == id)
                .ok_or_else(|| BackboneError::NotFound(format!("walk node {}", id)))?;
            top.next = pos + 1;
            let (child, leaf) = top.children[pos];
            let depth = top.depth + 1;
            let mut frame = walk.frame(child, depth, leaf);
            frame.started = true;
            walk.stack.push(frame);
        }
        if cursor.finished {
            walk.stack.pop();
        }
        Ok(walk)
    }

    fn roots(&self) -> Vec<NodeId> {
        match self.root {
            Some(root) => vec![root],
            None => {
                let mut roots = self.graph.roots();
                self.sort(&mut roots);
                roots
            }
        }
    }

    fn sort(&self, ids: &mut [NodeId]) {
        ids.sort_by(|a, b| self.compare(*a, *b));
    }

    fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        match (self.graph.node(a), self.graph.node(b)) {
            (Some(ua), Some(ub)) => rank_key(ua)
                .cmp(&rank_key(ub))
                .then_with(|| ua.name().cmp(ub.name()))
                .then_with(|| a.cmp(&b)),
            _ => a.cmp(&b),
        }
    }

    /// Synonyms of `node`: its basionym first, then by rank and name
    fn sorted_synonyms(&self, node: NodeId) -> Vec<NodeId> {
        let basionym = self.graph.basionym(node);
        let mut synonyms = self.graph.synonyms(node).to_vec();
        synonyms.sort_by(|a, b| {
            let a_bas = Some(*a) == basionym;
            let b_bas = Some(*b) == basionym;
            b_bas.cmp(&a_bas).then_with(|| self.compare(*a, *b))
        });
        synonyms
    }

    fn below_floor(&self, node: NodeId) -> bool {
        match (self.lowest_rank, self.graph.node(node).and_then(|u| u.rank)) {
            (Some(floor), Some(rank)) => rank.lower_than(floor),
            _ => false,
        }
    }

    fn above_ceiling(&self, node: NodeId) -> bool {
        match (self.highest_rank, self.graph.node(node).and_then(|u| u.rank)) {
            (Some(ceiling), Some(rank)) => rank.higher_than(ceiling),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Frame {
    node: NodeId,
    depth: usize,
    /// Child ids, flagged when visited as a synonym leaf
    children: Vec<(NodeId, bool)>,
    next: usize,
    started: bool,
    visible: bool,
}

/// Lazy walk driven by an explicit stack.
///
/// Dropping the iterator at any point abandons the walk; nothing else needs
/// to be cleaned up.
pub struct Walk<'g> {
    walker: TreeWalker<'g>,
    roots: Vec<NodeId>,
    next_root: usize,
    stack: Vec<Frame>,
    last: Option<WalkEvent>,
}

impl<'g> Walk<'g> {
    fn frame(&self, node: NodeId, depth: usize, leaf: bool) -> Frame {
        let mut children = Vec::new();
        if !leaf {
            if self.walker.include_synonyms {
                children.extend(self.walker.sorted_synonyms(node).into_iter().map(|s| (s, true)));
            }
            let mut kids = self.walker.graph.children(node).to_vec();
            self.walker.sort(&mut kids);
            children.extend(kids.into_iter().map(|c| (c, false)));
        }
        Frame {
            node,
            depth,
            children,
            next: 0,
            started: false,
            visible: !self.walker.above_ceiling(node),
        }
    }

    /// Skip the remaining descendants of the node whose start was emitted last
    pub fn skip_descendants(&mut self) {
        if let (Some(WalkEvent::Start { node, .. }), Some(top)) = (self.last, self.stack.last_mut()) {
            if top.node == node {
                top.next = top.children.len();
            }
        }
    }

    /// Cursor for the last emitted event
    pub fn cursor(&self) -> Option<WalkCursor> {
        let last = self.last?;
        let mut path: Vec<NodeId> = self.stack.iter().map(|f| f.node).collect();
        let finished = !last.is_start();
        if finished {
            path.push(last.node());
        }
        Some(WalkCursor { path, finished })
    }

    fn emit(&mut self, event: WalkEvent) -> Option<WalkEvent> {
        self.last = Some(event);
        Some(event)
    }
}

impl<'g> Iterator for Walk<'g> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        loop {
            if let Some(top) = self.stack.last_mut() {
                if !top.started {
                    top.started = true;
                    if top.visible {
                        let event = WalkEvent::Start {
                            node: top.node,
                            depth: top.depth,
                        };
                        return self.emit(event);
                    }
                    continue;
                }
                if top.next < top.children.len() {
                    let (child, leaf) = top.children[top.next];
                    top.next += 1;
                    let depth = top.depth + 1;
                    if self.walker.below_floor(child) {
                        continue;
                    }
                    let frame = self.frame(child, depth, leaf);
                    self.stack.push(frame);
                    continue;
                }
                let Some(done) = self.stack.pop() else {
                    continue;
                };
                if done.visible {
                    return self.emit(WalkEvent::End {
                        node: done.node,
                        depth: done.depth,
                    });
                }
                continue;
            }

            let root = *self.roots.get(self.next_root)?;
            self.next_root += 1;
            if self.walker.below_floor(root) {
                continue;
            }
            let frame = self.frame(root, 0, false);
            self.stack.push(frame);
        }
    }
}

/// Drive a handler over a whole walk, returning the number of start events
pub fn walk_with_handler<H: StartEndHandler + ?Sized>(walker: &TreeWalker<'_>, handler: &mut H) -> usize {
    let graph = walker.graph();
    let mut count = 0;
    for event in walker.walk() {
        let Some(usage) = graph.node(event.node()) else {
            continue;
        };
        match event {
            WalkEvent::Start { depth, .. } => {
                count += 1;
                handler.start(usage, depth);
            }
            WalkEvent::End { depth, .. } => handler.end(usage, depth),
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{with_transaction, RelType};
    use backbone_core::TaxonomicStatus;
    use pretty_assertions::assert_eq;

    struct Tree {
        graph: UsageGraph,
        animalia: NodeId,
        aves: NodeId,
        turdus: NodeId,
        merula: NodeId,
        syn: NodeId,
        basionym: NodeId,
    }

    fn tree() -> Tree {
        let mut graph = UsageGraph::new();
        let ids = with_transaction(&mut graph, |g| {
            let mut add = |g: &mut UsageGraph, name: &str, rank: Rank, status: TaxonomicStatus| {
                g.create_node(Usage::new(name, Some(rank), status))
            };
            let animalia = add(g, "Animalia", Rank::Kingdom, TaxonomicStatus::Accepted)?;
            let mammalia = add(g, "Mammalia", Rank::Class, TaxonomicStatus::Accepted)?;
            let aves = add(g, "Aves", Rank::Class, TaxonomicStatus::Accepted)?;
            let turdus = add(g, "Turdus", Rank::Genus, TaxonomicStatus::Accepted)?;
            let merula = add(g, "Turdus merula", Rank::Species, TaxonomicStatus::Accepted)?;
            let iliacus = add(g, "Turdus iliacus", Rank::Species, TaxonomicStatus::Accepted)?;
            let syn = add(g, "Merula vulgaris", Rank::Species, TaxonomicStatus::Synonym)?;
            let basionym = add(g, "Turdus zzz", Rank::Species, TaxonomicStatus::Synonym)?;
            g.create_edge(RelType::ParentOf, animalia, mammalia)?;
            g.create_edge(RelType::ParentOf, animalia, aves)?;
            g.create_edge(RelType::ParentOf, aves, turdus)?;
            g.create_edge(RelType::ParentOf, turdus, merula)?;
            g.create_edge(RelType::ParentOf, turdus, iliacus)?;
            g.create_edge(RelType::SynonymOf, syn, merula)?;
            g.create_edge(RelType::SynonymOf, basionym, merula)?;
            g.create_edge(RelType::BasionymOf, basionym, merula)?;
            Ok((animalia, aves, turdus, merula, syn, basionym))
        })
        .unwrap();
        Tree {
            graph,
            animalia: ids.0,
            aves: ids.1,
            turdus: ids.2,
            merula: ids.3,
            syn: ids.4,
            basionym: ids.5,
        }
    }

    fn names(graph: &UsageGraph, ids: impl Iterator<Item = NodeId>) -> Vec<String> {
        ids.map(|id| graph.node(id).unwrap().name().to_string()).collect()
    }

    #[test]
    fn test_accepted_order() {
        let t = tree();
        let walker = TreeWalker::accepted(&t.graph);
        assert_eq!(
            names(&t.graph, walker.nodes()),
            vec!["Animalia", "Aves", "Turdus", "Turdus iliacus", "Turdus merula", "Mammalia"]
        );
    }

    #[test]
    fn test_full_walk_interleaves_synonyms() {
        let t = tree();
        let events: Vec<_> = TreeWalker::full(&t.graph).root(t.turdus).walk().collect();
        assert_eq!(
            events,
            vec![
                WalkEvent::Start { node: t.turdus, depth: 0 },
                WalkEvent::Start { node: NodeId(5), depth: 1 },
                WalkEvent::End { node: NodeId(5), depth: 1 },
                WalkEvent::Start { node: t.merula, depth: 1 },
                WalkEvent::Start { node: t.basionym, depth: 2 },
                WalkEvent::End { node: t.basionym, depth: 2 },
                WalkEvent::Start { node: t.syn, depth: 2 },
                WalkEvent::End { node: t.syn, depth: 2 },
                WalkEvent::End { node: t.merula, depth: 1 },
                WalkEvent::End { node: t.turdus, depth: 0 },
            ]
        );
    }

    #[test]
    fn test_rank_filters() {
        let t = tree();
        let walker = TreeWalker::accepted(&t.graph).lowest_rank(Rank::Genus);
        assert_eq!(names(&t.graph, walker.nodes()), vec!["Animalia", "Aves", "Turdus", "Mammalia"]);

        let walker = TreeWalker::accepted(&t.graph).highest_rank(Rank::Genus);
        assert_eq!(
            names(&t.graph, walker.nodes()),
            vec!["Turdus", "Turdus iliacus", "Turdus merula"]
        );
    }

    #[test]
    fn test_skip_descendants() {
        let t = tree();
        let walker = TreeWalker::accepted(&t.graph);
        let mut walk = walker.walk();
        let mut seen = Vec::new();
        while let Some(event) = walk.next() {
            if let WalkEvent::Start { node, .. } = event {
                seen.push(node);
                if node == t.aves {
                    walk.skip_descendants();
                }
            }
        }
        assert_eq!(names(&t.graph, seen.into_iter()), vec!["Animalia", "Aves", "Mammalia"]);
    }

    #[test]
    fn test_resume_matches_uninterrupted_walk() {
        let t = tree();
        let walker = TreeWalker::full(&t.graph);
        let all: Vec<_> = walker.walk().collect();

        for split in 0..all.len() {
            let mut walk = walker.walk();
            let head: Vec<_> = walk.by_ref().take(split + 1).collect();
            let cursor = walk.cursor().unwrap();
            let tail: Vec<_> = walker.resume(&cursor).unwrap().collect();
            let mut joined = head;
            joined.extend(tail);
            assert_eq!(joined, all, "resuming after event {}", split);
        }
    }

    #[test]
    fn test_resume_unknown_path() {
        let t = tree();
        let cursor = WalkCursor {
            path: vec![t.merula],
            finished: false,
        };
        assert!(TreeWalker::accepted(&t.graph).resume(&cursor).is_err());
    }

    #[test]
    fn test_walk_with_handler() {
        struct Depths(Vec<(String, usize)>, usize);
        impl StartEndHandler for Depths {
            fn start(&mut self, usage: &Usage, depth: usize) {
                self.0.push((usage.name().to_string(), depth));
            }
            fn end(&mut self, _usage: &Usage, _depth: usize) {
                self.1 += 1;
            }
        }

        let t = tree();
        let mut handler = Depths(Vec::new(), 0);
        let count = walk_with_handler(&TreeWalker::accepted(&t.graph).root(t.aves), &mut handler);
        assert_eq!(count, 4);
        assert_eq!(handler.1, 4);
        assert_eq!(handler.0[0], ("Aves".to_string(), 0));
        assert_eq!(handler.0[3], ("Turdus merula".to_string(), 2));
        let _ = t.animalia;
    }
}
