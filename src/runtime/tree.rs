//! Mutable runtime state of the compiled tree.
//!
//! The graph itself never changes after compilation. Everything that does
//! (active flags, history slots, and the per-node activation epoch used for
//! structural timer and task cancellation) lives here, in vectors parallel
//! to the node arena.

use crate::graph::{Graph, NodeId};

pub struct TreeState {
    pub active: Vec<bool>,
    pub last_active_child: Vec<Option<NodeId>>,
    pub epoch: Vec<u64>,
}

/// A cheap copy of the mutable state, taken at transaction start and put
/// back wholesale on rollback.
pub struct TreeSaved {
    active: Vec<bool>,
    last_active_child: Vec<Option<NodeId>>,
    epoch: Vec<u64>,
}

impl TreeState {
    pub fn new(len: usize) -> Self {
        Self {
            active: vec![false; len],
            last_active_child: vec![None; len],
            epoch: vec![0; len],
        }
    }

    pub fn is_active(&self, id: NodeId) -> bool {
        self.active[id.index()]
    }

    pub fn save(&self) -> TreeSaved {
        TreeSaved {
            active: self.active.clone(),
            last_active_child: self.last_active_child.clone(),
            epoch: self.epoch.clone(),
        }
    }

    pub fn restore(&mut self, saved: TreeSaved) {
        self.active = saved.active;
        self.last_active_child = saved.last_active_child;
        self.epoch = saved.epoch;
    }

    /// Active leaves of the active tree (nodes with no active children),
    /// in declaration DFS order. These define dispatch branch order.
    pub fn active_leaves<D>(&self, graph: &Graph<D>) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        self.walk_active(graph, NodeId::ROOT, &mut |id, has_active_child| {
            if !has_active_child {
                leaves.push(id);
            }
        });
        leaves
    }

    /// Dot-paths of the active leaves; the `active_paths` of every snapshot.
    pub fn active_paths<D>(&self, graph: &Graph<D>) -> Vec<String> {
        self.active_leaves(graph)
            .into_iter()
            .map(|id| graph.node(id).path.clone())
            .collect()
    }

    /// Every active node, deepest first (post-order), declaration order
    /// among siblings. Wildcard handlers run in this order.
    pub fn active_nodes_deepest_first<D>(&self, graph: &Graph<D>) -> Vec<NodeId> {
        let mut out = Vec::new();
        fn post<D>(tree: &TreeState, graph: &Graph<D>, id: NodeId, out: &mut Vec<NodeId>) {
            for &child in &graph.node(id).children {
                if tree.is_active(child) {
                    post(tree, graph, child, out);
                }
            }
            out.push(id);
        }
        if self.is_active(NodeId::ROOT) {
            post(self, graph, NodeId::ROOT, &mut out);
        }
        out
    }

    fn walk_active<D, F>(&self, graph: &Graph<D>, id: NodeId, visit: &mut F)
    where
        F: FnMut(NodeId, bool),
    {
        if !self.is_active(id) {
            return;
        }
        let mut has_active_child = false;
        for &child in &graph.node(id).children {
            if self.is_active(child) {
                has_active_child = true;
            }
        }
        visit(id, has_active_child);
        for &child in &graph.node(id).children {
            self.walk_active(graph, child, visit);
        }
    }
}
