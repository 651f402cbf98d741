//! The compiled state-node graph.
//!
//! Compilation turns a [`Design`](crate::Design) into an arena of
//! [`StateNode`]s addressed by [`NodeId`]. The arena is immutable for the
//! life of the statechart; everything that changes at run time (active
//! flags, history slots, epochs) lives in the runtime's tree state instead.

mod chain;
pub mod target;

pub use chain::{CompiledChain, CompiledHandler, CompiledRepeat, CompiledTask, CompiledWait};
pub use target::{CompiledTarget, TargetMode, TargetStep};

use crate::design::ValueFn;
use std::collections::HashMap;

/// Index of a node in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    /// One child active at a time; `initial` indexes into `children`.
    Compound { initial: usize },
    /// Every child active together.
    Parallel,
}

/// One compiled state: identity, shape, and its bound handler chains.
pub struct StateNode<D> {
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub handlers: HashMap<String, CompiledChain<D>>,
    pub on_enter: Option<CompiledChain<D>>,
    pub on_exit: Option<CompiledChain<D>>,
    pub on_event: Option<CompiledChain<D>>,
    pub repeat: Option<CompiledRepeat<D>>,
    pub task: Option<CompiledTask<D>>,
}

/// The immutable compiled graph: node arena, path index, and the design's
/// derived-value registry.
pub struct Graph<D> {
    pub nodes: Vec<StateNode<D>>,
    pub index: HashMap<String, NodeId>,
    pub values: Vec<(String, ValueFn<D>)>,
}

impl<D> Graph<D> {
    pub fn node(&self, id: NodeId) -> &StateNode<D> {
        &self.nodes[id.index()]
    }

    pub fn get(&self, path: &str) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Ancestor chain from `id` up to and including the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = Some(id);
        while let Some(n) = cursor {
            out.push(n);
            cursor = self.node(n).parent;
        }
        out
    }

    /// The chain of nodes strictly below `top` leading down to `bottom`,
    /// in root-to-leaf order. Empty when `top == bottom`.
    pub fn path_between(&self, top: NodeId, bottom: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = bottom;
        while cursor != top {
            chain.push(cursor);
            cursor = self
                .node(cursor)
                .parent
                .expect("path_between called with unrelated nodes");
        }
        chain.reverse();
        chain
    }
}
