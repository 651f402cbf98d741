//! Serializable description of a compiled graph.
//!
//! Visualization and editor tooling needs the shape of the statechart
//! (states, kinds, events, scheduling markers) without the bound closures,
//! which are deliberately excluded.

use crate::graph::{Graph, NodeId, NodeKind};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct GraphDescription {
    pub root: GraphNode,
}

#[derive(Clone, Debug, Serialize)]
pub struct GraphNode {
    pub name: String,
    pub path: String,
    pub kind: GraphNodeKind,
    /// Name of the default initial child, for compound states.
    pub initial: Option<String>,
    /// Event names with specific handlers, sorted for stable output.
    pub events: Vec<String>,
    pub has_wildcard: bool,
    pub has_repeat: bool,
    pub has_task: bool,
    pub children: Vec<GraphNode>,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphNodeKind {
    Leaf,
    Compound,
    Parallel,
}

pub(crate) fn describe<D>(graph: &Graph<D>) -> GraphDescription {
    GraphDescription {
        root: describe_node(graph, NodeId::ROOT),
    }
}

fn describe_node<D>(graph: &Graph<D>, id: NodeId) -> GraphNode {
    let node = graph.node(id);
    let (kind, initial) = match node.kind {
        NodeKind::Leaf => (GraphNodeKind::Leaf, None),
        NodeKind::Parallel => (GraphNodeKind::Parallel, None),
        NodeKind::Compound { initial } => (
            GraphNodeKind::Compound,
            Some(graph.node(node.children[initial]).name.clone()),
        ),
    };
    let mut events: Vec<String> = node.handlers.keys().cloned().collect();
    events.sort();
    GraphNode {
        name: node.name.clone(),
        path: node.path.clone(),
        kind,
        initial,
        events,
        has_wildcard: node.on_event.is_some(),
        has_repeat: node.repeat.is_some(),
        has_task: node.task.is_some(),
        children: node
            .children
            .iter()
            .map(|&child| describe_node(graph, child))
            .collect(),
    }
}
