//! The transition resolver: target → ordered exit and entry walks.
//!
//! A transition's *domain* is the deepest currently-active ancestor-or-self
//! of its destination. Everything that changes happens strictly below the
//! domain: active subtrees off the destination path exit (on_exit
//! leaf-to-root, history recorded, epochs bumped), then the chain down to
//! the destination enters (on_enter root-to-leaf), then the destination's
//! descendants activate per the target mode. Parallel siblings outside the
//! domain are untouched.

use super::error::ActionError;
use super::pipeline::run_chain;
use super::transaction::{Op, PendingTransition, Txn, MAX_CHAINED_TRANSITIONS};
use crate::graph::{CompiledTarget, NodeId, NodeKind, TargetMode, TargetStep};
use serde_json::Value;

/// Ask for a transition. Applied immediately unless another application is
/// already walking the tree (an `on_enter`/`on_exit` chain transitioning),
/// in which case it queues and runs when the walk finishes, still inside
/// the same transaction.
pub fn request_transition<D: Clone>(
    txn: &mut Txn<'_, D>,
    source: NodeId,
    target: CompiledTarget,
    secret: bool,
) -> Result<(), ActionError> {
    txn.pending.push_back(PendingTransition {
        source,
        target,
        secret,
    });
    if txn.applying {
        return Ok(());
    }
    txn.applying = true;
    let result = drain(txn);
    txn.applying = false;
    result
}

/// Initial activation of the whole tree, used once at construction.
pub fn boot_enter<D: Clone>(txn: &mut Txn<'_, D>) -> Result<(), ActionError> {
    txn.applying = true;
    let result = enter_node(txn, NodeId::ROOT, &[], TargetMode::Exact);
    txn.applying = false;
    result?;
    drain(txn)
}

fn drain<D: Clone>(txn: &mut Txn<'_, D>) -> Result<(), ActionError> {
    while let Some(p) = txn.pending.pop_front() {
        txn.applied += 1;
        if txn.applied > MAX_CHAINED_TRANSITIONS {
            return Err(ActionError::TransitionOverflow {
                event: txn.event.clone(),
            });
        }
        // A requester that has since been exited no longer gets its
        // transition.
        if !txn.tree.is_active(p.source) {
            continue;
        }
        if !p.secret {
            txn.notify = true;
        }
        for step in &p.target.steps {
            apply_step(txn, step)?;
        }
    }
    Ok(())
}

fn apply_step<D: Clone>(txn: &mut Txn<'_, D>, step: &TargetStep) -> Result<(), ActionError> {
    let graph = txn.graph;
    let dest = step.node;
    let domain = graph
        .ancestors(dest)
        .into_iter()
        .find(|&a| txn.tree.is_active(a));

    match domain {
        // Destination already active: swap its descendants without
        // re-entering the destination itself.
        Some(d) if d == dest => {
            exit_children(txn, dest)?;
            enter_descendants(txn, dest, step.mode)
        }
        Some(d) => {
            let path = graph.path_between(d, dest);
            exit_children_except(txn, d, path[0])?;
            enter_node(txn, path[0], &path[1..], step.mode)
        }
        // Nothing active at all (only possible before boot finishes):
        // enter from the root down.
        None => {
            let path = graph.path_between(NodeId::ROOT, dest);
            enter_node(txn, NodeId::ROOT, &path, step.mode)
        }
    }
}

/// Activate `node`, then continue down `rest` (remaining nodes on the
/// explicit target path), then let the target mode pick descendants.
fn enter_node<D: Clone>(
    txn: &mut Txn<'_, D>,
    node: NodeId,
    rest: &[NodeId],
    mode: TargetMode,
) -> Result<(), ActionError> {
    let graph = txn.graph;
    txn.tree.active[node.index()] = true;
    txn.tree.epoch[node.index()] += 1;
    let epoch = txn.tree.epoch[node.index()];

    if graph.node(node).repeat.is_some() {
        txn.ops.push(Op::StartRepeat { node, epoch });
    }
    if graph.node(node).task.is_some() {
        txn.ops.push(Op::StartTask { node, epoch });
    }
    if let Some(chain) = &graph.node(node).on_enter {
        run_chain(txn, node, chain, &Value::Null)?;
    }

    if let Some((&next, deeper)) = rest.split_first() {
        match graph.node(node).kind {
            // Entering a parallel on the way down: the addressed branch
            // follows the path, the others enter their defaults.
            NodeKind::Parallel => {
                for &child in &graph.node(node).children {
                    if child == next {
                        enter_node(txn, child, deeper, mode)?;
                    } else {
                        enter_node(txn, child, &[], TargetMode::Exact)?;
                    }
                }
                Ok(())
            }
            _ => enter_node(txn, next, deeper, mode),
        }
    } else {
        enter_descendants(txn, node, mode)
    }
}

/// Activate `node`'s descendants: initial chain for `Exact`, remembered
/// children for `Restore` (recursively) and `Previous` (first level only).
fn enter_descendants<D: Clone>(
    txn: &mut Txn<'_, D>,
    node: NodeId,
    mode: TargetMode,
) -> Result<(), ActionError> {
    let graph = txn.graph;
    match graph.node(node).kind {
        NodeKind::Leaf => Ok(()),
        NodeKind::Parallel => {
            for &child in &graph.node(node).children {
                enter_node(txn, child, &[], mode)?;
            }
            Ok(())
        }
        NodeKind::Compound { initial } => {
            let children = &graph.node(node).children;
            let child = match mode {
                TargetMode::Exact => children[initial],
                TargetMode::Restore | TargetMode::Previous => txn.tree.last_active_child
                    [node.index()]
                .unwrap_or(children[initial]),
            };
            let child_mode = if mode == TargetMode::Restore {
                TargetMode::Restore
            } else {
                TargetMode::Exact
            };
            enter_node(txn, child, &[], child_mode)
        }
    }
}

/// Exit every active child subtree of `parent`, recording history on
/// compound nodes.
fn exit_children<D: Clone>(txn: &mut Txn<'_, D>, parent: NodeId) -> Result<(), ActionError> {
    let graph = txn.graph;
    let active_children: Vec<NodeId> = graph
        .node(parent)
        .children
        .iter()
        .copied()
        .filter(|&c| txn.tree.is_active(c))
        .collect();
    if matches!(graph.node(parent).kind, NodeKind::Compound { .. }) {
        if let Some(&child) = active_children.first() {
            txn.tree.last_active_child[parent.index()] = Some(child);
        }
    }
    for child in active_children {
        deactivate(txn, child)?;
    }
    Ok(())
}

/// Exit every active child subtree of `parent` except `keep`.
fn exit_children_except<D: Clone>(
    txn: &mut Txn<'_, D>,
    parent: NodeId,
    keep: NodeId,
) -> Result<(), ActionError> {
    let graph = txn.graph;
    let displaced: Vec<NodeId> = graph
        .node(parent)
        .children
        .iter()
        .copied()
        .filter(|&c| c != keep && txn.tree.is_active(c))
        .collect();
    if matches!(graph.node(parent).kind, NodeKind::Compound { .. }) {
        if let Some(&child) = displaced.first() {
            txn.tree.last_active_child[parent.index()] = Some(child);
        }
    }
    for child in displaced {
        deactivate(txn, child)?;
    }
    Ok(())
}

/// Exit one subtree: children first (on_exit runs leaf-to-root), then the
/// node's own on_exit, then the flag flips and the epoch bumps. The epoch
/// bump is what cancels the node's timers and orphans its pending task.
fn deactivate<D: Clone>(txn: &mut Txn<'_, D>, node: NodeId) -> Result<(), ActionError> {
    exit_children(txn, node)?;
    let graph = txn.graph;
    if let Some(chain) = &graph.node(node).on_exit {
        run_chain(txn, node, chain, &Value::Null)?;
    }
    txn.tree.active[node.index()] = false;
    txn.tree.epoch[node.index()] += 1;
    Ok(())
}
