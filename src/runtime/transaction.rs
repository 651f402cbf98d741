//! The unit of atomicity: one dispatched event, one transaction.
//!
//! A transaction owns a draft clone of the data and a saved copy of the
//! tree state. Handlers mutate the draft and the live tree freely; if any
//! user function fails, the caller restores the saved tree and drops the
//! draft, leaving nothing to undo. Scheduler side effects (new repeaters,
//! tasks, delayed transitions) are only staged here and applied by the
//! commit path, so a rollback never has to cancel anything.

use super::tree::TreeState;
use crate::graph::{CompiledTarget, Graph, NodeId};
use std::collections::VecDeque;

/// A transition requested by a handler, waiting to be applied. Requests
/// made while another application is in progress (an `on_enter` chain that
/// itself transitions) queue up behind it.
pub struct PendingTransition {
    pub source: NodeId,
    pub target: CompiledTarget,
    pub secret: bool,
}

/// A scheduler side effect staged for commit. Each op carries the epoch of
/// its node at staging time; if the node was exited later in the same
/// transaction the epoch no longer matches and the op is dropped.
pub enum Op {
    StartRepeat { node: NodeId, epoch: u64 },
    StartTask { node: NodeId, epoch: u64 },
    ScheduleWait {
        node: NodeId,
        epoch: u64,
        delay_secs: f64,
        target: CompiledTarget,
        secret: bool,
    },
}

pub struct Txn<'a, D> {
    pub graph: &'a Graph<D>,
    pub tree: &'a mut TreeState,
    pub draft: D,
    /// Set by any non-secret effect; decides whether subscribers hear about
    /// this commit.
    pub notify: bool,
    pub ops: Vec<Op>,
    pub pending: VecDeque<PendingTransition>,
    pub applying: bool,
    pub applied: u32,
    /// Event name, for error reporting only.
    pub event: String,
}

/// Backstop against transition cycles (`on_enter` chains endlessly
/// re-targeting each other) within a single transaction.
pub const MAX_CHAINED_TRANSITIONS: u32 = 64;

impl<'a, D: Clone> Txn<'a, D> {
    pub fn new(graph: &'a Graph<D>, tree: &'a mut TreeState, draft: D, event: &str) -> Self {
        Self {
            graph,
            tree,
            draft,
            notify: false,
            ops: Vec::new(),
            pending: VecDeque::new(),
            applying: false,
            applied: 0,
            event: event.to_string(),
        }
    }
}
