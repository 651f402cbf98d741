//! Lifecycle-bound timers.
//!
//! The scheduler keeps a host-driven virtual clock (seconds). Every timer
//! carries the activation epoch of its owning node; a timer whose node has
//! been exited since (even if re-entered) no longer matches and is
//! discarded when it comes due. Exit is the cancellation mechanism; there
//! are no cancellation tokens.

use crate::graph::{CompiledTarget, NodeId};

/// Floor for repeat delays. A zero or negative delay would reschedule at
/// the same clock instant and spin `advance` in place.
pub const MIN_REPEAT_DELAY: f64 = 0.001;

pub enum TimerKind {
    /// A repeat tick. Re-scheduled after each successful dispatch while the
    /// owning node stays active.
    Repeat,
    /// A delayed transition from a `wait` handler.
    Wait {
        target: CompiledTarget,
        secret: bool,
    },
}

pub struct Timer {
    pub node: NodeId,
    pub epoch: u64,
    pub due: f64,
    pub kind: TimerKind,
}

pub struct Scheduler {
    pub clock: f64,
    timers: Vec<Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            clock: 0.0,
            timers: Vec::new(),
        }
    }

    pub fn schedule(&mut self, timer: Timer) {
        self.timers.push(timer);
    }

    /// Seconds until the earliest pending timer, if any.
    pub fn next_due(&self) -> Option<f64> {
        self.timers
            .iter()
            .map(|t| t.due)
            .min_by(|a, b| a.total_cmp(b))
            .map(|due| (due - self.clock).max(0.0))
    }

    /// Remove and return the earliest timer due at or before `deadline`.
    /// Ties resolve in scheduling order.
    pub fn pop_due(&mut self, deadline: f64) -> Option<Timer> {
        let mut best: Option<usize> = None;
        for (i, t) in self.timers.iter().enumerate() {
            if t.due <= deadline {
                match best {
                    Some(b) if self.timers[b].due <= t.due => {}
                    _ => best = Some(i),
                }
            }
        }
        best.map(|i| self.timers.remove(i))
    }

    /// Drop timers whose `(node, epoch)` is no longer current.
    pub fn prune<F>(&mut self, valid: F)
    where
        F: Fn(NodeId, u64) -> bool,
    {
        self.timers.retain(|t| valid(t.node, t.epoch));
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.timers.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(node: u32, epoch: u64, due: f64) -> Timer {
        Timer {
            node: NodeId(node),
            epoch,
            due,
            kind: TimerKind::Repeat,
        }
    }

    #[test]
    fn pop_due_returns_earliest_first() {
        let mut s = Scheduler::new();
        s.schedule(timer(1, 0, 3.0));
        s.schedule(timer(2, 0, 1.0));
        s.schedule(timer(3, 0, 2.0));

        assert_eq!(s.pop_due(5.0).unwrap().node, NodeId(2));
        assert_eq!(s.pop_due(5.0).unwrap().node, NodeId(3));
        assert_eq!(s.pop_due(5.0).unwrap().node, NodeId(1));
        assert!(s.pop_due(5.0).is_none());
    }

    #[test]
    fn pop_due_respects_the_deadline() {
        let mut s = Scheduler::new();
        s.schedule(timer(1, 0, 3.0));
        assert!(s.pop_due(2.9).is_none());
        assert!(s.pop_due(3.0).is_some());
    }

    #[test]
    fn prune_drops_stale_epochs() {
        let mut s = Scheduler::new();
        s.schedule(timer(1, 0, 1.0));
        s.schedule(timer(1, 1, 1.0));
        s.prune(|_, epoch| epoch == 1);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn next_due_is_relative_to_the_clock() {
        let mut s = Scheduler::new();
        s.schedule(timer(1, 0, 4.0));
        s.clock = 1.5;
        assert_eq!(s.next_due(), Some(2.5));
    }
}
