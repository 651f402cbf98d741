//! The serialized heart of the engine: one queue, one transaction at a time.
//!
//! Everything that can change the engine (external sends, repeat ticks,
//! delayed transitions, task settlements) arrives here as an [`Envelope`]
//! and is processed as exactly one transaction followed by at most one
//! broadcast. Subscriber callbacks are returned to the caller rather than
//! invoked here, so they run outside the engine lock and may re-enter.

use super::dispatch::{plan, ChainRef};
use super::error::ActionError;
use super::pipeline::run_chain;
use super::scheduler::{Scheduler, Timer, TimerKind, MIN_REPEAT_DELAY};
use super::snapshot::Snapshot;
use super::transaction::{Op, Txn};
use super::transition::{boot_enter, request_transition};
use super::tree::TreeState;
use crate::graph::{CompiledTarget, Graph, NodeId};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// One unit of work for the queue.
pub enum Envelope {
    External {
        event: String,
        payload: Value,
    },
    RepeatTick {
        node: NodeId,
        epoch: u64,
    },
    WaitFired {
        node: NodeId,
        epoch: u64,
        target: CompiledTarget,
        secret: bool,
    },
    TaskSettled {
        node: NodeId,
        epoch: u64,
        outcome: Result<Value, Value>,
    },
}

pub type SubscriberFn<D> = Arc<dyn Fn(&Snapshot<D>) + Send + Sync>;

/// A committed snapshot plus the callbacks to hand it to, collected under
/// the lock and fired after it is released.
pub type Broadcast<D> = (Snapshot<D>, Vec<SubscriberFn<D>>);

pub struct Core<D> {
    pub graph: Arc<Graph<D>>,
    pub tree: TreeState,
    pub data: D,
    pub scheduler: Scheduler,
    pub queue: VecDeque<Envelope>,
    pub subscribers: Vec<(Uuid, SubscriberFn<D>)>,
    pub snapshot: Snapshot<D>,
    pub tx: UnboundedSender<Envelope>,
    pub in_flight: Arc<AtomicUsize>,
    pub disposed: bool,
}

impl<D: Clone + Send + Sync + 'static> Core<D> {
    pub fn new(
        graph: Arc<Graph<D>>,
        data: D,
        tx: UnboundedSender<Envelope>,
        in_flight: Arc<AtomicUsize>,
    ) -> Self {
        let tree = TreeState::new(graph.len());
        let snapshot = Snapshot {
            data: data.clone(),
            active_paths: Vec::new(),
            values: BTreeMap::new(),
        };
        Self {
            graph,
            tree,
            data,
            scheduler: Scheduler::new(),
            queue: VecDeque::new(),
            subscribers: Vec::new(),
            snapshot,
            tx,
            in_flight,
            disposed: false,
        }
    }

    /// Enter the initial states. Runs once, at construction.
    pub fn boot(&mut self) -> Result<(), ActionError> {
        let graph = Arc::clone(&self.graph);
        let saved = self.tree.save();
        let mut txn = Txn::new(&graph, &mut self.tree, self.data.clone(), "@init");
        match boot_enter(&mut txn) {
            Ok(()) => {
                let Txn { draft, ops, .. } = txn;
                self.commit(draft, ops, false);
                Ok(())
            }
            Err(e) => {
                drop(txn);
                self.tree.restore(saved);
                Err(e)
            }
        }
    }

    /// Process one envelope: one transaction, at most one broadcast.
    pub fn process(&mut self, envelope: Envelope) -> Result<Option<Broadcast<D>>, ActionError> {
        let graph = Arc::clone(&self.graph);
        match envelope {
            Envelope::External { event, payload } => {
                let refs = plan(&graph, &self.tree, &event);
                if refs.is_empty() {
                    return Ok(None);
                }
                let saved = self.tree.save();
                let mut txn = Txn::new(&graph, &mut self.tree, self.data.clone(), &event);
                match run_refs(&mut txn, &graph, &refs, &event, &payload) {
                    Ok(()) => {
                        let Txn {
                            draft, ops, notify, ..
                        } = txn;
                        Ok(self.commit(draft, ops, notify))
                    }
                    Err(e) => {
                        drop(txn);
                        self.tree.restore(saved);
                        Err(e)
                    }
                }
            }

            Envelope::RepeatTick { node, epoch } => {
                if !self.valid(node, epoch) {
                    return Ok(None);
                }
                let Some(repeat) = graph.node(node).repeat.as_ref() else {
                    return Ok(None);
                };
                let saved = self.tree.save();
                let mut txn = Txn::new(&graph, &mut self.tree, self.data.clone(), "@repeat");
                match run_chain(&mut txn, node, &repeat.chain, &Value::Null) {
                    Ok(()) => {
                        let Txn {
                            draft, ops, notify, ..
                        } = txn;
                        let broadcast = self.commit(draft, ops, notify);
                        // Same activation still alive: book the next tick,
                        // with the delay re-read from the committed data.
                        if self.valid(node, epoch) {
                            let due = self.scheduler.clock
                                + repeat.delay.seconds(&self.data).max(MIN_REPEAT_DELAY);
                            self.scheduler.schedule(Timer {
                                node,
                                epoch,
                                due,
                                kind: TimerKind::Repeat,
                            });
                        }
                        Ok(broadcast)
                    }
                    Err(e) => {
                        drop(txn);
                        self.tree.restore(saved);
                        Err(e)
                    }
                }
            }

            Envelope::WaitFired {
                node,
                epoch,
                target,
                secret,
            } => {
                if !self.valid(node, epoch) {
                    return Ok(None);
                }
                let saved = self.tree.save();
                let mut txn = Txn::new(&graph, &mut self.tree, self.data.clone(), "@wait");
                match request_transition(&mut txn, node, target, secret) {
                    Ok(()) => {
                        let Txn {
                            draft, ops, notify, ..
                        } = txn;
                        Ok(self.commit(draft, ops, notify))
                    }
                    Err(e) => {
                        drop(txn);
                        self.tree.restore(saved);
                        Err(e)
                    }
                }
            }

            Envelope::TaskSettled {
                node,
                epoch,
                outcome,
            } => {
                // Settled after exit: silently discarded.
                if !self.valid(node, epoch) {
                    return Ok(None);
                }
                let Some(task) = graph.node(node).task.as_ref() else {
                    return Ok(None);
                };
                let (chain, payload, label) = match outcome {
                    Ok(value) => (task.on_resolve.as_ref(), value, "@resolve"),
                    Err(value) => (task.on_reject.as_ref(), value, "@reject"),
                };
                // No handler for this settlement: a no-op, not an error.
                let Some(chain) = chain else {
                    return Ok(None);
                };
                let saved = self.tree.save();
                let mut txn = Txn::new(&graph, &mut self.tree, self.data.clone(), label);
                match run_chain(&mut txn, node, chain, &payload) {
                    Ok(()) => {
                        let Txn {
                            draft, ops, notify, ..
                        } = txn;
                        Ok(self.commit(draft, ops, notify))
                    }
                    Err(e) => {
                        drop(txn);
                        self.tree.restore(saved);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Swap the draft in, apply staged scheduler ops, rebuild the snapshot.
    fn commit(&mut self, draft: D, ops: Vec<Op>, notify: bool) -> Option<Broadcast<D>> {
        self.data = draft;
        let graph = Arc::clone(&self.graph);

        for op in ops {
            match op {
                Op::StartRepeat { node, epoch } => {
                    if self.valid(node, epoch) {
                        if let Some(repeat) = graph.node(node).repeat.as_ref() {
                            let due = self.scheduler.clock
                                + repeat.delay.seconds(&self.data).max(MIN_REPEAT_DELAY);
                            self.scheduler.schedule(Timer {
                                node,
                                epoch,
                                due,
                                kind: TimerKind::Repeat,
                            });
                        }
                    }
                }
                Op::StartTask { node, epoch } => {
                    if self.valid(node, epoch) {
                        if let Some(task) = graph.node(node).task.as_ref() {
                            let future = (task.run.1)(&self.data);
                            let tx = self.tx.clone();
                            self.in_flight.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(async move {
                                let outcome = future.await;
                                let _ = tx.send(Envelope::TaskSettled {
                                    node,
                                    epoch,
                                    outcome,
                                });
                            });
                        }
                    }
                }
                Op::ScheduleWait {
                    node,
                    epoch,
                    delay_secs,
                    target,
                    secret,
                } => {
                    if self.valid(node, epoch) {
                        self.scheduler.schedule(Timer {
                            node,
                            epoch,
                            due: self.scheduler.clock + delay_secs,
                            kind: TimerKind::Wait { target, secret },
                        });
                    }
                }
            }
        }

        self.scheduler
            .prune(|node, epoch| self.tree.is_active(node) && self.tree.epoch[node.index()] == epoch);

        let values: BTreeMap<String, Value> = graph
            .values
            .iter()
            .map(|(name, f)| (name.clone(), f(&self.data)))
            .collect();
        let snapshot = Snapshot {
            data: self.data.clone(),
            active_paths: self.tree.active_paths(&graph),
            values,
        };
        self.snapshot = snapshot.clone();

        if notify && !self.subscribers.is_empty() {
            let subs = self.subscribers.iter().map(|(_, f)| Arc::clone(f)).collect();
            Some((snapshot, subs))
        } else {
            None
        }
    }

    pub fn valid(&self, node: NodeId, epoch: u64) -> bool {
        self.tree.is_active(node) && self.tree.epoch[node.index()] == epoch
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
        self.queue.clear();
        self.scheduler.clear();
        self.subscribers.clear();
        self.in_flight.store(0, Ordering::SeqCst);
    }
}

fn run_refs<D: Clone>(
    txn: &mut Txn<'_, D>,
    graph: &Graph<D>,
    refs: &[ChainRef],
    event: &str,
    payload: &Value,
) -> Result<(), ActionError> {
    for r in refs {
        // Owners exited by an earlier chain in this dispatch no longer react.
        if !txn.tree.is_active(r.node) {
            continue;
        }
        let node = graph.node(r.node);
        let chain = if r.wildcard {
            node.on_event.as_ref()
        } else {
            node.handlers.get(event)
        };
        if let Some(chain) = chain {
            run_chain(txn, r.node, chain, payload)?;
        }
    }
    Ok(())
}
