//! The engine facade: compile once, then send, query, subscribe.

use super::core::{Broadcast, Core, Envelope, SubscriberFn};
use super::dispatch::plan;
use super::error::ActionError;
use super::pipeline::can_chain;
use super::scheduler::TimerKind;
use super::snapshot::{path_matches, Snapshot};
use crate::compile::compile;
use crate::design::{Design, DesignError};
use crate::export::{describe, GraphDescription};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Handle returned by [`Statechart::subscribe`]; pass it back to
/// [`Statechart::unsubscribe`] to stop receiving snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(Uuid);

/// A clonable, engine-independent way to enqueue events from actions,
/// other threads, or anywhere a `&Statechart` borrow is inconvenient.
/// Events land in the queue and are processed by the next `send`,
/// `advance`, or `settle`.
#[derive(Clone)]
pub struct EventSender {
    tx: UnboundedSender<Envelope>,
}

impl EventSender {
    pub fn send(&self, event: &str, payload: impl Into<Value>) {
        let _ = self.tx.send(Envelope::External {
            event: event.to_string(),
            payload: payload.into(),
        });
    }
}

/// A live statechart: the compiled graph plus its runtime state, behind a
/// synchronous query/command API.
///
/// # Example
///
/// ```rust
/// use ramify::{Design, StateConfig, Statechart, to};
/// use serde_json::Value;
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Data;
///
/// let chart = Statechart::new(
///     Design::new(Data).root(
///         StateConfig::new()
///             .initial("off")
///             .state("off", StateConfig::new().on("TOGGLE", to("on")))
///             .state("on", StateConfig::new().on("TOGGLE", to("off"))),
///     ),
/// )
/// .unwrap();
///
/// assert!(chart.is_in("off"));
/// chart.send("TOGGLE", Value::Null).unwrap();
/// assert!(chart.is_in("on"));
/// assert!(chart.can("TOGGLE", Value::Null));
/// ```
pub struct Statechart<D> {
    core: Mutex<Core<D>>,
    rx: AsyncMutex<UnboundedReceiver<Envelope>>,
    tx: UnboundedSender<Envelope>,
    in_flight: Arc<AtomicUsize>,
}

impl<D: Clone + Send + Sync + 'static> Statechart<D> {
    /// Compile the design and enter its initial states.
    pub fn new(design: Design<D>) -> Result<Self, DesignError> {
        let (graph, data) = compile(design)?;
        let (tx, rx) = unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut core = Core::new(Arc::new(graph), data, tx.clone(), Arc::clone(&in_flight));
        core.boot()?;
        Ok(Self {
            core: Mutex::new(core),
            rx: AsyncMutex::new(rx),
            tx,
            in_flight,
        })
    }

    /// Dispatch an event through the queue and return the snapshot after
    /// this dispatch (and anything it enqueued) has committed.
    ///
    /// A failing user function discards its whole transaction and surfaces
    /// here; the observable state is then exactly as before the dispatch.
    pub fn send(&self, event: &str, payload: impl Into<Value>) -> Result<Snapshot<D>, ActionError> {
        let payload = payload.into();
        let mut broadcasts = Vec::new();
        let result = {
            let mut core = self.lock_core();
            if core.disposed {
                return Err(ActionError::Disposed);
            }
            self.pump(&mut core);
            core.queue.push_back(Envelope::External {
                event: event.to_string(),
                payload,
            });
            self.drain(&mut core, &mut broadcasts)
                .map(|_| core.snapshot.clone())
        };
        fire(broadcasts);
        result
    }

    /// Whether at least one handler matched to `event` would pass its
    /// guards right now. Evaluates `get` functions and guards only; never
    /// mutates, never fails (a failing guard evaluates as "cannot").
    pub fn can(&self, event: &str, payload: impl Into<Value>) -> bool {
        let payload = payload.into();
        let core = self.lock_core();
        if core.disposed {
            return false;
        }
        let graph = Arc::clone(&core.graph);
        for r in plan(&graph, &core.tree, event) {
            let node = graph.node(r.node);
            let chain = if r.wildcard {
                node.on_event.as_ref()
            } else {
                node.handlers.get(event)
            };
            if let Some(chain) = chain {
                if can_chain(chain, &core.data, &payload) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether `pattern` matches any active path of the last committed
    /// snapshot. Patterns are whole dot-segments: `"playing"` matches
    /// `root.playing.paused`, `"play"` does not.
    pub fn is_in(&self, pattern: &str) -> bool {
        let core = self.lock_core();
        core.snapshot
            .active_paths
            .iter()
            .any(|path| path_matches(path, pattern))
    }

    /// Select the entry whose pattern matches the deepest active state,
    /// falling back to a `"default"` entry if nothing matches.
    pub fn when_in<T: Clone>(&self, map: &[(&str, T)]) -> Option<T> {
        let core = self.lock_core();
        let graph = Arc::clone(&core.graph);
        let mut nodes = core.tree.active_nodes_deepest_first(&graph);
        nodes.sort_by_key(|&n| std::cmp::Reverse(graph.node(n).depth));
        for node in nodes {
            let path = &graph.node(node).path;
            for (pattern, value) in map {
                if *pattern != "default" && path_matches(path, pattern) {
                    return Some(value.clone());
                }
            }
        }
        map.iter()
            .find(|(pattern, _)| *pattern == "default")
            .map(|(_, value)| value.clone())
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Snapshot<D> {
        self.lock_core().snapshot.clone()
    }

    /// Register a callback invoked with every non-secret committed
    /// snapshot. Callbacks run outside the engine lock and may re-enter
    /// (`send`, `snapshot`, ...).
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&Snapshot<D>) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let f: SubscriberFn<D> = Arc::new(f);
        self.lock_core().subscribers.push((id, f));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock_core().subscribers.retain(|(i, _)| *i != id.0);
    }

    /// A clonable sender for deferred dispatch.
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Advance the timer clock, firing due repeat ticks and delayed
    /// transitions in time order. Each firing is its own transaction; the
    /// first failure stops the advance and surfaces.
    pub fn advance(&self, duration: Duration) -> Result<(), ActionError> {
        let mut broadcasts = Vec::new();
        let result = {
            let mut core = self.lock_core();
            if core.disposed {
                return Err(ActionError::Disposed);
            }
            self.advance_inner(&mut core, duration, &mut broadcasts)
        };
        fire(broadcasts);
        result
    }

    /// Gap to the earliest pending timer, for hosts driving the clock from
    /// a sleep loop.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.lock_core()
            .scheduler
            .next_due()
            .map(Duration::from_secs_f64)
    }

    /// Wait for every in-flight task to settle and process the results.
    /// Settlements whose state has been exited are discarded, not waited
    /// out of order.
    pub async fn settle(&self) -> Result<(), ActionError> {
        loop {
            let mut broadcasts = Vec::new();
            let drained = {
                let mut core = self.lock_core();
                if core.disposed {
                    return Ok(());
                }
                self.drain(&mut core, &mut broadcasts)
            };
            fire(broadcasts);
            drained?;

            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return Ok(());
            }
            let envelope = {
                let mut rx = self.rx.lock().await;
                rx.recv().await
            };
            match envelope {
                Some(envelope) => {
                    self.note_settled(&envelope);
                    self.lock_core().queue.push_back(envelope);
                }
                None => return Ok(()),
            }
        }
    }

    /// Cancel every timer, orphan every pending task settlement, drop all
    /// subscribers. Subsequent `send`/`advance` calls return
    /// [`ActionError::Disposed`].
    pub fn dispose(&self) {
        self.lock_core().dispose();
    }

    /// A serializable description of the compiled graph, for
    /// visualization and editor tooling.
    pub fn describe(&self) -> GraphDescription {
        describe(&self.lock_core().graph)
    }

    fn advance_inner(
        &self,
        core: &mut Core<D>,
        duration: Duration,
        broadcasts: &mut Vec<Broadcast<D>>,
    ) -> Result<(), ActionError> {
        let end = core.scheduler.clock + duration.as_secs_f64();
        self.drain(core, broadcasts)?;
        while let Some(timer) = core.scheduler.pop_due(end) {
            core.scheduler.clock = core.scheduler.clock.max(timer.due);
            let envelope = match timer.kind {
                TimerKind::Repeat => Envelope::RepeatTick {
                    node: timer.node,
                    epoch: timer.epoch,
                },
                TimerKind::Wait { target, secret } => Envelope::WaitFired {
                    node: timer.node,
                    epoch: timer.epoch,
                    target,
                    secret,
                },
            };
            core.queue.push_back(envelope);
            self.drain(core, broadcasts)?;
        }
        core.scheduler.clock = end;
        Ok(())
    }

    /// Process everything queued, pumping the channel between envelopes so
    /// deferred sends from actions join the same drain.
    fn drain(
        &self,
        core: &mut Core<D>,
        broadcasts: &mut Vec<Broadcast<D>>,
    ) -> Result<(), ActionError> {
        loop {
            self.pump(core);
            let Some(envelope) = core.queue.pop_front() else {
                return Ok(());
            };
            if let Some(b) = core.process(envelope)? {
                broadcasts.push(b);
            }
        }
    }

    /// Move whatever the channel holds into the queue.
    fn pump(&self, core: &mut Core<D>) {
        if let Ok(mut rx) = self.rx.try_lock() {
            while let Ok(envelope) = rx.try_recv() {
                self.note_settled(&envelope);
                core.queue.push_back(envelope);
            }
        }
    }

    fn note_settled(&self, envelope: &Envelope) {
        if matches!(envelope, Envelope::TaskSettled { .. }) {
            let _ = self
                .in_flight
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
        }
    }

    fn lock_core(&self) -> MutexGuard<'_, Core<D>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fire<D>(broadcasts: Vec<Broadcast<D>>) {
    for (snapshot, subscribers) in broadcasts {
        for f in subscribers {
            f(&snapshot);
        }
    }
}
