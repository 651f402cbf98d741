//! Declarative state configuration.

use super::handler::{EventHandler, Wait};
use super::{TaskFn, TaskFuture};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub(crate) enum TaskRef<D> {
    Named(String),
    Inline(TaskFn<D>),
}

/// A promise-like unit of work bound to a state's active lifetime.
///
/// The function runs once when the state is entered; its resolution or
/// rejection is dispatched back through the event queue as the `on_resolve`
/// or `on_reject` chain, unless the state has already been exited.
///
/// Entering a state that carries a task requires a running Tokio runtime,
/// since the returned future is spawned on it.
pub struct Task<D> {
    pub(crate) run: TaskRef<D>,
    pub(crate) on_resolve: Option<EventHandler<D>>,
    pub(crate) on_reject: Option<EventHandler<D>>,
}

impl<D> Task<D> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(&D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let run = move |data: &D| -> TaskFuture { Box::pin(f(data)) };
        Self {
            run: TaskRef::Inline(Arc::new(run)),
            on_resolve: None,
            on_reject: None,
        }
    }

    /// Use a task function registered on the design by name.
    pub fn named(name: &str) -> Self {
        Self {
            run: TaskRef::Named(name.to_string()),
            on_resolve: None,
            on_reject: None,
        }
    }

    /// Handler chain dispatched with the resolved value as payload.
    pub fn on_resolve(mut self, handler: impl Into<EventHandler<D>>) -> Self {
        self.on_resolve = Some(handler.into());
        self
    }

    /// Handler chain dispatched with the rejection value as payload.
    pub fn on_reject(mut self, handler: impl Into<EventHandler<D>>) -> Self {
        self.on_reject = Some(handler.into());
        self
    }
}

pub(crate) struct RepeatConfig<D> {
    pub(crate) delay: Wait<D>,
    pub(crate) on_repeat: EventHandler<D>,
}

/// Declarative description of one state.
///
/// A state with no children is a leaf. Declaring children makes it a
/// compound state (one child active at a time); [`StateConfig::parallel`]
/// makes every child active together instead.
///
/// # Example
///
/// ```rust
/// use ramify::{StateConfig, to};
///
/// #[derive(Clone)]
/// struct Data;
///
/// let player: StateConfig<Data> = StateConfig::new()
///     .initial("stopped")
///     .state("stopped", StateConfig::new().on("PLAY", to("playing")))
///     .state("playing", StateConfig::new().on("STOP", to("stopped")));
/// ```
pub struct StateConfig<D> {
    pub(crate) initial: Option<String>,
    pub(crate) parallel: bool,
    pub(crate) states: Vec<(String, StateConfig<D>)>,
    pub(crate) on: Vec<(String, EventHandler<D>)>,
    pub(crate) on_enter: Option<EventHandler<D>>,
    pub(crate) on_exit: Option<EventHandler<D>>,
    pub(crate) on_event: Option<EventHandler<D>>,
    pub(crate) repeat: Option<RepeatConfig<D>>,
    pub(crate) task: Option<Task<D>>,
}

impl<D> StateConfig<D> {
    pub fn new() -> Self {
        Self {
            initial: None,
            parallel: false,
            states: Vec::new(),
            on: Vec::new(),
            on_enter: None,
            on_exit: None,
            on_event: None,
            repeat: None,
            task: None,
        }
    }

    /// Name the child entered when this state activates. Defaults to the
    /// first declared child.
    pub fn initial(mut self, name: &str) -> Self {
        self.initial = Some(name.to_string());
        self
    }

    /// Activate every child together instead of one at a time.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Add a child state. Declaration order is dispatch order for parallel
    /// branches.
    pub fn state(mut self, name: &str, config: StateConfig<D>) -> Self {
        self.states.push((name.to_string(), config));
        self
    }

    /// Bind a handler chain to a named event.
    pub fn on(mut self, event: &str, handler: impl Into<EventHandler<D>>) -> Self {
        self.on.push((event.to_string(), handler.into()));
        self
    }

    /// Chain run every time this state is entered.
    pub fn on_enter(mut self, handler: impl Into<EventHandler<D>>) -> Self {
        self.on_enter = Some(handler.into());
        self
    }

    /// Chain run every time this state is exited.
    pub fn on_exit(mut self, handler: impl Into<EventHandler<D>>) -> Self {
        self.on_exit = Some(handler.into());
        self
    }

    /// Wildcard chain, run for every event dispatched while this state is
    /// active, after any specific handlers.
    pub fn on_event(mut self, handler: impl Into<EventHandler<D>>) -> Self {
        self.on_event = Some(handler.into());
        self
    }

    /// Run `handler` every `delay` while this state is active. The delay is
    /// re-evaluated after each tick, so a named time function can speed up
    /// or slow down the repetition as the data changes.
    pub fn repeat(mut self, delay: impl Into<Wait<D>>, handler: impl Into<EventHandler<D>>) -> Self {
        self.repeat = Some(RepeatConfig {
            delay: delay.into(),
            on_repeat: handler.into(),
        });
        self
    }

    /// Start an async [`Task`] when this state is entered.
    pub fn task(mut self, task: Task<D>) -> Self {
        self.task = Some(task);
        self
    }
}

impl<D> Default for StateConfig<D> {
    fn default() -> Self {
        Self::new()
    }
}
