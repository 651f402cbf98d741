//! Event handler builders: the guard → action → transition pipeline.

use super::{ActionFn, ConditionFn, EventContext, ResultFn, TimeFn};
use serde_json::Value;
use std::sync::Arc;

/// A reference to an action, either registered by name on the
/// [`Design`](crate::Design) or supplied inline.
pub(crate) enum ActionRef<D> {
    Named(String),
    Inline(ActionFn<D>),
}

pub(crate) enum ConditionRef<D> {
    Named(String),
    Inline(ConditionFn<D>),
}

pub(crate) enum ResultRef<D> {
    Named(String),
    Inline(ResultFn<D>),
}

/// A delay: constant seconds, a named time function, or an inline one.
pub enum Wait<D> {
    Secs(f64),
    Named(String),
    Inline(TimeFn<D>),
}

impl<D> From<f64> for Wait<D> {
    fn from(secs: f64) -> Self {
        Wait::Secs(secs)
    }
}

impl<D> From<&str> for Wait<D> {
    fn from(name: &str) -> Self {
        Wait::Named(name.to_string())
    }
}

/// One step of an event handler chain.
///
/// A handler evaluates left to right: `get` functions thread a result value,
/// the guards decide whether the `run` actions and the `to` transition fire,
/// and `otherwise`/`else_run` describe what happens when they do not.
///
/// # Example
///
/// ```rust
/// use ramify::{Handler, EventContext};
///
/// #[derive(Clone)]
/// struct Data { count: i64 }
///
/// let decrement: Handler<Data> = Handler::new()
///     .unless(|d: &Data, _: &EventContext| Ok(d.count == 0))
///     .run(|d: &mut Data, _: &EventContext| {
///         d.count -= 1;
///         Ok(())
///     });
/// ```
pub struct Handler<D> {
    pub(crate) get: Vec<(String, ResultRef<D>)>,
    pub(crate) if_all: Vec<(String, ConditionRef<D>)>,
    pub(crate) unless: Vec<(String, ConditionRef<D>)>,
    pub(crate) if_any: Vec<(String, ConditionRef<D>)>,
    pub(crate) actions: Vec<(String, ActionRef<D>)>,
    pub(crate) targets: Vec<String>,
    pub(crate) wait: Option<Wait<D>>,
    pub(crate) else_actions: Vec<(String, ActionRef<D>)>,
    pub(crate) otherwise: Option<Box<Handler<D>>>,
    pub(crate) halt: bool,
    pub(crate) secret: bool,
}

pub(crate) const INLINE: &str = "(inline)";

impl<D> Handler<D> {
    pub fn new() -> Self {
        Self {
            get: Vec::new(),
            if_all: Vec::new(),
            unless: Vec::new(),
            if_any: Vec::new(),
            actions: Vec::new(),
            targets: Vec::new(),
            wait: None,
            else_actions: Vec::new(),
            otherwise: None,
            halt: false,
            secret: false,
        }
    }

    /// Add a result function; its return value becomes the handler's
    /// threaded result, passed to every later guard and action.
    pub fn get<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &EventContext) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.get.push((INLINE.into(), ResultRef::Inline(Arc::new(f))));
        self
    }

    /// Add a result function registered on the design by name.
    pub fn get_named(mut self, name: &str) -> Self {
        self.get.push((name.into(), ResultRef::Named(name.into())));
        self
    }

    /// Guard: every `when` condition must return true.
    pub fn when<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &EventContext) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.if_all
            .push((INLINE.into(), ConditionRef::Inline(Arc::new(f))));
        self
    }

    pub fn when_named(mut self, name: &str) -> Self {
        self.if_all.push((name.into(), ConditionRef::Named(name.into())));
        self
    }

    /// Guard: every `unless` condition must return false.
    pub fn unless<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &EventContext) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.unless
            .push((INLINE.into(), ConditionRef::Inline(Arc::new(f))));
        self
    }

    pub fn unless_named(mut self, name: &str) -> Self {
        self.unless.push((name.into(), ConditionRef::Named(name.into())));
        self
    }

    /// Guard: at least one `when_any` condition must return true.
    pub fn when_any<F>(mut self, f: F) -> Self
    where
        F: Fn(&D, &EventContext) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.if_any
            .push((INLINE.into(), ConditionRef::Inline(Arc::new(f))));
        self
    }

    pub fn when_any_named(mut self, name: &str) -> Self {
        self.if_any.push((name.into(), ConditionRef::Named(name.into())));
        self
    }

    /// Add an action, run against the transaction draft when the guards pass.
    pub fn run<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut D, &EventContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.actions
            .push((INLINE.into(), ActionRef::Inline(Arc::new(f))));
        self
    }

    pub fn run_named(mut self, name: &str) -> Self {
        self.actions.push((name.into(), ActionRef::Named(name.into())));
        self
    }

    /// Set the transition target. Calling `to` twice builds a two-step
    /// target: the first is applied, then the second is resolved against
    /// the tree the first one produced (the exit-then-restore idiom).
    ///
    /// Targets may be absolute (`"root.playing.paused"`) or relative to the
    /// nearest ancestor that has a matching descendant (`"paused"`), and may
    /// end in `.restore` or `.previous` to re-enter remembered children.
    pub fn to(mut self, target: &str) -> Self {
        self.targets.push(target.to_string());
        self
    }

    /// Delay the transition instead of applying it in the same transaction.
    /// Accepts seconds (`1.5`) or the name of a registered time function.
    pub fn wait(mut self, delay: impl Into<Wait<D>>) -> Self {
        self.wait = Some(delay.into());
        self
    }

    /// Compute the delay from the data at schedule time.
    pub fn wait_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&D) -> f64 + Send + Sync + 'static,
    {
        self.wait = Some(Wait::Inline(Arc::new(f)));
        self
    }

    /// Action run when the guards fail (and no `otherwise` handler is set).
    pub fn else_run<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut D, &EventContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.else_actions
            .push((INLINE.into(), ActionRef::Inline(Arc::new(f))));
        self
    }

    pub fn else_run_named(mut self, name: &str) -> Self {
        self.else_actions
            .push((name.into(), ActionRef::Named(name.into())));
        self
    }

    /// Full fallback handler evaluated when the guards fail.
    pub fn otherwise(mut self, handler: Handler<D>) -> Self {
        self.otherwise = Some(Box::new(handler));
        self
    }

    /// Stop the chain after this handler, whether or not its guards passed.
    pub fn halt(mut self) -> Self {
        self.halt = true;
        self
    }

    /// Commit this handler's effects without notifying subscribers.
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

impl<D> Default for Handler<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered chain of [`Handler`]s bound to one event name.
///
/// Most events need a single handler; chains model ordered alternatives
/// (`Handler::halt` stops the walk early).
pub struct EventHandler<D> {
    pub(crate) handlers: Vec<Handler<D>>,
}

impl<D> EventHandler<D> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn then(mut self, handler: Handler<D>) -> Self {
        self.handlers.push(handler);
        self
    }
}

impl<D> Default for EventHandler<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> From<Handler<D>> for EventHandler<D> {
    fn from(handler: Handler<D>) -> Self {
        Self {
            handlers: vec![handler],
        }
    }
}

impl<D> From<Vec<Handler<D>>> for EventHandler<D> {
    fn from(handlers: Vec<Handler<D>>) -> Self {
        Self { handlers }
    }
}

/// Shorthand for a handler that only transitions: `on("TOGGLE", to("on"))`.
pub fn to<D>(target: &str) -> Handler<D> {
    Handler::new().to(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Data {
        count: i64,
    }

    #[test]
    fn builder_collects_steps_in_order() {
        let handler: Handler<Data> = Handler::new()
            .get_named("doubled")
            .when_named("isEven")
            .run_named("increment")
            .run(|d: &mut Data, _: &EventContext| {
                d.count += 1;
                Ok(())
            })
            .to("on");

        assert_eq!(handler.get.len(), 1);
        assert_eq!(handler.if_all.len(), 1);
        assert_eq!(handler.actions.len(), 2);
        assert_eq!(handler.actions[0].0, "increment");
        assert_eq!(handler.actions[1].0, INLINE);
        assert_eq!(handler.targets, vec!["on".to_string()]);
    }

    #[test]
    fn two_targets_build_a_two_step_transition() {
        let handler: Handler<Data> = Handler::new().to("off").to("on.restore");
        assert_eq!(handler.targets.len(), 2);
    }

    #[test]
    fn chain_preserves_handler_order() {
        let chain: EventHandler<Data> = EventHandler::new()
            .then(Handler::new().to("a"))
            .then(Handler::new().to("b").halt())
            .then(Handler::new().to("c"));

        assert_eq!(chain.handlers.len(), 3);
        assert!(chain.handlers[1].halt);
    }

    #[test]
    fn wait_accepts_seconds_and_names() {
        let by_secs: Handler<Data> = Handler::new().to("on").wait(0.5);
        let by_name: Handler<Data> = Handler::new().to("on").wait("cooldown");

        assert!(matches!(by_secs.wait, Some(Wait::Secs(s)) if s == 0.5));
        assert!(matches!(by_name.wait, Some(Wait::Named(ref n)) if n == "cooldown"));
    }
}
