//! Declarative statechart designs.
//!
//! A [`Design`] bundles the initial data record, a tree of [`StateConfig`]s,
//! and named collections of reusable functions:
//! - **actions** mutate the transaction draft,
//! - **conditions** guard handlers,
//! - **results** compute a value threaded through one handler,
//! - **times** compute delays from the data,
//! - **values** are derived per committed snapshot,
//! - **tasks** are async work bound to a state's active lifetime.
//!
//! Handlers reference these collections by name, or carry inline closures
//! that skip the lookup entirely. Either way every reference is bound once,
//! when the design is compiled.

mod error;
mod handler;
mod state;

pub use error::DesignError;
pub use handler::{to, EventHandler, Handler, Wait};
pub use state::{StateConfig, Task};

pub(crate) use handler::{ActionRef, ConditionRef, ResultRef, INLINE};
pub(crate) use state::{RepeatConfig, TaskRef};

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Per-event context handed to user functions: the payload the event was
/// sent with and the result threaded from the handler's `get` functions.
#[derive(Clone, Debug, Default)]
pub struct EventContext {
    pub payload: Value,
    pub result: Value,
}

impl EventContext {
    pub(crate) fn new(payload: Value) -> Self {
        Self {
            payload,
            result: Value::Null,
        }
    }
}

/// An action mutates the transaction draft. Failing discards the whole
/// transaction.
pub type ActionFn<D> =
    Arc<dyn Fn(&mut D, &EventContext) -> Result<(), String> + Send + Sync>;

/// A condition guards a handler. Pure; sees the draft read-only.
pub type ConditionFn<D> =
    Arc<dyn Fn(&D, &EventContext) -> Result<bool, String> + Send + Sync>;

/// A result function computes the value threaded through one handler.
pub type ResultFn<D> =
    Arc<dyn Fn(&D, &EventContext) -> Result<Value, String> + Send + Sync>;

/// A time function computes a delay, in seconds, from the data.
pub type TimeFn<D> = Arc<dyn Fn(&D) -> f64 + Send + Sync>;

/// A value function derives one entry of [`Snapshot::values`](crate::Snapshot)
/// from the committed data.
pub type ValueFn<D> = Arc<dyn Fn(&D) -> Value + Send + Sync>;

/// The future returned by a task function.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<Value, Value>> + Send>>;

/// A task function starts the async work for a [`Task`] state.
pub type TaskFn<D> = Arc<dyn Fn(&D) -> TaskFuture + Send + Sync>;

/// A complete declarative design: initial data, the root state, and the
/// named function collections.
///
/// # Example
///
/// ```rust
/// use ramify::{Design, StateConfig, Handler, EventContext, to};
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Counter { count: i64 }
///
/// let design = Design::new(Counter { count: 0 })
///     .action("increment", |d: &mut Counter, _: &EventContext| {
///         d.count += 1;
///         Ok(())
///     })
///     .root(
///         StateConfig::new()
///             .initial("off")
///             .state("off", StateConfig::new().on("TOGGLE", to("on")))
///             .state(
///                 "on",
///                 StateConfig::new()
///                     .on("TOGGLE", to("off"))
///                     .on("ADD", Handler::new().run_named("increment")),
///             ),
///     );
/// ```
pub struct Design<D> {
    pub(crate) data: D,
    pub(crate) root: StateConfig<D>,
    pub(crate) actions: HashMap<String, ActionFn<D>>,
    pub(crate) conditions: HashMap<String, ConditionFn<D>>,
    pub(crate) results: HashMap<String, ResultFn<D>>,
    pub(crate) times: HashMap<String, TimeFn<D>>,
    pub(crate) values: Vec<(String, ValueFn<D>)>,
    pub(crate) tasks: HashMap<String, TaskFn<D>>,
}

impl<D> Design<D> {
    /// Start a design from its initial data record.
    pub fn new(data: D) -> Self {
        Self {
            data,
            root: StateConfig::new(),
            actions: HashMap::new(),
            conditions: HashMap::new(),
            results: HashMap::new(),
            times: HashMap::new(),
            values: Vec::new(),
            tasks: HashMap::new(),
        }
    }

    /// Set the root state configuration.
    pub fn root(mut self, root: StateConfig<D>) -> Self {
        self.root = root;
        self
    }

    /// Register a named action.
    pub fn action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut D, &EventContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.actions.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Register a named condition.
    pub fn condition<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &EventContext) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.conditions.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Register a named result function.
    pub fn result<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D, &EventContext) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.results.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Register a named time function.
    pub fn time<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D) -> f64 + Send + Sync + 'static,
    {
        self.times.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Register a derived value, recomputed against the data at every
    /// commit and published on the snapshot.
    pub fn value<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D) -> Value + Send + Sync + 'static,
    {
        self.values.push((name.to_string(), Arc::new(f)));
        self
    }

    /// Register a named task function.
    pub fn task<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&D) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let wrapped = move |data: &D| -> TaskFuture { Box::pin(f(data)) };
        self.tasks.insert(name.to_string(), Arc::new(wrapped));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct Counter {
        count: i64,
    }

    #[test]
    fn registered_functions_are_retrievable_by_name() {
        let design = Design::new(Counter { count: 0 })
            .action("increment", |d: &mut Counter, _: &EventContext| {
                d.count += 1;
                Ok(())
            })
            .condition("isZero", |d: &Counter, _: &EventContext| Ok(d.count == 0))
            .value("count", |d: &Counter| json!(d.count));

        assert!(design.actions.contains_key("increment"));
        assert!(design.conditions.contains_key("isZero"));
        assert_eq!(design.values[0].0, "count");
    }

    #[test]
    fn event_context_defaults_result_to_null() {
        let cx = EventContext::new(json!(5));
        assert_eq!(cx.payload, json!(5));
        assert_eq!(cx.result, Value::Null);
    }
}
