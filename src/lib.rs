//! Ramify: a hierarchical, parallel statechart runtime
//!
//! A statechart is described declaratively (states, events, guarded
//! transitions, timed repetition, async tasks) and compiled into a live
//! engine that maintains the tree of active states and one shared data
//! record. Hosts talk to it through a small synchronous API: [`Statechart::send`]
//! dispatches events, [`Statechart::can`] / [`Statechart::is_in`] /
//! [`Statechart::when_in`] answer queries, and [`Statechart::subscribe`]
//! delivers an immutable [`Snapshot`] after every committed transaction.
//!
//! # Core Concepts
//!
//! - **Design**: the declarative description, built with fluent builders
//! - **Handler**: the get → guard → action → transition pipeline for one event
//! - **Snapshot**: the immutable `{data, active_paths, values}` published per commit
//! - **Restore/Previous**: history targets re-entering remembered children
//! - **Repeat/Task**: timers and async work bound to a state's active lifetime
//!
//! # Example
//!
//! ```rust
//! use ramify::{Design, EventContext, Handler, StateConfig, Statechart, to};
//! use serde_json::{json, Value};
//!
//! #[derive(Clone, PartialEq, Debug)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! let chart = Statechart::new(
//!     Design::new(Counter { count: 0 })
//!         .action("add", |d: &mut Counter, cx: &EventContext| {
//!             d.count += cx.payload.as_i64().unwrap_or(0);
//!             Ok(())
//!         })
//!         .value("doubled", |d: &Counter| json!(d.count * 2))
//!         .root(
//!             StateConfig::new()
//!                 .initial("off")
//!                 .state("off", StateConfig::new().on("TOGGLE", to("on")))
//!                 .state(
//!                     "on",
//!                     StateConfig::new()
//!                         .on("TOGGLE", to("off"))
//!                         .on("ADD", Handler::new().run_named("add")),
//!                 ),
//!         ),
//! )
//! .unwrap();
//!
//! chart.send("TOGGLE", Value::Null).unwrap();
//! let snapshot = chart.send("ADD", json!(5)).unwrap();
//! assert_eq!(snapshot.data.count, 5);
//! assert_eq!(snapshot.values["doubled"], json!(10));
//! assert!(chart.is_in("on"));
//! ```

mod compile;
pub mod design;
pub mod export;
mod graph;
pub mod runtime;

// Re-export the common surface
pub use design::{
    to, ActionFn, ConditionFn, Design, DesignError, EventContext, EventHandler, Handler, ResultFn,
    StateConfig, Task, TaskFn, TaskFuture, TimeFn, ValueFn, Wait,
};
pub use export::{GraphDescription, GraphNode, GraphNodeKind};
pub use runtime::{ActionError, EventSender, Snapshot, Statechart, SubscriptionId};
