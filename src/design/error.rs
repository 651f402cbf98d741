//! Compile-time errors raised while turning a design into a statechart.

use thiserror::Error;

/// Errors detected while compiling a [`Design`](crate::Design).
///
/// All variants are fatal: the statechart is never constructed. Run-time
/// failures inside user functions are [`ActionError`](crate::ActionError)
/// instead.
#[derive(Debug, Error)]
pub enum DesignError {
    #[error("unknown {kind} `{name}` referenced from state `{path}`")]
    UnresolvedFunction {
        kind: &'static str,
        name: String,
        path: String,
    },

    #[error("target `{target}` from state `{path}` does not resolve to any state")]
    UnresolvedTarget { target: String, path: String },

    #[error("target on state `{path}` is empty. Give it a state name, e.g. .to(\"idle\")")]
    EmptyTarget { path: String },

    #[error("initial state `{name}` is not a child of `{path}`")]
    UnknownInitial { name: String, path: String },

    #[error("parallel state `{path}` cannot declare an initial child")]
    ParallelInitial { path: String },

    #[error("duplicate child state `{name}` under `{path}`")]
    DuplicateState { name: String, path: String },

    #[error("initial entry failed: {0}")]
    Init(#[from] crate::runtime::ActionError),
}
