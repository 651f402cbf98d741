//! Run-time errors surfaced to `send` callers.

use thiserror::Error;

/// A user function failed during a transaction.
///
/// Whatever the variant, the transaction that contained it was discarded in
/// full: data, active states and timers are exactly as they were before the
/// dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("action `{name}` failed: {message}")]
    Action { name: String, message: String },

    #[error("condition `{name}` failed: {message}")]
    Condition { name: String, message: String },

    #[error("result `{name}` failed: {message}")]
    Result { name: String, message: String },

    #[error("too many chained transitions while handling `{event}`")]
    TransitionOverflow { event: String },

    #[error("statechart has been disposed")]
    Disposed,
}
