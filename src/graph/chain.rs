//! Compiled handler chains: every name resolved, every closure bound.

use super::target::CompiledTarget;
use crate::design::{ActionFn, ConditionFn, ResultFn, TaskFn, TimeFn};

/// A delay with its name lookup already done.
pub enum CompiledWait<D> {
    Secs(f64),
    Func(String, TimeFn<D>),
}

impl<D> CompiledWait<D> {
    /// Evaluate the delay, in seconds, against the current data.
    pub fn seconds(&self, data: &D) -> f64 {
        match self {
            CompiledWait::Secs(s) => *s,
            CompiledWait::Func(_, f) => f(data),
        }
    }
}

/// One compiled step of a handler chain. Field order mirrors evaluation
/// order: get, guards, actions, target/wait, else, halt.
pub struct CompiledHandler<D> {
    pub get: Vec<(String, ResultFn<D>)>,
    pub if_all: Vec<(String, ConditionFn<D>)>,
    pub unless: Vec<(String, ConditionFn<D>)>,
    pub if_any: Vec<(String, ConditionFn<D>)>,
    pub actions: Vec<(String, ActionFn<D>)>,
    pub target: Option<CompiledTarget>,
    pub wait: Option<CompiledWait<D>>,
    pub else_actions: Vec<(String, ActionFn<D>)>,
    pub otherwise: Option<Box<CompiledHandler<D>>>,
    pub halt: bool,
    pub secret: bool,
}

impl<D> CompiledHandler<D> {
    /// Whether running this handler (or any of its else-branches) could
    /// change observable state. Used by `can`.
    pub fn has_effect(&self) -> bool {
        !self.actions.is_empty() || self.target.is_some()
    }
}

pub type CompiledChain<D> = Vec<CompiledHandler<D>>;

pub struct CompiledRepeat<D> {
    pub delay: CompiledWait<D>,
    pub chain: CompiledChain<D>,
}

pub struct CompiledTask<D> {
    pub run: (String, TaskFn<D>),
    pub on_resolve: Option<CompiledChain<D>>,
    pub on_reject: Option<CompiledChain<D>>,
}
