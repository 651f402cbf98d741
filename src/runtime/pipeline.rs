//! The handler pipeline executor.
//!
//! Runs one compiled handler chain left to right: `get` functions thread a
//! result, the guard block decides between the main path (`run` actions,
//! then `to`/`wait`) and the else path, and `halt` stops the chain whenever
//! its handler was reached.

use super::error::ActionError;
use super::transaction::{Op, Txn};
use super::transition::request_transition;
use crate::design::EventContext;
use crate::graph::{CompiledChain, CompiledHandler, NodeId};
use serde_json::Value;

enum Flow {
    Continue,
    Halt,
}

/// Run one chain on behalf of `node` inside the transaction.
pub fn run_chain<D: Clone>(
    txn: &mut Txn<'_, D>,
    node: NodeId,
    chain: &CompiledChain<D>,
    payload: &Value,
) -> Result<(), ActionError> {
    let mut cx = EventContext::new(payload.clone());
    for handler in chain {
        // The threaded result is scoped to one handler.
        cx.result = Value::Null;
        match run_handler(txn, node, handler, &mut cx)? {
            Flow::Halt => break,
            Flow::Continue => {}
        }
    }
    Ok(())
}

fn run_handler<D: Clone>(
    txn: &mut Txn<'_, D>,
    node: NodeId,
    handler: &CompiledHandler<D>,
    cx: &mut EventContext,
) -> Result<Flow, ActionError> {
    for (name, f) in &handler.get {
        cx.result = f(&txn.draft, cx).map_err(|message| ActionError::Result {
            name: name.clone(),
            message,
        })?;
    }

    if eval_guards(handler, &txn.draft, cx)? {
        for (name, f) in &handler.actions {
            f(&mut txn.draft, cx).map_err(|message| ActionError::Action {
                name: name.clone(),
                message,
            })?;
            if !handler.secret {
                txn.notify = true;
            }
        }
        if let Some(target) = &handler.target {
            match &handler.wait {
                Some(wait) => {
                    txn.ops.push(Op::ScheduleWait {
                        node,
                        epoch: txn.tree.epoch[node.index()],
                        delay_secs: wait.seconds(&txn.draft),
                        target: target.clone(),
                        secret: handler.secret,
                    });
                }
                None => request_transition(txn, node, target.clone(), handler.secret)?,
            }
        }
    } else if let Some(otherwise) = &handler.otherwise {
        // Same draft, same threaded result.
        let flow = run_handler(txn, node, otherwise, cx)?;
        if handler.halt {
            return Ok(Flow::Halt);
        }
        return Ok(flow);
    } else {
        for (name, f) in &handler.else_actions {
            f(&mut txn.draft, cx).map_err(|message| ActionError::Action {
                name: name.clone(),
                message,
            })?;
            if !handler.secret {
                txn.notify = true;
            }
        }
    }

    Ok(if handler.halt {
        Flow::Halt
    } else {
        Flow::Continue
    })
}

/// Combined guard outcome: every `when` truthy, every `unless` falsy, and
/// at least one `when_any` truthy. Missing groups are vacuously satisfied.
pub fn eval_guards<D>(
    handler: &CompiledHandler<D>,
    data: &D,
    cx: &EventContext,
) -> Result<bool, ActionError> {
    for (name, f) in &handler.if_all {
        if !check(name, f, data, cx)? {
            return Ok(false);
        }
    }
    for (name, f) in &handler.unless {
        if check(name, f, data, cx)? {
            return Ok(false);
        }
    }
    if !handler.if_any.is_empty() {
        let mut any = false;
        for (name, f) in &handler.if_any {
            if check(name, f, data, cx)? {
                any = true;
                break;
            }
        }
        if !any {
            return Ok(false);
        }
    }
    Ok(true)
}

fn check<D>(
    name: &str,
    f: &crate::design::ConditionFn<D>,
    data: &D,
    cx: &EventContext,
) -> Result<bool, ActionError> {
    f(data, cx).map_err(|message| ActionError::Condition {
        name: name.to_string(),
        message,
    })
}

/// `can`-mode evaluation: would any handler in this chain pass its guards
/// and do something? Runs `get` and guards only; failures evaluate as
/// "cannot" because a query must not fail.
pub fn can_chain<D>(chain: &CompiledChain<D>, data: &D, payload: &Value) -> bool {
    let mut cx = EventContext::new(payload.clone());
    for handler in chain {
        cx.result = Value::Null;
        if can_handler(handler, data, &mut cx) {
            return true;
        }
    }
    false
}

fn can_handler<D>(handler: &CompiledHandler<D>, data: &D, cx: &mut EventContext) -> bool {
    for (_, f) in &handler.get {
        match f(data, cx) {
            Ok(value) => cx.result = value,
            Err(_) => return false,
        }
    }
    match eval_guards(handler, data, cx) {
        Ok(true) => handler.has_effect(),
        Ok(false) => match &handler.otherwise {
            Some(otherwise) => can_handler(otherwise, data, cx),
            None => false,
        },
        Err(_) => false,
    }
}
