//! Enfix lookahead.
//!
//! Two checkpoints per step: before a unit is evaluated (left-quoting enfix
//! actions claim the raw unit) and after a value is produced (ordinary enfix
//! actions take it as their left operand). Suppression is checked in this
//! order: left-quoting actions are never taken after evaluation, then the
//! one-shot no-lookahead flag, then a stale left side, then deferral.

use tracing::trace;

use super::context::EvalContext;
use super::errors::EvalError;
use super::frame::{Frame, OutCell};
use super::fulfill::soft_escape;
use super::signal::Completion;
use super::step::{EvalState, PendingCall};
use crate::backend::models::{Deferral, ParamClass, Value};

/// Give a left-quoting enfix action after `unit` the chance to claim it
///
/// Only the unit after the current one is inspected, and nothing is
/// consumed unless the action takes the unit.
pub(crate) fn lookback_quote(
    ctx: &mut EvalContext,
    frame: &mut Frame,
    unit: Value,
) -> Result<EvalState, EvalError> {
    let feed = frame.feed.clone();
    let Some(Value::Word(name)) = feed.peek_next() else {
        return Ok(EvalState::Dispatch(unit));
    };
    let Some(Value::Action(action)) = feed.lookup(&name) else {
        return Ok(EvalState::Dispatch(unit));
    };
    if !action.quotes_first() {
        return Ok(EvalState::Dispatch(unit));
    }
    let Some(index) = action.first_arg_index() else {
        return Ok(EvalState::Dispatch(unit));
    };
    let param = &action.params[index];
    if param.types.is_skippable() && !param.types.accepts(&unit) {
        return Ok(EvalState::Dispatch(unit));
    }

    feed.advance();
    feed.advance();
    trace!(target: "reval::eval::lookahead", action = %name, left = %unit, "left quote claimed");

    let left = if param.class == ParamClass::SoftQuote {
        let mut out = OutCell::new();
        if let Completion::Thrown(signal) = soft_escape(ctx, Some(frame.id()), &feed, unit, &mut out)? {
            return Ok(EvalState::Thrown(signal));
        }
        out.take().unwrap_or(Value::Null)
    } else {
        unit
    };
    Ok(EvalState::ProcessAction(PendingCall::enfix(action, name, left)))
}

/// After a value was produced: dispatch a following enfix action, defer it,
/// or finish the step
pub(crate) fn post_switch(frame: &mut Frame) -> EvalState {
    let feed = frame.feed.clone();
    let Some(Value::Word(name)) = feed.peek() else {
        return EvalState::Finished;
    };
    // fetched again: the left side may have rebound the word
    let Some(Value::Action(action)) = feed.lookup(&name) else {
        return EvalState::Finished;
    };
    if !action.enfixed || action.quotes_first() {
        return EvalState::Finished;
    }
    if frame.no_lookahead {
        frame.no_lookahead = false;
        trace!(target: "reval::eval::lookahead", action = %name, "no-lookahead");
        return EvalState::Finished;
    }
    if frame.out.is_stale() && !action.tolerates_absent_left() {
        return EvalState::Finished;
    }
    if frame.fulfilling_arg {
        match action.deferral {
            Deferral::Defer if !feed.is_deferring() => {
                trace!(target: "reval::eval::lookahead", action = %name, "deferred");
                feed.set_deferring(true);
                return EvalState::Finished;
            }
            Deferral::Postpone => {
                trace!(target: "reval::eval::lookahead", action = %name, "postponed");
                feed.set_deferring(true);
                return EvalState::Finished;
            }
            _ => {}
        }
    }
    feed.set_deferring(false);
    feed.advance();
    let left = frame.out.take().unwrap_or(Value::Null);
    EvalState::ProcessAction(PendingCall::enfix(action, name, left))
}
