//! Resumption points of one evaluation step.

use std::rc::Rc;

use crate::backend::eval::frame::Requests;
use crate::backend::eval::signal::Signal;
use crate::backend::models::{Action, Value};

/// States of the step driver in `engine::eval_step`
#[derive(Debug)]
pub(crate) enum EvalState {
    /// Look at the feed's current unit
    Start,
    /// Before evaluating `unit`, see if a left-quoting enfix action claims it
    LookbackQuote(Value),
    /// Evaluate `unit` according to its kind
    Dispatch(Value),
    /// Push a call frame, fulfill and run the action
    ProcessAction(PendingCall),
    /// A value was produced; check for enfix lookahead
    PostSwitch,
    Thrown(Signal),
    Finished,
}

impl EvalState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            EvalState::Start => "start",
            EvalState::LookbackQuote(_) => "lookback-quote",
            EvalState::Dispatch(_) => "dispatch",
            EvalState::ProcessAction(_) => "process-action",
            EvalState::PostSwitch => "post-switch",
            EvalState::Thrown(_) => "thrown",
            EvalState::Finished => "finished",
        }
    }
}

/// Phases of a call frame once the action is known
#[derive(Debug)]
pub(crate) enum CallPhase {
    Fulfill { left: Option<Value> },
    Run,
    /// Dispatch again with the same slots, retyping them when `checked`
    Redo { phase: Rc<Action>, checked: bool },
}

/// An action about to be invoked, with its callsite information
#[derive(Debug)]
pub(crate) struct PendingCall {
    pub action: Rc<Action>,
    pub label: Rc<str>,
    /// Left operand for enfix calls
    pub left: Option<Value>,
    pub requests: Requests,
}

impl PendingCall {
    pub(crate) fn prefix(action: Rc<Action>, label: Rc<str>, requests: Requests) -> Self {
        PendingCall {
            action,
            label,
            left: None,
            requests,
        }
    }

    pub(crate) fn enfix(action: Rc<Action>, label: Rc<str>, left: Value) -> Self {
        PendingCall {
            action,
            label,
            left: Some(left),
            requests: Requests::new(),
        }
    }
}
