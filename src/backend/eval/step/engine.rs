//! Step driver.
//!
//! `eval_step` runs one expression from a frame's feed through the named
//! states of [`EvalState`]. Nested evaluation (arguments, groups, function
//! bodies) is ordinary recursion: each nested activation gets its own frame
//! through `EvalContext::with_frame`.

use std::rc::Rc;

use tracing::trace;

use super::types::{CallPhase, EvalState, PendingCall};
use crate::backend::environment::Context;
use crate::backend::eval::context::EvalContext;
use crate::backend::eval::errors::{ErrorKind, EvalError};
use crate::backend::eval::feed::FeedHandle;
use crate::backend::eval::frame::{CallState, Frame, FrameId, OutCell, Requests};
use crate::backend::eval::fulfill::{self, call_state_mut};
use crate::backend::eval::lookahead;
use crate::backend::eval::path::{self, PathOutcome};
use crate::backend::eval::signal::{Completion, Signal, SignalLabel};
use crate::backend::models::{Action, Array, Deferral, Dispatcher, ParamClass, Value};
use crate::backend::natives::{Bounce, Call};

/// Evaluate one expression from the frame's feed
///
/// On `Completion::Done` the frame's output holds the value, or is stale if
/// the step was invisible or the feed was already at its end.
pub fn eval_step(ctx: &mut EvalContext, frame: &mut Frame) -> Result<Completion, EvalError> {
    frame.out.mark_stale();
    frame.no_lookahead = frame.feed.take_no_lookahead();
    try_done!(ctx.poll());

    let mut state = EvalState::Start;
    loop {
        if ctx.config.trace_steps {
            trace!(
                target: "reval::eval::step",
                tick = ctx.tick(),
                frame = %frame.id(),
                state = state.name()
            );
        }
        state = match state {
            EvalState::Start => start(frame),
            EvalState::LookbackQuote(unit) => lookahead::lookback_quote(ctx, frame, unit)?,
            EvalState::Dispatch(unit) => dispatch(ctx, frame, unit)?,
            EvalState::ProcessAction(pending) => process_action(ctx, frame, pending)?,
            EvalState::PostSwitch => lookahead::post_switch(frame),
            EvalState::Thrown(signal) => return Ok(Completion::Thrown(signal)),
            EvalState::Finished => return Ok(Completion::Done),
        };
    }
}

/// Step until something visible is produced or the feed runs out
pub fn eval_step_skipping_invisibles(
    ctx: &mut EvalContext,
    frame: &mut Frame,
) -> Result<Completion, EvalError> {
    // an invisible step must not use up the suppression meant for the value
    let no_lookahead = frame.feed.take_no_lookahead();
    loop {
        if no_lookahead {
            frame.feed.set_no_lookahead();
        }
        try_done!(eval_step(ctx, frame)?);
        if !frame.out.is_stale() || frame.feed.at_arg_end() {
            return Ok(Completion::Done);
        }
    }
}

/// Evaluate a feed to its end
///
/// `out` receives the last value produced; it stays stale if every step was
/// invisible.
pub fn do_feed(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    out: &mut OutCell,
) -> Result<Completion, EvalError> {
    ctx.with_frame(feed, parent, None, |ctx, frame| {
        while !frame.feed.is_end() {
            try_done!(eval_step(ctx, frame)?);
        }
        if let Some(value) = std::mem::take(&mut frame.out).into_last() {
            out.set(value);
        }
        Ok(Completion::Done)
    })
}

pub fn do_array(
    ctx: &mut EvalContext,
    parent: Option<FrameId>,
    array: Array,
    env: Context,
    out: &mut OutCell,
) -> Result<Completion, EvalError> {
    do_feed(ctx, &FeedHandle::over(array, env), parent, out)
}

/// Evaluate one argument-like expression in a child frame sharing `feed`
pub(crate) fn eval_in_child(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    fulfilling_arg: bool,
    out: &mut OutCell,
) -> Result<Completion, EvalError> {
    ctx.with_frame(feed, parent, None, |ctx, child| {
        child.fulfilling_arg = fulfilling_arg;
        let completion = eval_step_skipping_invisibles(ctx, child)?;
        if let Some(value) = child.out.take() {
            out.set(value);
        }
        Ok(completion)
    })
}

/// Evaluate the payload of a `@` silenced reference
pub(crate) fn eval_sym(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    payload: Value,
    out: &mut OutCell,
) -> Result<Completion, EvalError> {
    match payload {
        Value::Word(name) => out.set(feed.resolve_get(&name)?),
        Value::Group(items) => return do_array(ctx, parent, items, feed.env(), out),
        Value::Path(items) | Value::GetPath(items) => {
            match path::eval_path(ctx, feed, parent, &items, false)? {
                PathOutcome::Value(value) => out.set(value),
                PathOutcome::Thrown(signal) => return Ok(Completion::Thrown(signal)),
                PathOutcome::Call(_) => {}
            }
        }
        other => out.set(other),
    }
    Ok(Completion::Done)
}

fn start(frame: &mut Frame) -> EvalState {
    match frame.feed.peek() {
        None => EvalState::Finished,
        Some(Value::Comma) => {
            frame.feed.advance();
            EvalState::Finished
        }
        Some(unit) => EvalState::LookbackQuote(unit),
    }
}

fn dispatch(ctx: &mut EvalContext, frame: &mut Frame, unit: Value) -> Result<EvalState, EvalError> {
    frame.feed.advance();
    let parent = Some(frame.id());
    let next = match unit {
        Value::Null
        | Value::Void
        | Value::Blank
        | Value::Logic(_)
        | Value::Integer(_)
        | Value::Decimal(_)
        | Value::Text(_)
        | Value::Tag(_)
        | Value::Refinement(_)
        | Value::Block(_)
        | Value::Datatype(_)
        | Value::Varargs(_)
        | Value::Frame(_)
        | Value::Error(_) => {
            frame.out.set(unit);
            EvalState::PostSwitch
        }
        Value::Quoted(inner) => {
            frame.out.set(*inner);
            EvalState::PostSwitch
        }
        Value::Word(name) => {
            let value = frame
                .feed
                .resolve(&name)
                .map_err(|err| err.near(&Value::Word(name.clone())))?;
            match value {
                Value::Action(action) => call_from_word(frame, action, name)?,
                other => {
                    frame.out.set(other);
                    EvalState::PostSwitch
                }
            }
        }
        Value::GetWord(name) => {
            frame.out.set(frame.feed.resolve_get(&name)?);
            EvalState::PostSwitch
        }
        Value::SetWord(name) => set_word(ctx, frame, name)?,
        Value::Sym(payload) => {
            let mut out = OutCell::new();
            let feed = frame.feed.clone();
            into_state(frame, eval_sym(ctx, &feed, parent, *payload, &mut out)?, out)
        }
        Value::Group(items) => {
            let mut out = OutCell::new();
            let env = frame.feed.env();
            into_state(frame, do_array(ctx, parent, items, env, &mut out)?, out)
        }
        Value::Path(items) => {
            let feed = frame.feed.clone();
            match path::eval_path(ctx, &feed, parent, &items, true)? {
                PathOutcome::Call(pending) => EvalState::ProcessAction(pending),
                PathOutcome::Value(value) => {
                    frame.out.set(value);
                    EvalState::PostSwitch
                }
                PathOutcome::Thrown(signal) => EvalState::Thrown(signal),
            }
        }
        Value::GetPath(items) => {
            let feed = frame.feed.clone();
            match path::eval_path(ctx, &feed, parent, &items, false)? {
                PathOutcome::Value(value) => {
                    frame.out.set(value);
                    EvalState::PostSwitch
                }
                PathOutcome::Thrown(signal) => EvalState::Thrown(signal),
                PathOutcome::Call(_) => {
                    return Err(EvalError::new(ErrorKind::BadPath(
                        Value::GetPath(items).to_string(),
                    )))
                }
            }
        }
        Value::SetPath(items) => set_path(ctx, frame, items)?,
        Value::Action(action) => {
            let label = action
                .label
                .clone()
                .unwrap_or_else(|| Rc::from("anonymous"));
            EvalState::ProcessAction(PendingCall::prefix(action, label, Requests::new()))
        }
        Value::Comma => EvalState::Finished,
    };
    Ok(next)
}

/// Output of a nested evaluation becomes this step's output; an evaluation
/// that produced nothing leaves the step invisible.
fn into_state(frame: &mut Frame, completion: Completion, out: OutCell) -> EvalState {
    match completion {
        Completion::Thrown(signal) => EvalState::Thrown(signal),
        Completion::Done => {
            if let Some(value) = out.into_last() {
                frame.out.set(value);
            }
            EvalState::PostSwitch
        }
    }
}

fn call_from_word(frame: &Frame, action: Rc<Action>, name: Rc<str>) -> Result<EvalState, EvalError> {
    if !action.enfixed {
        return Ok(EvalState::ProcessAction(PendingCall::prefix(
            action,
            name,
            Requests::new(),
        )));
    }
    if action.deferral != Deferral::None && frame.feed.is_deferring() {
        return Err(EvalError::new(ErrorKind::AmbiguousInfix(name.to_string())));
    }
    if !action.tolerates_absent_left() {
        return Err(EvalError::new(ErrorKind::MissingLeft(name.to_string()))
            .near(&Value::Word(name)));
    }
    Ok(EvalState::ProcessAction(PendingCall::enfix(
        action,
        name,
        Value::Null,
    )))
}

/// Evaluate the right-hand side of a set-word or set-path
fn eval_rhs(
    ctx: &mut EvalContext,
    frame: &Frame,
    target: &Value,
    out: &mut OutCell,
) -> Result<Completion, EvalError> {
    let need_value = || EvalError::new(ErrorKind::NeedValue(target.to_string())).near(target);
    if frame.feed.at_arg_end() {
        return Err(need_value());
    }
    try_done!(eval_in_child(ctx, &frame.feed, Some(frame.id()), false, out)?);
    if out.is_stale() {
        return Err(need_value());
    }
    Ok(Completion::Done)
}

fn set_word(ctx: &mut EvalContext, frame: &mut Frame, name: Rc<str>) -> Result<EvalState, EvalError> {
    let mut out = OutCell::new();
    if let Completion::Thrown(signal) = eval_rhs(ctx, frame, &Value::SetWord(name.clone()), &mut out)? {
        return Ok(EvalState::Thrown(signal));
    }
    let value = out.take().unwrap_or(Value::Null);
    frame.feed.env().assign(&name, value.clone());
    frame.out.set(value);
    Ok(EvalState::PostSwitch)
}

fn set_path(ctx: &mut EvalContext, frame: &mut Frame, items: Array) -> Result<EvalState, EvalError> {
    let mut out = OutCell::new();
    let target = Value::SetPath(items.clone());
    if let Completion::Thrown(signal) = eval_rhs(ctx, frame, &target, &mut out)? {
        return Ok(EvalState::Thrown(signal));
    }
    let value = out.take().unwrap_or(Value::Null);
    let feed = frame.feed.clone();
    if let Completion::Thrown(signal) =
        path::assign(ctx, &feed, Some(frame.id()), &items, value.clone())?
    {
        return Ok(EvalState::Thrown(signal));
    }
    frame.out.set(value);
    Ok(EvalState::PostSwitch)
}

fn process_action(
    ctx: &mut EvalContext,
    frame: &mut Frame,
    pending: PendingCall,
) -> Result<EvalState, EvalError> {
    let feed = frame.feed.clone();
    let label = pending.label.clone();
    let (completion, value) = ctx
        .with_frame(&feed, Some(frame.id()), Some(label), |ctx, call_frame| {
            let completion = run_call(ctx, call_frame, pending)?;
            Ok((completion, call_frame.out.take()))
        })
        .map_err(|err| match feed.lookback() {
            Some(unit) => err.near(&unit),
            None => err,
        })?;
    match completion {
        Completion::Thrown(signal) => Ok(EvalState::Thrown(signal)),
        Completion::Done => {
            match value {
                Some(value) => frame.out.set(value),
                None => frame.out.mark_stale(),
            }
            Ok(EvalState::PostSwitch)
        }
    }
}

/// Fulfill and run an action in `frame`, redoing as its dispatcher asks
fn run_call(
    ctx: &mut EvalContext,
    frame: &mut Frame,
    pending: PendingCall,
) -> Result<Completion, EvalError> {
    let PendingCall {
        action,
        label,
        left,
        requests,
    } = pending;
    trace!(
        target: "reval::eval::call",
        action = %label,
        frame = %frame.id(),
        enfix = left.is_some(),
        "invoke"
    );
    frame.call = Some(CallState::new(action, label, requests));

    let mut phase = CallPhase::Fulfill { left };
    loop {
        phase = match phase {
            CallPhase::Fulfill { left } => {
                try_done!(fulfill::fulfill(ctx, frame, left)?);
                CallPhase::Run
            }
            CallPhase::Run => match run_dispatcher(ctx, frame)? {
                Bounce::Out(value) => {
                    frame.out.set(value);
                    return Ok(Completion::Done);
                }
                Bounce::Invisible => {
                    frame.out.mark_stale();
                    return Ok(Completion::Done);
                }
                Bounce::Thrown(signal) => return Ok(Completion::Thrown(signal)),
                Bounce::Redo { phase, checked } => CallPhase::Redo { phase, checked },
            },
            CallPhase::Redo { phase, checked } => {
                let call = call_state_mut(frame)?;
                if !Rc::ptr_eq(&call.action.params, &phase.params) {
                    return Err(EvalError::native(format!(
                        "{} cannot redo into an action with a different parameter list",
                        call.label
                    )));
                }
                trace!(target: "reval::eval::call", action = %call.label, checked, "redo");
                call.action = phase;
                if checked {
                    fulfill::typecheck_all(call)?;
                }
                CallPhase::Run
            }
        };
    }
}

fn run_dispatcher(ctx: &mut EvalContext, frame: &mut Frame) -> Result<Bounce, EvalError> {
    let Some(mut state) = frame.call.take() else {
        return Err(EvalError::native("frame has no action to dispatch"));
    };
    let action = state.action.clone();
    let result = match &action.dispatcher {
        Dispatcher::Native(native) => native.dispatch(&mut Call::new(ctx, frame, &mut state)),
        Dispatcher::Interpreted { body, env } => run_body(ctx, frame.id(), &state, body, env),
        Dispatcher::Adapted {
            prelude,
            env,
            adaptee,
        } => run_prelude(ctx, frame.id(), &mut state, prelude, env, adaptee),
        Dispatcher::Return(target) => Ok(Bounce::Thrown(Signal::new(
            SignalLabel::Return(*target),
            state.slot(0).clone(),
        ))),
    };
    frame.call = Some(state);
    result
}

fn bind_params(state: &CallState, scope: &Context) {
    for (index, (param, value)) in state.action.params.iter().zip(state.slots()).enumerate() {
        if state.action.binds_as_word(index) {
            scope.define(&param.name, value.clone());
        }
    }
}

fn run_body(
    ctx: &mut EvalContext,
    id: FrameId,
    state: &CallState,
    body: &Array,
    env: &Context,
) -> Result<Bounce, EvalError> {
    let scope = env.child();
    bind_params(state, &scope);
    let mut out = OutCell::new();
    let result = match do_array(ctx, Some(id), body.clone(), scope, &mut out)? {
        Completion::Thrown(signal) if signal.is_return_to(id) => {
            trace!(target: "reval::eval::call", frame = %id, "return caught");
            signal.payload
        }
        Completion::Thrown(signal) => return Ok(Bounce::Thrown(signal)),
        Completion::Done => out.take().unwrap_or(Value::Void),
    };
    let returns = state
        .action
        .params
        .iter()
        .find(|p| p.class == ParamClass::Return);
    if let Some(param) = returns {
        if !param.types.accepts(&result) {
            return Err(EvalError::new(ErrorKind::WrongType {
                action: state.label.to_string(),
                param: param.name.to_string(),
                got: result.kind(),
            }));
        }
    }
    Ok(Bounce::Out(result))
}

fn run_prelude(
    ctx: &mut EvalContext,
    id: FrameId,
    state: &mut CallState,
    prelude: &Array,
    env: &Context,
    adaptee: &Rc<Action>,
) -> Result<Bounce, EvalError> {
    let scope = env.child();
    bind_params(state, &scope);
    let mut out = OutCell::new();
    if let Completion::Thrown(signal) = do_array(ctx, Some(id), prelude.clone(), scope.clone(), &mut out)? {
        return Ok(Bounce::Thrown(signal));
    }
    let params = state.action.params.clone();
    for (index, param) in params.iter().enumerate() {
        if matches!(param.class, ParamClass::Local | ParamClass::Return)
            || !state.action.binds_as_word(index)
        {
            continue;
        }
        if let Some(value) = scope.lookup(&param.name) {
            state.refill(index, value);
        }
    }
    Ok(Bounce::Redo {
        phase: adaptee.clone(),
        checked: true,
    })
}
