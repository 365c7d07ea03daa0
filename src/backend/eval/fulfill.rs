//! Argument fulfillment.
//!
//! Parameters are walked in declaration order. Refinements requested at the
//! callsite only record their slot during the main pass; their arguments are
//! gathered afterwards in a pickup pass, again in declaration order, so the
//! order refinements were written in never changes how arguments bind.

use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use super::context::EvalContext;
use super::errors::{ErrorKind, EvalError};
use super::feed::FeedHandle;
use super::frame::{CallState, Frame, FrameId, OutCell};
use super::path::{self, PathOutcome};
use super::signal::Completion;
use super::step::{do_array, eval_in_child, eval_sym};
use super::varargs::Varargs;
use crate::backend::models::{Action, Deferral, Dispatcher, Param, ParamClass, TypeSet, Value};

enum Gathered {
    Value(Value),
    /// Nothing at the callsite and the parameter allows that; slot gets null
    Absent,
    Thrown(super::signal::Signal),
}

pub(crate) fn call_state(frame: &Frame) -> Result<&CallState, EvalError> {
    frame
        .call
        .as_ref()
        .ok_or_else(|| EvalError::native("frame is not calling an action"))
}

pub(crate) fn call_state_mut(frame: &mut Frame) -> Result<&mut CallState, EvalError> {
    frame
        .call
        .as_mut()
        .ok_or_else(|| EvalError::native("frame is not calling an action"))
}

/// Fill every argument slot of the action the frame is calling
pub(crate) fn fulfill(
    ctx: &mut EvalContext,
    frame: &mut Frame,
    left: Option<Value>,
) -> Result<Completion, EvalError> {
    let action = call_state(frame)?.action.clone();
    if let Some(left) = left {
        fill_left(frame, &action, left)?;
    }

    loop {
        let index = {
            let call = call_state_mut(frame)?;
            let index = call.cursor;
            if index >= action.params.len() {
                break;
            }
            call.cursor += 1;
            if call.is_filled(index) {
                continue;
            }
            index
        };
        let param = &action.params[index];
        if param.refinement.is_some() {
            // filled along with (or after) the refinement that owns it
            continue;
        }
        if param.class == ParamClass::Refinement {
            first_pass_refinement(frame, &action, index)?;
        } else {
            try_done!(fill_param(ctx, frame, &action, index)?);
        }
    }

    check_requests(call_state(frame)?)?;

    let pickups = call_state(frame)?.pickups.clone();
    for refinement in pickups {
        let args: SmallVec<[usize; 4]> = action.refinement_args(refinement).collect();
        for &index in &args {
            if !call_state(frame)?.is_filled(index) {
                try_done!(fill_param(ctx, frame, &action, index)?);
            }
        }
        revoke_if_null(call_state_mut(frame)?, refinement, &args)?;
    }

    debug_assert!(call_state(frame)?.all_filled());
    Ok(Completion::Done)
}

fn fill_left(frame: &mut Frame, action: &Rc<Action>, left: Value) -> Result<(), EvalError> {
    let call = call_state_mut(frame)?;
    let Some(index) = action.first_arg_index() else {
        return Err(EvalError::native(format!(
            "{} has no parameter for its left operand",
            call.label
        )));
    };
    let param = &action.params[index];
    let value = match param.class {
        ParamClass::Variadic(_) => {
            Value::Varargs(Varargs::from_left(left, param, call.label.clone()))
        }
        _ => left,
    };
    if !(value.is_null() && param.types.is_endable()) {
        typecheck(&call.label, param, &value)?;
    }
    call.fill(index, value);
    Ok(())
}

fn first_pass_refinement(
    frame: &mut Frame,
    action: &Rc<Action>,
    index: usize,
) -> Result<(), EvalError> {
    let param = &action.params[index];
    let call = call_state_mut(frame)?;
    let requested = call
        .requests
        .iter_mut()
        .find(|request| request.offset.is_none() && request.name == param.name);
    let used = match (requested, action.exemplar_slot(index)) {
        (Some(_), Some(preset)) if !preset.is_truthy() => {
            return Err(EvalError::new(ErrorKind::BadRefinement(format!(
                "/{} is specialized out of {}",
                param.name, call.label
            ))));
        }
        (Some(request), _) => {
            request.offset = Some(index);
            true
        }
        (None, Some(preset)) => preset.is_truthy(),
        (None, None) => call.modal_on.contains(&index),
    };

    if used {
        call.fill(index, Value::Refinement(param.name.clone()));
        if action.refinement_args(index).next().is_some() {
            call.pickups.push(index);
        }
    } else {
        call.fill(index, Value::Null);
        for arg in action.refinement_args(index) {
            call.fill(arg, Value::Null);
        }
    }
    Ok(())
}

fn check_requests(call: &CallState) -> Result<(), EvalError> {
    match call.requests.iter().find(|request| request.offset.is_none()) {
        Some(missing) => Err(EvalError::new(ErrorKind::BadRefinement(format!(
            "{} has no refinement /{}",
            call.label, missing.name
        )))),
        None => Ok(()),
    }
}

/// A refinement whose arguments came back null was not really requested
fn revoke_if_null(call: &mut CallState, refinement: usize, args: &[usize]) -> Result<(), EvalError> {
    let Some(&first) = args.first() else {
        return Ok(());
    };
    let revoked = call.slot(first).is_null();
    if args.iter().any(|&arg| call.slot(arg).is_null() != revoked) {
        let name = call.action.params[refinement].name.to_string();
        return Err(EvalError::new(ErrorKind::BadRefineRevoke {
            action: call.label.to_string(),
            refinement: name,
        }));
    }
    if revoked {
        trace!(
            target: "reval::eval::fulfill",
            action = %call.label,
            refinement = %call.action.params[refinement].name,
            "revoked"
        );
        call.refill(refinement, Value::Null);
    }
    Ok(())
}

fn fill_param(
    ctx: &mut EvalContext,
    frame: &mut Frame,
    action: &Rc<Action>,
    index: usize,
) -> Result<Completion, EvalError> {
    let param = &action.params[index];
    let label = call_state(frame)?.label.clone();

    if let Some(preset) = action.exemplar_slot(index) {
        if !(preset.is_null() && param.refinement.is_some()) {
            typecheck(&label, param, preset)?;
        }
        call_state_mut(frame)?.fill(index, preset.clone());
        return Ok(Completion::Done);
    }

    let value = match param.class {
        ParamClass::Local => Value::Void,
        ParamClass::Return => Value::Action(Rc::new(return_action(frame.id()))),
        ParamClass::Variadic(_) => {
            let reified = frame.reify();
            Value::Varargs(Varargs::from_feed(
                frame.feed.clone(),
                param,
                label,
                Some(reified),
            ))
        }
        ParamClass::Refinement => {
            return Err(EvalError::native(format!(
                "refinement /{} reached argument gathering",
                param.name
            )))
        }
        ParamClass::Normal | ParamClass::HardQuote | ParamClass::SoftQuote | ParamClass::Modal => {
            match gather(ctx, frame, action, index)? {
                Gathered::Value(value) => {
                    if !(value.is_null() && param.refinement.is_some()) {
                        typecheck(&label, param, &value)?;
                    }
                    value
                }
                Gathered::Absent => Value::Null,
                Gathered::Thrown(signal) => return Ok(Completion::Thrown(signal)),
            }
        }
    };
    call_state_mut(frame)?.fill(index, value);
    Ok(Completion::Done)
}

/// Take an argument from the callsite according to the parameter's class
fn gather(
    ctx: &mut EvalContext,
    frame: &mut Frame,
    action: &Rc<Action>,
    index: usize,
) -> Result<Gathered, EvalError> {
    let param = &action.params[index];
    let feed = frame.feed.clone();
    let label = call_state(frame)?.label.clone();

    if feed.at_arg_end() {
        let skippable = param.class == ParamClass::HardQuote && param.types.is_skippable();
        if param.types.is_endable() || skippable {
            return Ok(Gathered::Absent);
        }
        return Err(no_arg(&label, param));
    }
    if feed.is_deferring() {
        let pending = feed.peek().map(|unit| unit.to_string()).unwrap_or_default();
        return Err(EvalError::new(ErrorKind::AmbiguousInfix(pending)).in_action(&label));
    }

    let parent = Some(frame.id());
    let mut out = OutCell::new();
    match param.class {
        ParamClass::HardQuote => {
            let Some(unit) = feed.peek() else {
                return Err(no_arg(&label, param));
            };
            if param.types.is_skippable() && !param.types.accepts(&unit) {
                return Ok(Gathered::Absent);
            }
            feed.advance();
            Ok(Gathered::Value(unit))
        }
        ParamClass::SoftQuote => {
            let Some(unit) = feed.advance() else {
                return Err(no_arg(&label, param));
            };
            if let Completion::Thrown(signal) = soft_escape(ctx, parent, &feed, unit, &mut out)? {
                return Ok(Gathered::Thrown(signal));
            }
            Ok(Gathered::Value(out.take().unwrap_or(Value::Null)))
        }
        ParamClass::Modal => match feed.peek() {
            Some(Value::Sym(payload)) => {
                check_modal_refinement(action, &label, index)?;
                feed.advance();
                if let Completion::Thrown(signal) = eval_sym(ctx, &feed, parent, *payload, &mut out)? {
                    return Ok(Gathered::Thrown(signal));
                }
                call_state_mut(frame)?.modal_on.push(index + 1);
                Ok(Gathered::Value(out.take().unwrap_or(Value::Null)))
            }
            _ => gather_evaluated(ctx, &feed, parent, action, param, &label),
        },
        _ => gather_evaluated(ctx, &feed, parent, action, param, &label),
    }
}

fn gather_evaluated(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    action: &Action,
    param: &Param,
    label: &Rc<str>,
) -> Result<Gathered, EvalError> {
    if action.enfixed {
        feed.set_no_lookahead();
    }
    let mut out = OutCell::new();
    if let Completion::Thrown(signal) = eval_in_child(ctx, feed, parent, true, &mut out)? {
        return Ok(Gathered::Thrown(signal));
    }
    match out.take() {
        Some(value) => Ok(Gathered::Value(value)),
        None if param.types.is_endable() => Ok(Gathered::Absent),
        None => Err(no_arg(label, param)),
    }
}

fn check_modal_refinement(action: &Action, label: &Rc<str>, index: usize) -> Result<(), EvalError> {
    let argless = action
        .params
        .get(index + 1)
        .is_some_and(|next| next.class == ParamClass::Refinement)
        && action.refinement_args(index + 1).next().is_none();
    if argless {
        Ok(())
    } else {
        Err(EvalError::new(ErrorKind::ModalWithoutRefinement {
            action: label.to_string(),
            param: action.params[index].name.to_string(),
        }))
    }
}

/// Soft quoting: the unit is taken literally unless it is a group, get-word
/// or get-path, which are evaluated
pub(crate) fn soft_escape(
    ctx: &mut EvalContext,
    parent: Option<FrameId>,
    feed: &FeedHandle,
    unit: Value,
    out: &mut OutCell,
) -> Result<Completion, EvalError> {
    match unit {
        Value::Group(items) => do_array(ctx, parent, items, feed.env(), out),
        Value::GetWord(name) => {
            out.set(feed.resolve_get(&name)?);
            Ok(Completion::Done)
        }
        Value::GetPath(items) => match path::eval_path(ctx, feed, parent, &items, false)? {
            PathOutcome::Value(value) => {
                out.set(value);
                Ok(Completion::Done)
            }
            PathOutcome::Thrown(signal) => Ok(Completion::Thrown(signal)),
            PathOutcome::Call(_) => Err(EvalError::new(ErrorKind::BadPath(
                Value::GetPath(items).to_string(),
            ))),
        },
        other => {
            out.set(other);
            Ok(Completion::Done)
        }
    }
}

fn typecheck(label: &Rc<str>, param: &Param, value: &Value) -> Result<(), EvalError> {
    if param.types.accepts(value) {
        Ok(())
    } else {
        Err(EvalError::new(ErrorKind::WrongType {
            action: label.to_string(),
            param: param.name.to_string(),
            got: value.kind(),
        }))
    }
}

fn no_arg(label: &Rc<str>, param: &Param) -> EvalError {
    EvalError::new(ErrorKind::NoArg {
        action: label.to_string(),
        param: param.name.to_string(),
    })
}

/// Re-check every callsite slot, used when a redo asks for it
pub(crate) fn typecheck_all(call: &CallState) -> Result<(), EvalError> {
    for (index, param) in call.action.params.iter().enumerate() {
        if !param.class.takes_callsite_arg() || matches!(param.class, ParamClass::Variadic(_)) {
            continue;
        }
        let value = call.slot(index);
        let may_be_absent = param.refinement.is_some()
            || param.types.is_endable()
            || param.types.is_skippable();
        if value.is_null() && may_be_absent {
            continue;
        }
        typecheck(&call.label, param, value)?;
    }
    Ok(())
}

/// The `return` given to one activation of an interpreted function
fn return_action(id: FrameId) -> Action {
    let mut value = Param::new("value", ParamClass::Normal);
    value.types = TypeSet::anything().with_end();
    Action {
        label: Some(Rc::from("return")),
        params: Rc::from(vec![value]),
        dispatcher: Dispatcher::Return(id),
        exemplar: None,
        enfixed: false,
        deferral: Deferral::None,
        description: None,
    }
}
