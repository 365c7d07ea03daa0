//! Variadic parameters.
//!
//! A `Varargs` value is a capability over a feed: the callsite's own feed
//! (so pulls continue after the creating call returned), a feed over a
//! materialized block, or a single-element feed holding the left operand of
//! an enfix call. Every pull follows the parameter's class and is type
//! checked against it.

use std::fmt;
use std::rc::Rc;

use super::context::EvalContext;
use super::errors::{ErrorKind, EvalError};
use super::feed::FeedHandle;
use super::frame::{FrameId, FrameRef, OutCell};
use super::fulfill::soft_escape;
use super::signal::Completion;
use super::step::eval_in_child;
use crate::backend::environment::Context;
use crate::backend::models::{Array, Param, ParamClass, Pull, TypeSet, Value};

struct VarargsState {
    feed: FeedHandle,
    pull: Pull,
    param: Param,
    label: Rc<str>,
    frame: Option<FrameRef>,
}

#[derive(Clone)]
pub struct Varargs(Rc<VarargsState>);

impl Varargs {
    pub fn from_feed(feed: FeedHandle, param: &Param, label: Rc<str>, frame: Option<FrameRef>) -> Self {
        let pull = match param.class {
            ParamClass::Variadic(pull) => pull,
            _ => Pull::Evaluate,
        };
        Varargs(Rc::new(VarargsState {
            feed,
            pull,
            param: param.clone(),
            label,
            frame,
        }))
    }

    /// Varargs over the items of a block, evaluated as they are taken
    pub fn from_block(items: Array, env: Context) -> Self {
        let mut param = Param::new("block", ParamClass::Variadic(Pull::Evaluate));
        param.types = TypeSet::any_value().with_opt();
        Varargs(Rc::new(VarargsState {
            feed: FeedHandle::over(items, env),
            pull: Pull::Evaluate,
            param,
            label: Rc::from("varargs"),
            frame: None,
        }))
    }

    /// Single-value varargs holding an enfix call's left operand
    pub fn from_left(left: Value, param: &Param, label: Rc<str>) -> Self {
        let items: Array = Rc::from(vec![left.quoted_if_needed()]);
        Varargs(Rc::new(VarargsState {
            feed: FeedHandle::over(items, Context::new()),
            pull: Pull::Evaluate,
            param: param.clone(),
            label,
            frame: None,
        }))
    }

    pub fn same_as(&self, other: &Varargs) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Frame of the call that created this varargs, if it came from a callsite
    pub fn frame(&self) -> Option<&FrameRef> {
        self.0.frame.as_ref()
    }

    pub fn is_tail(&self) -> bool {
        self.0.feed.at_arg_end()
    }

    /// Pull one value; at the tail `out` is set to null
    pub fn take(
        &self,
        ctx: &mut EvalContext,
        parent: Option<FrameId>,
        out: &mut OutCell,
    ) -> Result<Completion, EvalError> {
        let state = &self.0;
        if state.feed.at_arg_end() {
            out.set(Value::Null);
            return Ok(Completion::Done);
        }
        let feed = state.feed.clone();
        match state.pull {
            Pull::Evaluate => {
                try_done!(eval_in_child(ctx, &feed, parent, true, out)?);
            }
            Pull::Hard => {
                if let Some(unit) = feed.advance() {
                    out.set(unit);
                }
            }
            Pull::Soft => {
                if let Some(unit) = feed.advance() {
                    try_done!(soft_escape(ctx, parent, &feed, unit, out)?);
                }
            }
        }
        let value = out.get().cloned().unwrap_or(Value::Null);
        if !value.is_null() && !state.param.types.accepts(&value) {
            return Err(EvalError::new(ErrorKind::WrongType {
                action: state.label.to_string(),
                param: state.param.name.to_string(),
                got: value.kind(),
            }));
        }
        out.set(value);
        Ok(Completion::Done)
    }
}

impl fmt::Debug for Varargs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Varargs")
            .field("label", &self.0.label)
            .field("param", &self.0.param.name)
            .field("pull", &self.0.pull)
            .finish()
    }
}
