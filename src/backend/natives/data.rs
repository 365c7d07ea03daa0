// =============================================================================
// Evaluation and Data Access
// =============================================================================

use std::rc::Rc;

use itertools::Itertools;

use super::{Bounce, Call, Native, NativeResult};
use crate::backend::eval::errors::{ErrorKind, EvalError};
use crate::backend::eval::feed::FeedHandle;
use crate::backend::eval::frame::OutCell;
use crate::backend::eval::path::{self, PathOutcome};
use crate::backend::eval::signal::Completion;
use crate::backend::eval::step::eval_step;
use crate::backend::models::{Array, Deferral, Value};
use crate::scanner::scan;

/// Evaluate every expression of `block`, keeping the non-null results
fn reduce_block(call: &mut Call<'_>, block: Array) -> Result<Result<Vec<Value>, Bounce>, EvalError> {
    let feed = FeedHandle::over(block, call.env());
    let parent = Some(call.frame_id());
    let mut values = Vec::new();
    let completion = call.ctx().with_frame(&feed, parent, None, |ctx, frame| {
        while !frame.feed.is_end() {
            try_done!(eval_step(ctx, frame)?);
            if let Some(value) = frame.out.get() {
                if !value.is_null() {
                    values.push(value.clone());
                }
            }
        }
        Ok(Completion::Done)
    })?;
    Ok(match completion {
        Completion::Done => Ok(values),
        Completion::Thrown(signal) => Err(Bounce::Thrown(signal)),
    })
}

pub struct DoOp;

impl Native for DoOp {
    fn name(&self) -> &str {
        "do"
    }

    fn spec(&self) -> &str {
        r#""Evaluate a block, group or source text" source [block! group! text!]"#
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let code: Array = match call.arg(0) {
            Value::Block(items) | Value::Group(items) => items.clone(),
            Value::Text(text) => {
                let items = scan(text).map_err(|err| EvalError::native(err.to_string()))?;
                Rc::from(items)
            }
            _ => return Err(call.mismatch(0)),
        };
        let mut out = OutCell::new();
        try_bounce!(call.do_block(&code, &mut out)?);
        Ok(Bounce::Out(out.into_last().unwrap_or(Value::Void)))
    }
}

pub struct ReduceOp;

impl Native for ReduceOp {
    fn name(&self) -> &str {
        "reduce"
    }

    fn spec(&self) -> &str {
        "block [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let block = call.block(0)?;
        match reduce_block(call, block)? {
            Ok(values) => Ok(Bounce::Out(Value::block(values))),
            Err(bounce) => Ok(bounce),
        }
    }
}

/// `quote x` adds one level of quoting to the unevaluated unit
pub struct QuoteOp;

impl Native for QuoteOp {
    fn name(&self) -> &str {
        "quote"
    }

    fn spec(&self) -> &str {
        "'value [any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Out(Value::Quoted(Box::new(call.arg(0).clone()))))
    }
}

/// `the x` gives back the unevaluated unit as-is
pub struct TheOp;

impl Native for TheOp {
    fn name(&self) -> &str {
        "the"
    }

    fn spec(&self) -> &str {
        "'value [any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Out(call.arg(0).clone()))
    }
}

pub struct CommentOp;

impl Native for CommentOp {
    fn name(&self) -> &str {
        "comment"
    }

    fn spec(&self) -> &str {
        "'discarded [block! text! any-value!]"
    }

    fn dispatch(&self, _call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Invisible)
    }
}

/// Evaluate an expression for its side effects only
pub struct ElideOp;

impl Native for ElideOp {
    fn name(&self) -> &str {
        "elide"
    }

    fn spec(&self) -> &str {
        "discarded [<opt> any-value! void!]"
    }

    fn dispatch(&self, _call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Invisible)
    }
}

pub struct GetOp;

impl Native for GetOp {
    fn name(&self) -> &str {
        "get"
    }

    fn spec(&self) -> &str {
        "source [word! get-word! path!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        match call.arg(0).clone() {
            Value::Word(name) | Value::GetWord(name) => call
                .env()
                .lookup(&name)
                .map(Bounce::Out)
                .ok_or_else(|| EvalError::new(ErrorKind::UnboundName(name.to_string()))),
            Value::Path(items) => {
                let feed = call.feed();
                let parent = Some(call.frame_id());
                match path::eval_path(call.ctx(), &feed, parent, &items, false)? {
                    PathOutcome::Value(value) => Ok(Bounce::Out(value)),
                    PathOutcome::Thrown(signal) => Ok(Bounce::Thrown(signal)),
                    PathOutcome::Call(_) => Err(call.mismatch(0)),
                }
            }
            _ => Err(call.mismatch(0)),
        }
    }
}

pub struct SetOp;

impl Native for SetOp {
    fn name(&self) -> &str {
        "set"
    }

    fn spec(&self) -> &str {
        "target [word! set-word!] value [<opt> any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let Some(name) = call.arg(0).as_word_name().cloned() else {
            return Err(call.mismatch(0));
        };
        let value = call.arg(1).clone();
        call.env().assign(&name, value.clone());
        Ok(Bounce::Out(value))
    }
}

pub struct TypeOfOp;

impl Native for TypeOfOp {
    fn name(&self) -> &str {
        "type-of"
    }

    fn spec(&self) -> &str {
        "value [<opt> any-value! void!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Out(match call.arg(0) {
            Value::Null => Value::Null,
            other => Value::Datatype(other.kind()),
        }))
    }
}

pub struct NullQOp;

impl Native for NullQOp {
    fn name(&self) -> &str {
        "null?"
    }

    fn spec(&self) -> &str {
        "value [<opt> any-value! void!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Out(Value::Logic(call.arg(0).is_null())))
    }
}

/// Print text as-is; a block is reduced and its values joined with spaces
pub struct PrintOp;

impl Native for PrintOp {
    fn name(&self) -> &str {
        "print"
    }

    fn spec(&self) -> &str {
        "line [<opt> any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let line = match call.arg(0).clone() {
            Value::Null => return Ok(Bounce::Out(Value::Null)),
            Value::Block(items) => match reduce_block(call, items)? {
                Ok(values) => values.iter().map(form).join(" "),
                Err(bounce) => return Ok(bounce),
            },
            other => form(&other),
        };
        println!("{}", line);
        Ok(Bounce::Out(Value::Void))
    }
}

fn form(value: &Value) -> String {
    match value {
        Value::Text(text) => text.to_string(),
        other => other.to_string(),
    }
}

/// `x: default [value]` assigns only when `x` is unset, null or blank
pub struct DefaultOp;

impl Native for DefaultOp {
    fn name(&self) -> &str {
        "default"
    }

    fn spec(&self) -> &str {
        "'target [set-word! set-path!] branch [block!]"
    }

    fn enfix(&self) -> Option<Deferral> {
        Some(Deferral::None)
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let branch = call.block(1)?;
        let feed = call.feed();
        let parent = Some(call.frame_id());
        let current = match call.arg(0).clone() {
            Value::SetWord(name) => call.env().lookup(&name),
            Value::SetPath(items) => match path::eval_path(call.ctx(), &feed, parent, &items, false)? {
                PathOutcome::Value(value) => Some(value),
                PathOutcome::Thrown(signal) => return Ok(Bounce::Thrown(signal)),
                PathOutcome::Call(_) => return Err(call.mismatch(0)),
            },
            _ => return Err(call.mismatch(0)),
        };
        if let Some(value) = current.filter(|v| !matches!(v, Value::Null | Value::Blank | Value::Void)) {
            return Ok(Bounce::Out(value));
        }

        let mut out = OutCell::new();
        try_bounce!(call.do_block(&branch, &mut out)?);
        let value = out.into_last().unwrap_or(Value::Null);
        match call.arg(0).clone() {
            Value::SetWord(name) => call.env().assign(&name, value.clone()),
            Value::SetPath(items) => {
                try_bounce!(path::assign(call.ctx(), &feed, parent, &items, value.clone())?);
            }
            _ => return Err(call.mismatch(0)),
        }
        Ok(Bounce::Out(value))
    }
}
