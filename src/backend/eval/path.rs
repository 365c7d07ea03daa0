//! Paths: `append/dup` calls with refinements, `block/2` picking and
//! `block/2: value` assignment.

use std::rc::Rc;

use super::context::EvalContext;
use super::errors::{ErrorKind, EvalError};
use super::feed::FeedHandle;
use super::frame::{FrameId, OutCell, RefinementRequest, Requests};
use super::signal::{Completion, Signal};
use super::step::{do_array, PendingCall};
use crate::backend::models::{Array, Value};

pub(crate) enum PathOutcome {
    Call(PendingCall),
    Value(Value),
    Thrown(Signal),
}

fn bad_path(items: &Array) -> EvalError {
    EvalError::new(ErrorKind::BadPath(Value::Path(items.clone()).to_string()))
}

fn eval_group(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    items: &Array,
) -> Result<PathOutcome, EvalError> {
    let mut out = OutCell::new();
    if let Completion::Thrown(signal) = do_array(ctx, parent, items.clone(), feed.env(), &mut out)? {
        return Ok(PathOutcome::Thrown(signal));
    }
    Ok(PathOutcome::Value(out.into_last().unwrap_or(Value::Null)))
}

/// Evaluate a path
///
/// With `invoke` set, an action at the head becomes a pending call whose
/// remaining segments are refinement requests; otherwise the action itself
/// is the result and refinements are rejected.
pub(crate) fn eval_path(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    items: &Array,
    invoke: bool,
) -> Result<PathOutcome, EvalError> {
    let Some(head) = items.first() else {
        return Err(bad_path(items));
    };
    let (head_value, label) = match head {
        Value::Word(name) => (feed.resolve(name)?, name.clone()),
        Value::Group(group) => match eval_group(ctx, feed, parent, group)? {
            PathOutcome::Value(value) => (value, Rc::from("anonymous")),
            other => return Ok(other),
        },
        other if other.is_inert() => (other.clone(), Rc::from("anonymous")),
        _ => return Err(bad_path(items)),
    };

    if let Value::Action(action) = head_value {
        if !invoke {
            if items.len() > 1 {
                return Err(bad_path(items));
            }
            return Ok(PathOutcome::Value(Value::Action(action)));
        }
        let mut requests = Requests::new();
        for segment in &items[1..] {
            let name = match segment {
                Value::Word(name) => Some(name.clone()),
                Value::Group(group) => match eval_group(ctx, feed, parent, group)? {
                    PathOutcome::Value(Value::Word(name))
                    | PathOutcome::Value(Value::Refinement(name)) => Some(name),
                    PathOutcome::Value(Value::Blank) | PathOutcome::Value(Value::Null) => None,
                    PathOutcome::Value(other) => {
                        return Err(EvalError::new(ErrorKind::BadRefinement(format!(
                            "{} cannot name a refinement",
                            other
                        ))))
                    }
                    other => return Ok(other),
                },
                other => {
                    return Err(EvalError::new(ErrorKind::BadRefinement(format!(
                        "{} cannot name a refinement",
                        other
                    ))))
                }
            };
            let Some(name) = name else { continue };
            if requests.iter().any(|request| request.name == name) {
                return Err(EvalError::new(ErrorKind::BadRefinement(format!(
                    "/{} requested twice",
                    name
                ))));
            }
            requests.push(RefinementRequest { name, offset: None });
        }
        return Ok(PathOutcome::Call(PendingCall::prefix(action, label, requests)));
    }

    let mut current = head_value;
    for segment in &items[1..] {
        let key = match segment {
            Value::Group(group) => match eval_group(ctx, feed, parent, group)? {
                PathOutcome::Value(value) => value,
                other => return Ok(other),
            },
            other => other.clone(),
        };
        current = pick(&current, &key).ok_or_else(|| bad_path(items))?;
    }
    Ok(PathOutcome::Value(current))
}

/// Index into a block (1-based, null past the end) or select by word
fn pick(container: &Value, key: &Value) -> Option<Value> {
    match (container, key) {
        (Value::Block(items) | Value::Group(items), Value::Integer(n)) => {
            let index = usize::try_from(*n).ok()?.checked_sub(1)?;
            Some(items.get(index).cloned().unwrap_or(Value::Null))
        }
        (Value::Block(items), Value::Word(name)) => {
            let position = items.iter().position(|item| {
                matches!(item, Value::Word(w) | Value::SetWord(w) if w == name)
            })?;
            Some(items.get(position + 1).cloned().unwrap_or(Value::Null))
        }
        (Value::Text(text), Value::Integer(n)) => {
            let index = usize::try_from(*n).ok()?.checked_sub(1)?;
            Some(
                text.chars()
                    .nth(index)
                    .map(|c| Value::text(&c.to_string()))
                    .unwrap_or(Value::Null),
            )
        }
        (Value::Frame(frame), Value::Word(name)) => frame.arg(name),
        _ => None,
    }
}

/// `word/key: value` where `word` holds a block
pub(crate) fn assign(
    ctx: &mut EvalContext,
    feed: &FeedHandle,
    parent: Option<FrameId>,
    items: &Array,
    value: Value,
) -> Result<Completion, EvalError> {
    let [Value::Word(head), segment] = &items[..] else {
        return Err(bad_path(items));
    };
    let key = match segment {
        Value::Group(group) => match eval_group(ctx, feed, parent, group)? {
            PathOutcome::Value(key) => key,
            PathOutcome::Thrown(signal) => return Ok(Completion::Thrown(signal)),
            PathOutcome::Call(_) => return Err(bad_path(items)),
        },
        other => other.clone(),
    };
    let Value::Block(block) = feed.resolve(head)? else {
        return Err(bad_path(items));
    };
    let mut updated: Vec<Value> = block.to_vec();
    let index = match &key {
        Value::Integer(n) => usize::try_from(*n)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|i| *i < updated.len()),
        Value::Word(name) => updated
            .iter()
            .position(|item| matches!(item, Value::Word(w) | Value::SetWord(w) if w == name))
            .map(|i| i + 1)
            .filter(|i| *i < updated.len()),
        _ => None,
    };
    let Some(index) = index else {
        return Err(bad_path(items));
    };
    updated[index] = value;
    feed.env().assign(head, Value::Block(Rc::from(updated)));
    Ok(Completion::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_by_index_and_word() {
        let block = Value::block(vec![
            Value::SetWord("a".into()),
            Value::Integer(10),
            Value::word("b"),
            Value::Integer(20),
        ]);
        assert_eq!(pick(&block, &Value::Integer(2)), Some(Value::Integer(10)));
        assert_eq!(pick(&block, &Value::Integer(9)), Some(Value::Null));
        assert_eq!(pick(&block, &Value::Integer(0)), None);
        assert_eq!(pick(&block, &Value::word("a")), Some(Value::Integer(10)));
        assert_eq!(pick(&block, &Value::word("b")), Some(Value::Integer(20)));
        assert_eq!(pick(&block, &Value::word("zz")), None);
    }

    #[test]
    fn test_pick_text() {
        assert_eq!(pick(&Value::text("abc"), &Value::Integer(2)), Some(Value::text("b")));
    }
}
