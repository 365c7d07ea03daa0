//! Frames: one evaluation activation each.
//!
//! Frames live on the Rust stack and are created through
//! [`EvalContext::with_frame`](super::context::EvalContext::with_frame).
//! When an activation must be addressed from outside (introspection, a
//! varargs value outliving its call) it is reified into a [`FrameRef`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::feed::FeedHandle;
use crate::backend::models::{Action, Value};

/// Identity of one activation, unique per `EvalContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output cell: holds a result or is marked stale
///
/// Marking stale keeps the previous value around so that a sequence of
/// steps can report the last value actually produced.
#[derive(Debug, Clone)]
pub struct OutCell {
    value: Option<Value>,
    stale: bool,
}

impl OutCell {
    pub fn new() -> Self {
        OutCell {
            value: None,
            stale: true,
        }
    }

    pub fn set(&mut self, value: Value) {
        self.value = Some(value);
        self.stale = false;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Value of the last step, if it produced one
    pub fn get(&self) -> Option<&Value> {
        if self.stale {
            None
        } else {
            self.value.as_ref()
        }
    }

    pub fn take(&mut self) -> Option<Value> {
        if self.stale {
            return None;
        }
        self.stale = true;
        self.value.take()
    }

    /// Last value ever produced, even if later steps were invisible
    pub fn into_last(self) -> Option<Value> {
        self.value
    }
}

impl Default for OutCell {
    fn default() -> Self {
        OutCell::new()
    }
}

/// A refinement named at the callsite, e.g. `/dup` in `append/dup`
#[derive(Debug, Clone)]
pub struct RefinementRequest {
    pub name: Rc<str>,
    /// Slot of the matching refinement parameter, once the first pass finds it
    pub offset: Option<usize>,
}

pub type Requests = SmallVec<[RefinementRequest; 4]>;

/// Per-call state while a frame is fulfilling and running an action
#[derive(Debug, Clone)]
pub struct CallState {
    pub action: Rc<Action>,
    pub label: Rc<str>,
    slots: SmallVec<[Value; 8]>,
    filled: SmallVec<[bool; 8]>,
    /// Next parameter of the main pass
    pub cursor: usize,
    pub requests: Requests,
    /// Requested refinements whose arguments are gathered after the main pass
    pub pickups: SmallVec<[usize; 4]>,
    /// Refinements switched on by a silenced modal argument
    pub modal_on: SmallVec<[usize; 2]>,
}

impl CallState {
    pub fn new(action: Rc<Action>, label: Rc<str>, requests: Requests) -> Self {
        let count = action.params.len();
        CallState {
            action,
            label,
            slots: SmallVec::from_elem(Value::Void, count),
            filled: SmallVec::from_elem(false, count),
            cursor: 0,
            requests,
            pickups: SmallVec::new(),
            modal_on: SmallVec::new(),
        }
    }

    pub fn fill(&mut self, index: usize, value: Value) {
        debug_assert!(!self.filled[index], "slot {} filled twice", index);
        self.slots[index] = value;
        self.filled[index] = true;
    }

    /// Overwrite an already filled slot (revocation and adapt preludes)
    pub fn refill(&mut self, index: usize, value: Value) {
        self.slots[index] = value;
        self.filled[index] = true;
    }

    pub fn is_filled(&self, index: usize) -> bool {
        self.filled[index]
    }

    pub fn all_filled(&self) -> bool {
        self.filled.iter().all(|f| *f)
    }

    pub fn slot(&self, index: usize) -> &Value {
        &self.slots[index]
    }

    pub fn slots(&self) -> &[Value] {
        &self.slots
    }
}

pub struct Frame {
    id: FrameId,
    parent: Option<FrameId>,
    pub feed: FeedHandle,
    pub out: OutCell,
    /// Set on frames evaluating an argument for an enclosing call
    pub fulfilling_arg: bool,
    /// Taken from the feed when a step starts
    pub no_lookahead: bool,
    pub call: Option<CallState>,
    reified: Option<FrameRef>,
}

impl Frame {
    pub(crate) fn new(id: FrameId, parent: Option<FrameId>, feed: FeedHandle) -> Self {
        Frame {
            id,
            parent,
            feed,
            out: OutCell::new(),
            fulfilling_arg: false,
            no_lookahead: false,
            call: None,
            reified: None,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn label(&self) -> Rc<str> {
        match &self.call {
            Some(call) => call.label.clone(),
            None => Rc::from("do"),
        }
    }

    /// Durable handle to this activation
    ///
    /// The argument snapshot is refreshed on every call so the handle reflects
    /// slots filled since it was first created.
    pub fn reify(&mut self) -> FrameRef {
        let args: Vec<(Rc<str>, Value)> = match &self.call {
            Some(call) => call
                .action
                .params
                .iter()
                .zip(call.slots.iter().zip(call.filled.iter()))
                .filter(|(_, (_, filled))| **filled)
                .map(|(param, (value, _))| (param.name.clone(), value.clone()))
                .collect(),
            None => Vec::new(),
        };
        match &self.reified {
            Some(existing) => {
                *existing.0.args.borrow_mut() = args;
                existing.clone()
            }
            None => {
                let reified = FrameRef(Rc::new(FrameInfo {
                    id: self.id,
                    label: self.label(),
                    args: RefCell::new(args),
                }));
                self.reified = Some(reified.clone());
                reified
            }
        }
    }
}

#[derive(Debug)]
struct FrameInfo {
    id: FrameId,
    label: Rc<str>,
    args: RefCell<Vec<(Rc<str>, Value)>>,
}

/// Reified frame, usable as a value
#[derive(Debug, Clone)]
pub struct FrameRef(Rc<FrameInfo>);

impl FrameRef {
    pub fn id(&self) -> FrameId {
        self.0.id
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    pub fn arg(&self, name: &str) -> Option<Value> {
        self.0
            .args
            .borrow()
            .iter()
            .find(|(param, _)| &**param == name)
            .map(|(_, value)| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_cell_stale_keeps_last() {
        let mut out = OutCell::new();
        assert!(out.is_stale());
        out.set(Value::Integer(1));
        assert_eq!(out.get(), Some(&Value::Integer(1)));
        out.mark_stale();
        assert_eq!(out.get(), None);
        assert_eq!(out.into_last(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_out_cell_take() {
        let mut out = OutCell::new();
        out.set(Value::Integer(2));
        assert_eq!(out.take(), Some(Value::Integer(2)));
        assert!(out.is_stale());
        assert_eq!(out.take(), None);
    }
}
