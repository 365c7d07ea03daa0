//! Thrown signals: labeled non-local exits matched frame by frame.
//!
//! A signal travels upward as `Completion::Thrown` through every frame's
//! return value until a frame recognizes its label. Return signals carry
//! the identity of the activation they are addressed to, so only that
//! activation can catch them.

use std::fmt;
use std::rc::Rc;

use super::frame::FrameId;
use crate::backend::models::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum SignalLabel {
    /// Definitional return to one activation
    Return(FrameId),
    Break,
    Continue,
    /// `throw`, optionally named with `/name`
    Throw(Option<Value>),
    /// Raised at a poll checkpoint when the interrupt flag is set
    Halt,
    /// Labels owned by a dialect that intercepts them at its own boundary
    Dialect(Rc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub label: SignalLabel,
    pub payload: Value,
}

impl Signal {
    pub fn new(label: SignalLabel, payload: Value) -> Self {
        Signal { label, payload }
    }

    pub fn halt() -> Self {
        Signal::new(SignalLabel::Halt, Value::Null)
    }

    pub fn is_return_to(&self, id: FrameId) -> bool {
        self.label == SignalLabel::Return(id)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            SignalLabel::Return(id) => write!(f, "return to frame #{}", id)?,
            SignalLabel::Break => write!(f, "break")?,
            SignalLabel::Continue => write!(f, "continue")?,
            SignalLabel::Throw(None) => write!(f, "throw")?,
            SignalLabel::Throw(Some(name)) => write!(f, "throw/name {}", name)?,
            SignalLabel::Halt => write!(f, "halt")?,
            SignalLabel::Dialect(name) => write!(f, "{}", name)?,
        }
        if !self.payload.is_null() {
            write!(f, " with {}", self.payload)?;
        }
        Ok(())
    }
}

/// Outcome of running a frame that did not error
///
/// The produced value (if any) lives in the frame's output cell.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Done,
    Thrown(Signal),
}
