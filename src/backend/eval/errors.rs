use std::fmt;
use std::rc::Rc;

use crate::backend::models::{Kind, Value};

/// Fatal evaluation failure
///
/// Errors unwind immediately through `?` to the nearest `trap` (or the host);
/// they never take part in frame-by-frame signal matching.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    UnboundName(String),
    /// Word bound to the void placeholder
    VoidRead(String),
    WrongType {
        action: String,
        param: String,
        got: Kind,
    },
    /// End of feed (or a barrier) where an argument was required
    NoArg {
        action: String,
        param: String,
    },
    MissingLeft(String),
    /// Set-word or set-path with nothing to assign
    NeedValue(String),
    BadRefinement(String),
    BadRefineRevoke {
        action: String,
        refinement: String,
    },
    BadParamSpec(String),
    ModalWithoutRefinement {
        action: String,
        param: String,
    },
    AmbiguousInfix(String),
    StackOverflow(usize),
    NotAction(String),
    BadPath(String),
    /// Failure raised inside a native implementation
    Native(String),
    /// `fail` from user code
    User(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: ErrorKind,
    /// Molded code unit the error was raised near
    pub near: Option<String>,
    /// Label of the innermost named activation
    pub label: Option<Rc<str>>,
}

impl EvalError {
    pub fn new(kind: ErrorKind) -> Self {
        EvalError {
            kind,
            near: None,
            label: None,
        }
    }

    pub fn near(mut self, unit: &Value) -> Self {
        if self.near.is_none() {
            self.near = Some(unit.to_string());
        }
        self
    }

    pub(crate) fn in_action(mut self, label: &Rc<str>) -> Self {
        if self.label.is_none() {
            self.label = Some(label.clone());
        }
        self
    }

    pub fn native(message: impl Into<String>) -> Self {
        EvalError::new(ErrorKind::Native(message.into()))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnboundName(name) => write!(f, "{} has no value", name),
            ErrorKind::VoidRead(name) => write!(f, "{} is void", name),
            ErrorKind::WrongType { action, param, got } => {
                write!(f, "{} does not allow {} for its {} argument", action, got, param)
            }
            ErrorKind::NoArg { action, param } => {
                write!(f, "{} is missing its {} argument", action, param)
            }
            ErrorKind::MissingLeft(action) => {
                write!(f, "{} has no value on its left to consume", action)
            }
            ErrorKind::NeedValue(target) => write!(f, "{} needs a value", target),
            ErrorKind::BadRefinement(detail) => write!(f, "bad refinement: {}", detail),
            ErrorKind::BadRefineRevoke { action, refinement } => write!(
                f,
                "{}/{} arguments must be all null or all non-null",
                action, refinement
            ),
            ErrorKind::BadParamSpec(detail) => write!(f, "bad parameter spec: {}", detail),
            ErrorKind::ModalWithoutRefinement { action, param } if action.is_empty() => {
                write!(f, "modal parameter @{} has no refinement after it", param)
            }
            ErrorKind::ModalWithoutRefinement { action, param } => write!(
                f,
                "{} modal parameter @{} has no refinement after it",
                action, param
            ),
            ErrorKind::AmbiguousInfix(name) => {
                write!(f, "ambiguous infix: {} deferred while another deferral is pending", name)
            }
            ErrorKind::StackOverflow(depth) => write!(f, "stack overflow at depth {}", depth),
            ErrorKind::NotAction(what) => write!(f, "{} is not an action", what),
            ErrorKind::BadPath(path) => write!(f, "cannot evaluate path {}", path),
            ErrorKind::Native(msg) => write!(f, "{}", msg),
            ErrorKind::User(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(near) = &self.near {
            write!(f, " (near {})", near)?;
        }
        if let Some(label) = &self.label {
            write!(f, " (where {})", label)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_near_and_where() {
        let err = EvalError::new(ErrorKind::UnboundName("foo".into()))
            .near(&Value::word("foo"))
            .in_action(&Rc::from("bar"));
        assert_eq!(err.to_string(), "foo has no value (near foo) (where bar)");
    }

    #[test]
    fn test_first_location_wins() {
        let err = EvalError::native("boom")
            .near(&Value::Integer(1))
            .near(&Value::Integer(2));
        assert_eq!(err.near.as_deref(), Some("1"));
    }
}
