use std::fmt;
use std::rc::Rc;

use itertools::Itertools;

use super::action::Action;
use crate::backend::eval::errors::EvalError;
use crate::backend::eval::frame::FrameRef;
use crate::backend::eval::varargs::Varargs;

/// Shared immutable sequence of values (block, group and path payloads)
pub type Array = Rc<[Value]>;

/// A cell as the evaluator sees it: a kind tag plus payload
#[derive(Debug, Clone)]
pub enum Value {
    /// The "not present" sentinel
    Null,
    /// Explicitly-undefined placeholder (`~`)
    Void,
    /// `_`
    Blank,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    Text(Rc<str>),
    Tag(Rc<str>),
    /// `/name`
    Refinement(Rc<str>),
    Block(Array),
    Datatype(Kind),
    Action(Rc<Action>),
    Varargs(Varargs),
    Frame(FrameRef),
    Error(Rc<EvalError>),
    Word(Rc<str>),
    /// `name:`
    SetWord(Rc<str>),
    /// `:name`
    GetWord(Rc<str>),
    /// `@payload`, the silenced reference consumed by modal parameters
    Sym(Box<Value>),
    /// `'payload`
    Quoted(Box<Value>),
    Path(Array),
    SetPath(Array),
    GetPath(Array),
    Group(Array),
    /// `,` expression barrier
    Comma,
}

/// Kind tag of a [`Value`]
///
/// The discriminant doubles as the bit position inside a [`TypeSet`](super::TypeSet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Null,
    Void,
    Blank,
    Logic,
    Integer,
    Decimal,
    Text,
    Tag,
    Refinement,
    Block,
    Datatype,
    Action,
    Varargs,
    Frame,
    Error,
    Word,
    SetWord,
    GetWord,
    Sym,
    Quoted,
    Path,
    SetPath,
    GetPath,
    Group,
    Comma,
}

impl Kind {
    pub const ALL: [Kind; 25] = [
        Kind::Null,
        Kind::Void,
        Kind::Blank,
        Kind::Logic,
        Kind::Integer,
        Kind::Decimal,
        Kind::Text,
        Kind::Tag,
        Kind::Refinement,
        Kind::Block,
        Kind::Datatype,
        Kind::Action,
        Kind::Varargs,
        Kind::Frame,
        Kind::Error,
        Kind::Word,
        Kind::SetWord,
        Kind::GetWord,
        Kind::Sym,
        Kind::Quoted,
        Kind::Path,
        Kind::SetPath,
        Kind::GetPath,
        Kind::Group,
        Kind::Comma,
    ];

    /// Inert kinds evaluate to themselves; everything else has evaluator behavior.
    ///
    /// Actions are the one runtime kind that is not inert: an action found
    /// directly in a feed is invoked.
    pub fn is_inert(self) -> bool {
        match self {
            Kind::Null
            | Kind::Void
            | Kind::Blank
            | Kind::Logic
            | Kind::Integer
            | Kind::Decimal
            | Kind::Text
            | Kind::Tag
            | Kind::Refinement
            | Kind::Block
            | Kind::Datatype
            | Kind::Varargs
            | Kind::Frame
            | Kind::Error => true,
            Kind::Action
            | Kind::Word
            | Kind::SetWord
            | Kind::GetWord
            | Kind::Sym
            | Kind::Quoted
            | Kind::Path
            | Kind::SetPath
            | Kind::GetPath
            | Kind::Group
            | Kind::Comma => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Void => "void!",
            Kind::Blank => "blank!",
            Kind::Logic => "logic!",
            Kind::Integer => "integer!",
            Kind::Decimal => "decimal!",
            Kind::Text => "text!",
            Kind::Tag => "tag!",
            Kind::Refinement => "refinement!",
            Kind::Block => "block!",
            Kind::Datatype => "datatype!",
            Kind::Action => "action!",
            Kind::Varargs => "varargs!",
            Kind::Frame => "frame!",
            Kind::Error => "error!",
            Kind::Word => "word!",
            Kind::SetWord => "set-word!",
            Kind::GetWord => "get-word!",
            Kind::Sym => "sym!",
            Kind::Quoted => "quoted!",
            Kind::Path => "path!",
            Kind::SetPath => "set-path!",
            Kind::GetPath => "get-path!",
            Kind::Group => "group!",
            Kind::Comma => "comma!",
        }
    }

    /// Look up a datatype by its `name!` spelling
    pub fn from_name(name: &str) -> Option<Kind> {
        Kind::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Void => Kind::Void,
            Value::Blank => Kind::Blank,
            Value::Logic(_) => Kind::Logic,
            Value::Integer(_) => Kind::Integer,
            Value::Decimal(_) => Kind::Decimal,
            Value::Text(_) => Kind::Text,
            Value::Tag(_) => Kind::Tag,
            Value::Refinement(_) => Kind::Refinement,
            Value::Block(_) => Kind::Block,
            Value::Datatype(_) => Kind::Datatype,
            Value::Action(_) => Kind::Action,
            Value::Varargs(_) => Kind::Varargs,
            Value::Frame(_) => Kind::Frame,
            Value::Error(_) => Kind::Error,
            Value::Word(_) => Kind::Word,
            Value::SetWord(_) => Kind::SetWord,
            Value::GetWord(_) => Kind::GetWord,
            Value::Sym(_) => Kind::Sym,
            Value::Quoted(_) => Kind::Quoted,
            Value::Path(_) => Kind::Path,
            Value::SetPath(_) => Kind::SetPath,
            Value::GetPath(_) => Kind::GetPath,
            Value::Group(_) => Kind::Group,
            Value::Comma => Kind::Comma,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.kind().is_inert()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Conditional truth: null, blank, void and `false` are falsey
    pub fn is_truthy(&self) -> bool {
        !matches!(
            self,
            Value::Null | Value::Blank | Value::Void | Value::Logic(false)
        )
    }

    pub fn word(name: &str) -> Value {
        Value::Word(Rc::from(name))
    }

    pub fn text(text: &str) -> Value {
        Value::Text(Rc::from(text))
    }

    pub fn block(items: Vec<Value>) -> Value {
        Value::Block(Rc::from(items))
    }

    pub fn group(items: Vec<Value>) -> Value {
        Value::Group(Rc::from(items))
    }

    /// Spelling of any word-like value, used for refinement requests and
    /// error messages.
    pub fn as_word_name(&self) -> Option<&Rc<str>> {
        match self {
            Value::Word(name)
            | Value::SetWord(name)
            | Value::GetWord(name)
            | Value::Refinement(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Rc<Action>> {
        match self {
            Value::Action(action) => Some(action),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Block(items)
            | Value::Group(items)
            | Value::Path(items)
            | Value::SetPath(items)
            | Value::GetPath(items) => Some(items),
            _ => None,
        }
    }

    /// Wrap a value so that evaluating it yields the value itself
    ///
    /// Inert values are already self-evaluating and are returned as-is.
    pub fn quoted_if_needed(self) -> Value {
        if self.is_inert() {
            self
        } else {
            Value::Quoted(Box::new(self))
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null)
            | (Value::Void, Value::Void)
            | (Value::Blank, Value::Blank)
            | (Value::Comma, Value::Comma) => true,
            (Value::Logic(a), Value::Logic(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Integer(a), Value::Decimal(b)) | (Value::Decimal(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Text(a), Value::Text(b))
            | (Value::Tag(a), Value::Tag(b))
            | (Value::Refinement(a), Value::Refinement(b))
            | (Value::Word(a), Value::Word(b))
            | (Value::SetWord(a), Value::SetWord(b))
            | (Value::GetWord(a), Value::GetWord(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) | (Value::Quoted(a), Value::Quoted(b)) => a == b,
            (Value::Block(a), Value::Block(b))
            | (Value::Group(a), Value::Group(b))
            | (Value::Path(a), Value::Path(b))
            | (Value::SetPath(a), Value::SetPath(b))
            | (Value::GetPath(a), Value::GetPath(b)) => a == b,
            (Value::Datatype(a), Value::Datatype(b)) => a == b,
            (Value::Action(a), Value::Action(b)) => Rc::ptr_eq(a, b),
            (Value::Varargs(a), Value::Varargs(b)) => a.same_as(b),
            (Value::Frame(a), Value::Frame(b)) => a.id() == b.id(),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn mold_series(f: &mut fmt::Formatter<'_>, items: &[Value], sep: &str) -> fmt::Result {
    write!(f, "{}", items.iter().join(sep))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Void => write!(f, "~"),
            Value::Blank => write!(f, "_"),
            Value::Logic(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Decimal(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Tag(s) => write!(f, "<{}>", s),
            Value::Refinement(s) => write!(f, "/{}", s),
            Value::Block(items) => {
                write!(f, "[")?;
                mold_series(f, items, " ")?;
                write!(f, "]")
            }
            Value::Group(items) => {
                write!(f, "(")?;
                mold_series(f, items, " ")?;
                write!(f, ")")
            }
            Value::Path(items) => mold_series(f, items, "/"),
            Value::SetPath(items) => {
                mold_series(f, items, "/")?;
                write!(f, ":")
            }
            Value::GetPath(items) => {
                write!(f, ":")?;
                mold_series(f, items, "/")
            }
            Value::Datatype(kind) => write!(f, "{}", kind),
            Value::Action(action) => write!(f, "#[action! {}]", action.label_or("anonymous")),
            Value::Varargs(_) => write!(f, "#[varargs!]"),
            Value::Frame(frame) => write!(f, "#[frame! {} #{}]", frame.label(), frame.id()),
            Value::Error(err) => write!(f, "#[error! {}]", err),
            Value::Word(s) => write!(f, "{}", s),
            Value::SetWord(s) => write!(f, "{}:", s),
            Value::GetWord(s) => write!(f, ":{}", s),
            Value::Sym(inner) => write!(f, "@{}", inner),
            Value::Quoted(inner) => write!(f, "'{}", inner),
            Value::Comma => write!(f, ","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inert_partition() {
        assert!(Kind::Integer.is_inert());
        assert!(Kind::Block.is_inert());
        assert!(Kind::Refinement.is_inert());
        assert!(!Kind::Word.is_inert());
        assert!(!Kind::Group.is_inert());
        assert!(!Kind::Action.is_inert());
        assert!(!Kind::Comma.is_inert());
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(Kind::from_name("bogus!"), None);
    }

    #[test]
    fn test_mold() {
        let v = Value::block(vec![
            Value::Integer(1),
            Value::SetWord("x".into()),
            Value::Path(Rc::from(vec![Value::word("a"), Value::word("b")])),
            Value::group(vec![Value::word("f"), Value::text("s")]),
            Value::Quoted(Box::new(Value::word("q"))),
        ]);
        assert_eq!(v.to_string(), "[1 x: a/b (f \"s\") 'q]");
        assert_eq!(Value::Decimal(2.0).to_string(), "2.0");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Logic(false).is_truthy());
        assert!(!Value::Blank.is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::text("").is_truthy());
    }

    #[test]
    fn test_quoted_if_needed_keeps_inert() {
        assert_eq!(Value::Integer(3).quoted_if_needed(), Value::Integer(3));
        assert_eq!(
            Value::word("x").quoted_if_needed(),
            Value::Quoted(Box::new(Value::word("x")))
        );
    }
}
