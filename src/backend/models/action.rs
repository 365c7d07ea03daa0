//! Actions, their parameter lists and the parameter-spec dialect
//!
//! An [`Action`] is immutable once created. Specialization and adaptation
//! build new actions sharing the same parameter list.

use std::fmt;
use std::rc::Rc;

use super::value::{Array, Kind, Value};
use crate::backend::environment::Context;
use crate::backend::eval::errors::{ErrorKind, EvalError};
use crate::backend::eval::frame::FrameId;
use crate::backend::natives::Native;

/// How an enfixed action treats pending argument gathering to its left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferral {
    /// Dispatch as soon as a left value exists
    None,
    /// Let the enclosing call finish gathering, then take its result as left
    Defer,
    /// Keep deferring until no frame is gathering an argument
    Postpone,
}

/// How a variadic parameter evaluates each value it pulls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Evaluate,
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    Normal,
    HardQuote,
    SoftQuote,
    Modal,
    Variadic(Pull),
    Local,
    Return,
    Refinement,
}

impl ParamClass {
    /// Classes that are filled from the callsite
    pub fn takes_callsite_arg(self) -> bool {
        matches!(
            self,
            ParamClass::Normal
                | ParamClass::HardQuote
                | ParamClass::SoftQuote
                | ParamClass::Modal
                | ParamClass::Variadic(_)
        )
    }

    pub fn is_quoting(self) -> bool {
        matches!(self, ParamClass::HardQuote | ParamClass::SoftQuote)
    }
}

/// Accepted kinds of a parameter plus the `<opt> <end> <skip>` markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSet {
    kinds: u32,
    flags: u8,
}

const FLAG_OPT: u8 = 1;
const FLAG_END: u8 = 1 << 1;
const FLAG_SKIP: u8 = 1 << 2;

impl TypeSet {
    pub const fn empty() -> Self {
        TypeSet { kinds: 0, flags: 0 }
    }

    /// Everything except null and void
    pub fn any_value() -> Self {
        let mut set = TypeSet::empty();
        for kind in Kind::ALL {
            if kind != Kind::Null && kind != Kind::Void {
                set.insert(kind);
            }
        }
        set
    }

    /// Every kind including null and void
    pub fn anything() -> Self {
        TypeSet::of(&Kind::ALL).with_opt()
    }

    pub fn of(kinds: &[Kind]) -> Self {
        let mut set = TypeSet::empty();
        for kind in kinds {
            set.insert(*kind);
        }
        set
    }

    pub fn insert(&mut self, kind: Kind) {
        self.kinds |= 1 << (kind as u8);
    }

    pub fn contains(&self, kind: Kind) -> bool {
        self.kinds & (1 << (kind as u8)) != 0
    }

    pub fn is_optional(&self) -> bool {
        self.flags & FLAG_OPT != 0
    }

    pub fn is_endable(&self) -> bool {
        self.flags & FLAG_END != 0
    }

    pub fn is_skippable(&self) -> bool {
        self.flags & FLAG_SKIP != 0
    }

    pub fn with_opt(mut self) -> Self {
        self.flags |= FLAG_OPT;
        self
    }

    pub fn with_end(mut self) -> Self {
        self.flags |= FLAG_END;
        self
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Null => self.is_optional() || self.contains(Kind::Null),
            other => self.contains(other.kind()),
        }
    }

    fn merge_typeset_word(&mut self, name: &str) -> bool {
        let group: &[Kind] = match name {
            "any-value!" => {
                self.kinds |= TypeSet::any_value().kinds;
                return true;
            }
            "any-word!" => &[Kind::Word, Kind::SetWord, Kind::GetWord, Kind::Refinement],
            "any-number!" | "number!" => &[Kind::Integer, Kind::Decimal],
            "any-array!" => &[
                Kind::Block,
                Kind::Group,
                Kind::Path,
                Kind::SetPath,
                Kind::GetPath,
            ],
            "any-path!" => &[Kind::Path, Kind::SetPath, Kind::GetPath],
            _ => match Kind::from_name(name) {
                Some(kind) => {
                    self.insert(kind);
                    return true;
                }
                None => return false,
            },
        };
        for kind in group {
            self.insert(*kind);
        }
        true
    }
}

impl Default for TypeSet {
    fn default() -> Self {
        TypeSet::any_value()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Rc<str>,
    pub class: ParamClass,
    pub types: TypeSet,
    /// Index of the refinement this parameter is an argument of
    pub refinement: Option<usize>,
}

impl Param {
    pub fn new(name: &str, class: ParamClass) -> Self {
        Param {
            name: Rc::from(name),
            class,
            types: TypeSet::default(),
            refinement: None,
        }
    }
}

/// Implementation behind an action
#[derive(Clone)]
pub enum Dispatcher {
    Native(Rc<dyn Native>),
    /// `func` body, run in a child of the context it was created in
    Interpreted { body: Array, env: Context },
    /// Prelude run against the filled frame before redoing into `adaptee`
    Adapted {
        prelude: Array,
        env: Context,
        adaptee: Rc<Action>,
    },
    /// Definitional return bound to one activation
    Return(FrameId),
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatcher::Native(native) => write!(f, "Native({})", native.name()),
            Dispatcher::Interpreted { body, .. } => write!(f, "Interpreted({} units)", body.len()),
            Dispatcher::Adapted { adaptee, .. } => {
                write!(f, "Adapted({})", adaptee.label_or("anonymous"))
            }
            Dispatcher::Return(id) => write!(f, "Return({})", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Action {
    pub label: Option<Rc<str>>,
    pub params: Rc<[Param]>,
    pub dispatcher: Dispatcher,
    /// Pre-filled slots of a specialization, one entry per parameter
    pub exemplar: Option<Rc<[Option<Value>]>>,
    pub enfixed: bool,
    pub deferral: Deferral,
    pub description: Option<Rc<str>>,
}

impl Action {
    pub fn new(label: Option<&str>, spec: ParsedSpec, dispatcher: Dispatcher) -> Self {
        Action {
            label: label.map(Rc::from),
            params: Rc::from(spec.params),
            dispatcher,
            exemplar: None,
            enfixed: false,
            deferral: Deferral::None,
            description: spec.description.map(|d| Rc::from(d.as_str())),
        }
    }

    pub fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(fallback)
    }

    /// Index of the first parameter that is filled from the callsite
    pub fn first_arg_index(&self) -> Option<usize> {
        self.params
            .iter()
            .position(|p| !matches!(p.class, ParamClass::Local | ParamClass::Return))
    }

    fn first_arg(&self) -> Option<&Param> {
        self.first_arg_index().map(|i| &self.params[i])
    }

    /// Enfix actions whose left operand is taken as an unevaluated unit
    pub fn quotes_first(&self) -> bool {
        self.enfixed && self.first_arg().is_some_and(|p| p.class.is_quoting())
    }

    /// Whether an enfixed action can run with no left operand
    pub fn tolerates_absent_left(&self) -> bool {
        self.first_arg().is_some_and(|p| p.types.is_endable())
    }

    pub fn find_param(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| &*p.name == name)
    }

    /// Whether the parameter at `index` is bound as a word in interpreted
    /// bodies. A modal's same-named refinement only lives in its slot.
    pub fn binds_as_word(&self, index: usize) -> bool {
        let Some(param) = self.params.get(index) else {
            return false;
        };
        let modal_companion = param.class == ParamClass::Refinement
            && index
                .checked_sub(1)
                .and_then(|prev| self.params.get(prev))
                .is_some_and(|prev| prev.class == ParamClass::Modal && prev.name == param.name);
        !modal_companion
    }

    pub fn find_refinement(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.class == ParamClass::Refinement && &*p.name == name)
    }

    /// Argument parameters belonging to the refinement at `index`
    pub fn refinement_args(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.params
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.refinement == Some(index))
            .map(|(i, _)| i)
    }

    pub fn exemplar_slot(&self, index: usize) -> Option<&Value> {
        self.exemplar
            .as_ref()
            .and_then(|slots| slots.get(index))
            .and_then(Option::as_ref)
    }

    /// Copy of this action flagged as enfix
    pub fn enfixed(&self, deferral: Deferral) -> Result<Action, EvalError> {
        match self.first_arg() {
            Some(param) if param.class != ParamClass::Refinement => {}
            _ => {
                return Err(EvalError::new(ErrorKind::BadParamSpec(format!(
                    "{} needs a leading argument to be enfixed",
                    self.label_or("action")
                ))))
            }
        }
        let mut copy = self.clone();
        copy.enfixed = true;
        copy.deferral = deferral;
        Ok(copy)
    }

    /// New action with some slots pre-filled; existing specializations are kept
    pub fn specialized(self: &Rc<Self>, slots: Vec<Option<Value>>) -> Action {
        let merged: Vec<Option<Value>> = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.or_else(|| self.exemplar_slot(i).cloned()))
            .collect();
        let mut copy = (**self).clone();
        copy.exemplar = Some(Rc::from(merged));
        copy
    }
}

/// Result of parsing a parameter spec block
#[derive(Debug, Clone, Default)]
pub struct ParsedSpec {
    pub description: Option<String>,
    pub params: Vec<Param>,
    pub return_types: Option<TypeSet>,
}

fn bad_spec(detail: String) -> EvalError {
    EvalError::new(ErrorKind::BadParamSpec(detail))
}

fn parse_typeset(items: &[Value]) -> Result<(TypeSet, bool), EvalError> {
    let mut set = TypeSet::empty();
    let mut saw_kind = false;
    let mut variadic = false;
    for item in items {
        match item {
            Value::Word(name) => {
                if !set.merge_typeset_word(name) {
                    return Err(bad_spec(format!("unknown type {}", name)));
                }
                saw_kind = true;
            }
            Value::Tag(tag) => match &**tag {
                "opt" => set.flags |= FLAG_OPT,
                "end" => set.flags |= FLAG_END,
                "skip" => set.flags |= FLAG_SKIP,
                "..." => variadic = true,
                other => return Err(bad_spec(format!("unknown type marker <{}>", other))),
            },
            other => return Err(bad_spec(format!("bad type entry {}", other))),
        }
    }
    if !saw_kind {
        set.kinds = TypeSet::any_value().kinds;
    }
    Ok((set, variadic))
}

/// Parse a spec block like `[x [integer!] 'y /ref arg <local> tmp]`
pub fn parse_spec(items: &[Value]) -> Result<ParsedSpec, EvalError> {
    let mut spec = ParsedSpec::default();
    let mut owner: Option<usize> = None;
    let mut locals = false;
    let mut pending_return = false;

    for (index, item) in items.iter().enumerate() {
        if pending_return {
            pending_return = false;
            if let Value::Block(types) = item {
                spec.return_types = Some(parse_typeset(types)?.0);
                continue;
            }
        }
        let (name, class) = match item {
            Value::Text(text) if index == 0 => {
                spec.description = Some(text.to_string());
                continue;
            }
            // notes on individual parameters
            Value::Text(_) => continue,
            Value::Tag(tag) if &**tag == "local" => {
                locals = true;
                owner = None;
                continue;
            }
            Value::SetWord(name) if &**name == "return" => {
                pending_return = true;
                continue;
            }
            Value::Block(types) => {
                let Some(param) = spec.params.last_mut() else {
                    return Err(bad_spec("type block before any parameter".into()));
                };
                if matches!(param.class, ParamClass::Refinement | ParamClass::Local) {
                    return Err(bad_spec(format!("{} cannot take a type block", param.name)));
                }
                let (types, variadic) = parse_typeset(types)?;
                param.types = types;
                if variadic {
                    param.class = match param.class {
                        ParamClass::Normal => ParamClass::Variadic(Pull::Evaluate),
                        ParamClass::HardQuote => ParamClass::Variadic(Pull::Hard),
                        ParamClass::SoftQuote => ParamClass::Variadic(Pull::Soft),
                        _ => {
                            return Err(bad_spec(format!("{} cannot be variadic", param.name)))
                        }
                    };
                }
                continue;
            }
            Value::Word(name) if locals => (name.clone(), ParamClass::Local),
            Value::Word(name) => (name.clone(), ParamClass::Normal),
            Value::Quoted(inner) => match &**inner {
                Value::Word(name) => (name.clone(), ParamClass::HardQuote),
                other => return Err(bad_spec(format!("bad quoted parameter '{}", other))),
            },
            Value::GetWord(name) => (name.clone(), ParamClass::SoftQuote),
            Value::Sym(inner) => match &**inner {
                Value::Word(name) => (name.clone(), ParamClass::Modal),
                other => return Err(bad_spec(format!("bad modal parameter @{}", other))),
            },
            Value::Refinement(name) => {
                let companion = spec
                    .params
                    .last()
                    .is_some_and(|p| p.class == ParamClass::Modal && p.name == *name);
                if !companion && spec.params.iter().any(|p| p.name == *name) {
                    return Err(bad_spec(format!("duplicate parameter /{}", name)));
                }
                locals = false;
                owner = Some(spec.params.len());
                spec.params.push(Param::new(name, ParamClass::Refinement));
                continue;
            }
            other => return Err(bad_spec(format!("unexpected {} in spec", other))),
        };
        if spec.params.iter().any(|p| p.name == name) {
            return Err(bad_spec(format!("duplicate parameter {}", name)));
        }
        let mut param = Param::new(&name, class);
        if class == ParamClass::Local {
            param.types = TypeSet::empty();
        } else {
            param.refinement = owner;
        }
        spec.params.push(param);
    }

    validate_modals(&spec.params)?;
    Ok(spec)
}

fn validate_modals(params: &[Param]) -> Result<(), EvalError> {
    for (index, param) in params.iter().enumerate() {
        if param.class != ParamClass::Modal {
            continue;
        }
        let argless_refinement = params.get(index + 1).is_some_and(|next| {
            next.class == ParamClass::Refinement
                && !params.iter().any(|p| p.refinement == Some(index + 1))
        });
        if !argless_refinement {
            return Err(EvalError::new(ErrorKind::ModalWithoutRefinement {
                action: String::new(),
                param: param.name.to_string(),
            }));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn spec(text: &str) -> Result<ParsedSpec, EvalError> {
        let items = scan(text).expect("spec should scan");
        parse_spec(&items)
    }

    #[test]
    fn test_parse_classes() {
        let parsed = spec(r#""doc" a 'b :c @d /m /e f [integer! <opt>] g [<...> text!] <local> h"#)
            .unwrap();
        assert_eq!(parsed.description.as_deref(), Some("doc"));
        let classes: Vec<ParamClass> = parsed.params.iter().map(|p| p.class).collect();
        assert_eq!(
            classes,
            vec![
                ParamClass::Normal,
                ParamClass::HardQuote,
                ParamClass::SoftQuote,
                ParamClass::Modal,
                ParamClass::Refinement,
                ParamClass::Refinement,
                ParamClass::Normal,
                ParamClass::Variadic(Pull::Evaluate),
                ParamClass::Local,
            ]
        );
        assert_eq!(parsed.params[4].refinement, None);
        assert_eq!(parsed.params[6].refinement, Some(5));
        assert!(parsed.params[6].types.is_optional());
        assert!(parsed.params[6].types.contains(Kind::Integer));
        assert!(!parsed.params[6].types.contains(Kind::Text));
        assert_eq!(parsed.params[8].refinement, None);
    }

    #[test]
    fn test_untyped_param_rejects_null_and_void() {
        let parsed = spec("x").unwrap();
        let types = parsed.params[0].types;
        assert!(types.accepts(&Value::Integer(1)));
        assert!(!types.accepts(&Value::Null));
        assert!(!types.accepts(&Value::Void));
    }

    #[test]
    fn test_modal_requires_argless_refinement() {
        assert!(spec("@x /x").is_ok());
        let err = spec("@x y").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ModalWithoutRefinement { .. }));
        let err = spec("@x /x arg").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ModalWithoutRefinement { .. }));
    }

    #[test]
    fn test_duplicate_and_unknown_types() {
        assert!(spec("a a").is_err());
        assert!(spec("a /a").is_err());
        assert!(spec("/r /r").is_err());
        assert!(spec("a [no-such-type!]").is_err());
        assert!(spec("/r [integer!]").is_err());
    }

    #[test]
    fn test_return_types() {
        let parsed = spec("x return: [integer!]").unwrap();
        assert_eq!(parsed.params.len(), 1);
        assert!(parsed.return_types.unwrap().contains(Kind::Integer));
    }
}
