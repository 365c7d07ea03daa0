// =============================================================================
// Action Generators and Variadics
// =============================================================================

use std::rc::Rc;

use tracing::debug;

use super::{Bounce, Call, Native, NativeResult};
use crate::backend::eval::errors::{ErrorKind, EvalError};
use crate::backend::eval::frame::OutCell;
use crate::backend::eval::step::do_array;
use crate::backend::eval::varargs::Varargs;
use crate::backend::models::{
    parse_spec, Action, Deferral, Dispatcher, Param, ParamClass, TypeSet, Value,
};

/// `func spec body`: interpreted action with a definitional `return`
pub struct FuncOp;

impl Native for FuncOp {
    fn name(&self) -> &str {
        "func"
    }

    fn spec(&self) -> &str {
        "spec [block!] body [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let spec_block = call.block(0)?;
        let body = call.block(1)?;
        let mut spec = parse_spec(&spec_block)?;
        if spec.params.iter().any(|p| &*p.name == "return") {
            return Err(EvalError::new(ErrorKind::BadParamSpec(
                "return is reserved in func specs".into(),
            )));
        }
        let mut returns = Param::new("return", ParamClass::Return);
        returns.types = spec.return_types.unwrap_or_else(TypeSet::anything);
        spec.params.push(returns);

        let action = Action::new(
            None,
            spec,
            Dispatcher::Interpreted {
                body,
                env: call.env(),
            },
        );
        debug!(
            target: "reval::natives::func",
            params = action.params.len(),
            "created function"
        );
        Ok(Bounce::Out(Value::Action(Rc::new(action))))
    }
}

/// `specialize :action [param: value ...]`
///
/// The definition block runs in a scope where every parameter is bound to
/// void; whatever it assigns becomes a pre-filled slot. Refinements are
/// switched on or off with `true`/`false`.
pub struct SpecializeOp;

impl Native for SpecializeOp {
    fn name(&self) -> &str {
        "specialize"
    }

    fn spec(&self) -> &str {
        "action [action!] def [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let action = call.action_arg(0)?;
        let def = call.block(1)?;
        let label = action.label_or("specialization").to_string();

        let scope = call.env().child();
        for (index, param) in action.params.iter().enumerate() {
            if matches!(param.class, ParamClass::Local | ParamClass::Return)
                || !action.binds_as_word(index)
            {
                continue;
            }
            let current = action.exemplar_slot(index).cloned().unwrap_or(Value::Void);
            scope.define(&param.name, current);
        }
        let mut out = OutCell::new();
        let parent = Some(call.frame_id());
        try_bounce!(do_array(call.ctx(), parent, def, scope.clone(), &mut out)?);

        let mut slots = Vec::with_capacity(action.params.len());
        for (index, param) in action.params.iter().enumerate() {
            if matches!(param.class, ParamClass::Local | ParamClass::Return)
                || !action.binds_as_word(index)
            {
                slots.push(None);
                continue;
            }
            let value = match scope.lookup(&param.name) {
                None | Some(Value::Void) => None,
                Some(value) if param.class == ParamClass::Refinement => {
                    Some(Value::Logic(value.is_truthy()))
                }
                Some(value) => {
                    let absent_ok = value.is_null() && param.refinement.is_some();
                    if !absent_ok && !param.types.accepts(&value) {
                        return Err(EvalError::new(ErrorKind::WrongType {
                            action: label,
                            param: param.name.to_string(),
                            got: value.kind(),
                        }));
                    }
                    Some(value)
                }
            };
            slots.push(value);
        }
        Ok(Bounce::Out(Value::Action(Rc::new(action.specialized(slots)))))
    }
}

/// `adapt :action [prelude]`: run the prelude against the filled frame,
/// then continue into the original action with the same slots
pub struct AdaptOp;

impl Native for AdaptOp {
    fn name(&self) -> &str {
        "adapt"
    }

    fn spec(&self) -> &str {
        "action [action!] prelude [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let adaptee = call.action_arg(0)?;
        let prelude = call.block(1)?;
        let mut adapted = (*adaptee).clone();
        adapted.label = None;
        adapted.enfixed = false;
        adapted.deferral = Deferral::None;
        adapted.dispatcher = Dispatcher::Adapted {
            prelude,
            env: call.env(),
            adaptee,
        };
        Ok(Bounce::Out(Value::Action(Rc::new(adapted))))
    }
}

/// `enfix :action`, optionally `/defer` or `/postpone`
pub struct EnfixOp;

impl Native for EnfixOp {
    fn name(&self) -> &str {
        "enfix"
    }

    fn spec(&self) -> &str {
        "action [action!] /defer /postpone"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let action = call.action_arg(0)?;
        let deferral = match (call.refinement("defer"), call.refinement("postpone")) {
            (false, false) => Deferral::None,
            (true, false) => Deferral::Defer,
            (false, true) => Deferral::Postpone,
            (true, true) => {
                return Err(EvalError::new(ErrorKind::BadRefinement(
                    "enfix takes only one of /defer and /postpone".into(),
                )))
            }
        };
        Ok(Bounce::Out(Value::Action(Rc::new(action.enfixed(deferral)?))))
    }
}

/// Pull the next value from a varargs; null at the tail
pub struct TakeOp;

impl Native for TakeOp {
    fn name(&self) -> &str {
        "take"
    }

    fn spec(&self) -> &str {
        "source [varargs!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let Value::Varargs(varargs) = call.arg(0).clone() else {
            return Err(call.mismatch(0));
        };
        let parent = Some(call.frame_id());
        let mut out = OutCell::new();
        try_bounce!(varargs.take(call.ctx(), parent, &mut out)?);
        Ok(Bounce::Out(out.take().unwrap_or(Value::Null)))
    }
}

pub struct TailQOp;

impl Native for TailQOp {
    fn name(&self) -> &str {
        "tail?"
    }

    fn spec(&self) -> &str {
        "source [varargs! block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let tail = match call.arg(0) {
            Value::Varargs(varargs) => varargs.is_tail(),
            Value::Block(items) => items.is_empty(),
            _ => return Err(call.mismatch(0)),
        };
        Ok(Bounce::Out(Value::Logic(tail)))
    }
}

/// Varargs over the expressions of a block
pub struct VarargsOp;

impl Native for VarargsOp {
    fn name(&self) -> &str {
        "varargs"
    }

    fn spec(&self) -> &str {
        "block [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let items = call.block(0)?;
        Ok(Bounce::Out(Value::Varargs(Varargs::from_block(items, call.env()))))
    }
}
