//! Native actions implemented in Rust.
//!
//! Each native declares its parameter spec in source form. The evaluator
//! fulfills the arguments before `dispatch` runs, so a native reads fully
//! type-checked slots and never touches the callsite itself (variadics
//! excepted, through their `Varargs` capability).
//!
//! # Example
//!
//! ```ignore
//! struct DoubleOp;
//!
//! impl Native for DoubleOp {
//!     fn name(&self) -> &str {
//!         "double"
//!     }
//!
//!     fn spec(&self) -> &str {
//!         "value [integer!]"
//!     }
//!
//!     fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
//!         Ok(Bounce::Out(Value::Integer(call.integer(0)? * 2)))
//!     }
//! }
//! ```

mod arithmetic;
mod comparison;
mod control;
mod data;
mod generators;

use std::rc::Rc;

use tracing::debug;

use crate::backend::environment::Context;
use crate::backend::eval::context::EvalContext;
use crate::backend::eval::errors::{ErrorKind, EvalError};
use crate::backend::eval::feed::FeedHandle;
use crate::backend::eval::frame::{CallState, Frame, FrameId, FrameRef, OutCell};
use crate::backend::eval::signal::{Completion, Signal};
use crate::backend::eval::step::do_array;
use crate::backend::models::{parse_spec, Action, Array, Deferral, Dispatcher, Kind, Value};
use crate::scanner::scan;

pub use arithmetic::{AddOp, DivideOp, MultiplyOp, NegateOp, SubtractOp};
pub use comparison::{EqualOp, GreaterOp, LesserOp, NotOp};
pub use control::{
    AcceptOp, AlsoOp, BreakOp, CatchOp, ContinueOp, EitherOp, ElseOp, FailOp, HaltOp, IfOp,
    LoopOp, RejectOp, ThenOp, ThrowOp, TrapOp, WhileOp, ACCEPT, REJECT,
};
pub use data::{
    CommentOp, DefaultOp, DoOp, ElideOp, GetOp, NullQOp, PrintOp, QuoteOp, ReduceOp, SetOp,
    TheOp, TypeOfOp,
};
pub use generators::{AdaptOp, EnfixOp, FuncOp, SpecializeOp, TailQOp, TakeOp, VarargsOp};

/// What a dispatcher hands back to the evaluator
#[derive(Debug)]
pub enum Bounce {
    Out(Value),
    /// The call produced nothing; the step stays stale
    Invisible,
    Thrown(Signal),
    /// Run `phase` against the same argument slots
    Redo { phase: Rc<Action>, checked: bool },
}

pub type NativeResult = Result<Bounce, EvalError>;

pub trait Native {
    /// Word the native is bound to
    fn name(&self) -> &str;

    /// Parameter spec in source form, e.g. `"value1 [integer!] value2 [integer!]"`
    fn spec(&self) -> &str;

    /// Natives that are only meaningful as enfix operators are bound enfixed
    fn enfix(&self) -> Option<Deferral> {
        None
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult;
}

/// A native's view of the frame it runs in
pub struct Call<'a> {
    ctx: &'a mut EvalContext,
    frame: &'a mut Frame,
    state: &'a mut CallState,
}

impl<'a> Call<'a> {
    pub(crate) fn new(ctx: &'a mut EvalContext, frame: &'a mut Frame, state: &'a mut CallState) -> Self {
        Call { ctx, frame, state }
    }

    pub fn label(&self) -> &str {
        &self.state.label
    }

    pub fn action(&self) -> &Rc<Action> {
        &self.state.action
    }

    /// Slot by parameter position
    pub fn arg(&self, index: usize) -> &Value {
        self.state.slot(index)
    }

    pub fn arg_named(&self, name: &str) -> Option<&Value> {
        self.state
            .action
            .find_param(name)
            .map(|index| self.state.slot(index))
    }

    /// Whether refinement `/name` is in use for this call
    pub fn refinement(&self, name: &str) -> bool {
        self.state
            .action
            .find_refinement(name)
            .is_some_and(|index| !self.state.slot(index).is_null())
    }

    pub fn env(&self) -> Context {
        self.frame.feed.env()
    }

    pub fn feed(&self) -> FeedHandle {
        self.frame.feed.clone()
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame.id()
    }

    pub fn reify(&mut self) -> FrameRef {
        // the call state is lent to us for the dispatch; the snapshot needs it
        self.frame.call = Some(self.state.clone());
        let reified = self.frame.reify();
        self.frame.call = None;
        reified
    }

    pub fn ctx(&mut self) -> &mut EvalContext {
        self.ctx
    }

    /// Evaluate a block in the callsite's context
    pub fn do_block(&mut self, block: &Array, out: &mut OutCell) -> Result<Completion, EvalError> {
        let env = self.env();
        let parent = Some(self.frame.id());
        do_array(self.ctx, parent, block.clone(), env, out)
    }

    /// Evaluate a branch block as the result of this call
    pub fn branch(&mut self, block: &Array) -> NativeResult {
        let mut out = OutCell::new();
        try_bounce!(self.do_block(block, &mut out)?);
        Ok(Bounce::Out(out.take().unwrap_or(Value::Void)))
    }

    /// Type error for the slot at `index`
    pub fn mismatch(&self, index: usize) -> EvalError {
        EvalError::new(ErrorKind::WrongType {
            action: self.state.label.to_string(),
            param: self.state.action.params[index].name.to_string(),
            got: self.arg(index).kind(),
        })
    }

    pub fn integer(&self, index: usize) -> Result<i64, EvalError> {
        match self.arg(index) {
            Value::Integer(n) => Ok(*n),
            _ => Err(self.mismatch(index)),
        }
    }

    pub fn block(&self, index: usize) -> Result<Array, EvalError> {
        match self.arg(index) {
            Value::Block(items) => Ok(items.clone()),
            _ => Err(self.mismatch(index)),
        }
    }

    pub fn action_arg(&self, index: usize) -> Result<Rc<Action>, EvalError> {
        match self.arg(index) {
            Value::Action(action) => Ok(action.clone()),
            _ => Err(self.mismatch(index)),
        }
    }
}

/// Build the action value for a native from its spec
pub fn native_action(native: Rc<dyn Native>) -> Result<Action, EvalError> {
    let items = scan(native.spec()).map_err(|err| {
        EvalError::new(ErrorKind::BadParamSpec(format!("{}: {}", native.name(), err)))
    })?;
    let spec = parse_spec(&items)?;
    let name = native.name().to_string();
    let enfix = native.enfix();
    let action = Action::new(Some(&name), spec, Dispatcher::Native(native));
    match enfix {
        Some(deferral) => action.enfixed(deferral),
        None => Ok(action),
    }
}

/// Registry of natives installed into the library context
pub struct NativeRegistry {
    natives: Vec<Rc<dyn Native>>,
    /// Enfix spellings bound to an existing prefix native, e.g. `+` for `add`
    operators: Vec<(&'static str, &'static str)>,
}

impl NativeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        NativeRegistry {
            natives: Vec::new(),
            operators: Vec::new(),
        }
    }

    /// Registry holding the standard library
    pub fn with_standard_natives() -> Self {
        let mut registry = Self::new();

        // Arithmetic
        registry.register(Rc::new(AddOp));
        registry.register(Rc::new(SubtractOp));
        registry.register(Rc::new(MultiplyOp));
        registry.register(Rc::new(DivideOp));
        registry.register(Rc::new(NegateOp));
        registry.operator("+", "add");
        registry.operator("-", "subtract");
        registry.operator("*", "multiply");
        registry.operator("/", "divide");

        // Comparison
        registry.register(Rc::new(EqualOp { negate: false }));
        registry.register(Rc::new(EqualOp { negate: true }));
        registry.register(Rc::new(LesserOp { or_equal: false }));
        registry.register(Rc::new(LesserOp { or_equal: true }));
        registry.register(Rc::new(GreaterOp { or_equal: false }));
        registry.register(Rc::new(GreaterOp { or_equal: true }));
        registry.register(Rc::new(NotOp));
        registry.operator("=", "equal?");
        registry.operator("<>", "not-equal?");
        registry.operator("<", "lesser?");
        registry.operator("<=", "lesser-or-equal?");
        registry.operator(">", "greater?");
        registry.operator(">=", "greater-or-equal?");

        // Control flow
        registry.register(Rc::new(IfOp));
        registry.register(Rc::new(EitherOp));
        registry.register(Rc::new(LoopOp));
        registry.register(Rc::new(WhileOp));
        registry.register(Rc::new(BreakOp));
        registry.register(Rc::new(ContinueOp));
        registry.register(Rc::new(CatchOp));
        registry.register(Rc::new(ThrowOp));
        registry.register(Rc::new(TrapOp));
        registry.register(Rc::new(FailOp));
        registry.register(Rc::new(HaltOp));
        registry.register(Rc::new(ThenOp));
        registry.register(Rc::new(ElseOp));
        registry.register(Rc::new(AlsoOp));
        registry.register(Rc::new(AcceptOp));
        registry.register(Rc::new(RejectOp));

        // Data and evaluation
        registry.register(Rc::new(DoOp));
        registry.register(Rc::new(ReduceOp));
        registry.register(Rc::new(QuoteOp));
        registry.register(Rc::new(TheOp));
        registry.register(Rc::new(CommentOp));
        registry.register(Rc::new(ElideOp));
        registry.register(Rc::new(GetOp));
        registry.register(Rc::new(SetOp));
        registry.register(Rc::new(TypeOfOp));
        registry.register(Rc::new(NullQOp));
        registry.register(Rc::new(PrintOp));
        registry.register(Rc::new(DefaultOp));

        // Generators and variadics
        registry.register(Rc::new(FuncOp));
        registry.register(Rc::new(SpecializeOp));
        registry.register(Rc::new(AdaptOp));
        registry.register(Rc::new(EnfixOp));
        registry.register(Rc::new(TakeOp));
        registry.register(Rc::new(TailQOp));
        registry.register(Rc::new(VarargsOp));

        registry
    }

    /// Register a native; a later registration under the same name wins
    pub fn register(&mut self, native: Rc<dyn Native>) {
        self.natives.retain(|existing| existing.name() != native.name());
        self.natives.push(native);
    }

    /// Bind `symbol` to an enfixed copy of the native named `target`
    pub fn operator(&mut self, symbol: &'static str, target: &'static str) {
        self.operators.push((symbol, target));
    }

    /// Look up a native by name
    pub fn get(&self, name: &str) -> Option<Rc<dyn Native>> {
        self.natives.iter().find(|n| n.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }

    /// Define every native, operator and library constant in `lib`
    pub fn install(&self, lib: &Context) -> Result<(), EvalError> {
        lib.define("null", Value::Null);
        lib.define("true", Value::Logic(true));
        lib.define("false", Value::Logic(false));
        for kind in Kind::ALL {
            if kind != Kind::Null {
                lib.define(kind.name(), Value::Datatype(kind));
            }
        }

        for native in &self.natives {
            let action = native_action(native.clone())?;
            lib.define(native.name(), Value::Action(Rc::new(action)));
        }

        for (symbol, target) in &self.operators {
            let Some(Value::Action(prefix)) = lib.lookup(target) else {
                return Err(EvalError::new(ErrorKind::NotAction((*target).to_string())));
            };
            let mut operator = prefix.enfixed(Deferral::None)?;
            operator.label = Some(Rc::from(*symbol));
            lib.define(symbol, Value::Action(Rc::new(operator)));
        }
        debug!(
            target: "reval::natives",
            natives = self.natives.len(),
            operators = self.operators.len(),
            "installed"
        );
        Ok(())
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::with_standard_natives()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_natives_install() {
        let registry = NativeRegistry::with_standard_natives();
        let lib = Context::new();
        registry.install(&lib).unwrap();
        for name in ["add", "+", "if", "else", "func", "take", "default", "integer!"] {
            assert!(lib.lookup(name).is_some(), "{} should be defined", name);
        }
        let Some(Value::Action(plus)) = lib.lookup("+") else {
            panic!("+ should be an action");
        };
        assert!(plus.enfixed);
        assert_eq!(plus.label.as_deref(), Some("+"));
        let Some(Value::Action(add)) = lib.lookup("add") else {
            panic!("add should be an action");
        };
        assert!(!add.enfixed);
    }

    #[test]
    fn test_every_spec_parses() {
        let registry = NativeRegistry::with_standard_natives();
        for native in &registry.natives {
            assert!(
                native_action(native.clone()).is_ok(),
                "spec of {} should parse",
                native.name()
            );
        }
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = NativeRegistry::new();
        registry.register(Rc::new(AddOp));
        registry.register(Rc::new(AddOp));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("add").is_some());
        assert!(registry.get("subtract").is_none());
    }
}
