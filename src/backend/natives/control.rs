// =============================================================================
// Control Flow
// =============================================================================
//
// Branching natives run their branch blocks in the callsite's context. Loops
// intercept break and continue; catch intercepts throw; trap is the only
// boundary that turns an error back into a value.

use std::rc::Rc;

use tracing::trace;

use super::{Bounce, Call, Native, NativeResult};
use crate::backend::eval::errors::{ErrorKind, EvalError};
use crate::backend::eval::frame::OutCell;
use crate::backend::eval::signal::{Completion, Signal, SignalLabel};
use crate::backend::models::{Array, Deferral, Value};

/// What a loop body asked for
enum LoopFlow {
    Next,
    Stop,
    Thrown(Signal),
}

fn run_body(call: &mut Call<'_>, body: &Array, out: &mut OutCell) -> Result<LoopFlow, EvalError> {
    match call.do_block(body, out)? {
        Completion::Done => Ok(LoopFlow::Next),
        Completion::Thrown(signal) => match signal.label {
            SignalLabel::Break => {
                out.set(signal.payload);
                Ok(LoopFlow::Stop)
            }
            SignalLabel::Continue => Ok(LoopFlow::Next),
            _ => Ok(LoopFlow::Thrown(signal)),
        },
    }
}

pub struct IfOp;

impl Native for IfOp {
    fn name(&self) -> &str {
        "if"
    }

    fn spec(&self) -> &str {
        r#""Run the branch when the condition is truthy, else null" condition [<opt> any-value!] branch [block!]"#
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let branch = call.block(1)?;
        if call.arg(0).is_truthy() {
            call.branch(&branch)
        } else {
            Ok(Bounce::Out(Value::Null))
        }
    }
}

pub struct EitherOp;

impl Native for EitherOp {
    fn name(&self) -> &str {
        "either"
    }

    fn spec(&self) -> &str {
        "condition [<opt> any-value!] true-branch [block!] false-branch [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let branch = if call.arg(0).is_truthy() {
            call.block(1)?
        } else {
            call.block(2)?
        };
        call.branch(&branch)
    }
}

/// `loop count body`; null if broken out of
pub struct LoopOp;

impl Native for LoopOp {
    fn name(&self) -> &str {
        "loop"
    }

    fn spec(&self) -> &str {
        "count [integer!] body [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let count = call.integer(0)?;
        let body = call.block(1)?;
        let mut out = OutCell::new();
        for _ in 0..count.max(0) {
            match run_body(call, &body, &mut out)? {
                LoopFlow::Next => {}
                LoopFlow::Stop => return Ok(Bounce::Out(Value::Null)),
                LoopFlow::Thrown(signal) => return Ok(Bounce::Thrown(signal)),
            }
        }
        Ok(Bounce::Out(out.into_last().unwrap_or(Value::Null)))
    }
}

pub struct WhileOp;

impl Native for WhileOp {
    fn name(&self) -> &str {
        "while"
    }

    fn spec(&self) -> &str {
        "condition [block!] body [block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let condition = call.block(0)?;
        let body = call.block(1)?;
        let mut out = OutCell::new();
        loop {
            let mut test = OutCell::new();
            try_bounce!(call.do_block(&condition, &mut test)?);
            if !test.into_last().is_some_and(|value| value.is_truthy()) {
                break;
            }
            match run_body(call, &body, &mut out)? {
                LoopFlow::Next => {}
                LoopFlow::Stop => return Ok(Bounce::Out(Value::Null)),
                LoopFlow::Thrown(signal) => return Ok(Bounce::Thrown(signal)),
            }
        }
        Ok(Bounce::Out(out.into_last().unwrap_or(Value::Null)))
    }
}

pub struct BreakOp;

impl Native for BreakOp {
    fn name(&self) -> &str {
        "break"
    }

    fn spec(&self) -> &str {
        ""
    }

    fn dispatch(&self, _call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Thrown(Signal::new(SignalLabel::Break, Value::Null)))
    }
}

pub struct ContinueOp;

impl Native for ContinueOp {
    fn name(&self) -> &str {
        "continue"
    }

    fn spec(&self) -> &str {
        ""
    }

    fn dispatch(&self, _call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Thrown(Signal::new(SignalLabel::Continue, Value::Null)))
    }
}

/// `catch [...]` takes unnamed throws; `catch/name [...] 'word` only that name
pub struct CatchOp;

impl Native for CatchOp {
    fn name(&self) -> &str {
        "catch"
    }

    fn spec(&self) -> &str {
        "block [block!] /name names [word! block!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let block = call.block(0)?;
        let names: Option<Vec<Value>> = match call.arg_named("names") {
            Some(Value::Word(name)) => Some(vec![Value::Word(name.clone())]),
            Some(Value::Block(items)) => Some(items.to_vec()),
            _ => None,
        };
        let mut out = OutCell::new();
        match call.do_block(&block, &mut out)? {
            Completion::Done => Ok(Bounce::Out(out.into_last().unwrap_or(Value::Null))),
            Completion::Thrown(signal) => {
                let caught = match (&signal.label, &names) {
                    (SignalLabel::Throw(None), None) => true,
                    (SignalLabel::Throw(Some(name)), Some(names)) => names.contains(name),
                    _ => false,
                };
                if caught {
                    trace!(target: "reval::natives::catch", signal = %signal, "caught");
                    Ok(Bounce::Out(signal.payload))
                } else {
                    Ok(Bounce::Thrown(signal))
                }
            }
        }
    }
}

pub struct ThrowOp;

impl Native for ThrowOp {
    fn name(&self) -> &str {
        "throw"
    }

    fn spec(&self) -> &str {
        "value [<opt> any-value!] /name word [word!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let name = match call.arg_named("word") {
            Some(Value::Word(word)) => Some(Value::Word(word.clone())),
            _ => None,
        };
        Ok(Bounce::Thrown(Signal::new(
            SignalLabel::Throw(name),
            call.arg(0).clone(),
        )))
    }
}

/// Error boundary: an error raised inside the block becomes an error value
pub struct TrapOp;

impl Native for TrapOp {
    fn name(&self) -> &str {
        "trap"
    }

    fn spec(&self) -> &str {
        r#""Evaluate a block, returning the error it raised or null" block [block!]"#
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let block = call.block(0)?;
        let mut out = OutCell::new();
        match call.do_block(&block, &mut out) {
            Ok(Completion::Done) => Ok(Bounce::Out(Value::Null)),
            Ok(Completion::Thrown(signal)) => Ok(Bounce::Thrown(signal)),
            Err(err) => {
                trace!(target: "reval::natives::trap", error = %err, "trapped");
                Ok(Bounce::Out(Value::Error(Rc::new(err))))
            }
        }
    }
}

pub struct FailOp;

impl Native for FailOp {
    fn name(&self) -> &str {
        "fail"
    }

    fn spec(&self) -> &str {
        "reason [text! error!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        match call.arg(0) {
            Value::Text(text) => Err(EvalError::new(ErrorKind::User(text.to_string()))),
            Value::Error(err) => Err((**err).clone()),
            _ => Err(call.mismatch(0)),
        }
    }
}

pub struct HaltOp;

impl Native for HaltOp {
    fn name(&self) -> &str {
        "halt"
    }

    fn spec(&self) -> &str {
        ""
    }

    fn dispatch(&self, _call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Thrown(Signal::halt()))
    }
}

const BRANCH_SPEC: &str = "optional [<opt> any-value! void!] branch [block!]";

/// `left then [...]`: run the branch unless the left is null
pub struct ThenOp;

impl Native for ThenOp {
    fn name(&self) -> &str {
        "then"
    }

    fn spec(&self) -> &str {
        BRANCH_SPEC
    }

    fn enfix(&self) -> Option<Deferral> {
        Some(Deferral::Defer)
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let branch = call.block(1)?;
        if call.arg(0).is_null() {
            Ok(Bounce::Out(Value::Null))
        } else {
            call.branch(&branch)
        }
    }
}

/// `left else [...]`: run the branch only if the left is null
pub struct ElseOp;

impl Native for ElseOp {
    fn name(&self) -> &str {
        "else"
    }

    fn spec(&self) -> &str {
        BRANCH_SPEC
    }

    fn enfix(&self) -> Option<Deferral> {
        Some(Deferral::Defer)
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let branch = call.block(1)?;
        if call.arg(0).is_null() {
            call.branch(&branch)
        } else {
            Ok(Bounce::Out(call.arg(0).clone()))
        }
    }
}

/// `left also [...]`: run the branch for its effect, passing the left through
pub struct AlsoOp;

impl Native for AlsoOp {
    fn name(&self) -> &str {
        "also"
    }

    fn spec(&self) -> &str {
        BRANCH_SPEC
    }

    fn enfix(&self) -> Option<Deferral> {
        Some(Deferral::Postpone)
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let branch = call.block(1)?;
        let left = call.arg(0).clone();
        if !left.is_null() {
            try_bounce!(call.do_block(&branch, &mut OutCell::new())?);
        }
        Ok(Bounce::Out(left))
    }
}

/// Label of the signal thrown by `accept`
pub const ACCEPT: &str = "accept";
/// Label of the signal thrown by `reject`
pub const REJECT: &str = "reject";

/// Dialect exit: finish the enclosing dialect run with a value
pub struct AcceptOp;

impl Native for AcceptOp {
    fn name(&self) -> &str {
        ACCEPT
    }

    fn spec(&self) -> &str {
        "value [<opt> any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Thrown(Signal::new(
            SignalLabel::Dialect(Rc::from(ACCEPT)),
            call.arg(0).clone(),
        )))
    }
}

pub struct RejectOp;

impl Native for RejectOp {
    fn name(&self) -> &str {
        REJECT
    }

    fn spec(&self) -> &str {
        ""
    }

    fn dispatch(&self, _call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Thrown(Signal::new(
            SignalLabel::Dialect(Rc::from(REJECT)),
            Value::Null,
        )))
    }
}
