// =============================================================================
// Arithmetic Operations
// =============================================================================

use super::{Bounce, Call, Native, NativeResult};
use crate::backend::eval::errors::EvalError;
use crate::backend::models::Value;

const BINARY_SPEC: &str = "value1 [any-number!] value2 [any-number!]";

#[derive(Clone, Copy)]
enum Op {
    Add,
    Subtract,
    Multiply,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Subtract => "-",
            Op::Multiply => "*",
        }
    }
}

/// Apply `op` to the two numeric slots, promoting to decimal when either is one
fn binary(call: &Call<'_>, op: Op) -> NativeResult {
    let result = match (call.arg(0), call.arg(1)) {
        (Value::Integer(x), Value::Integer(y)) => {
            let checked = match op {
                Op::Add => x.checked_add(*y),
                Op::Subtract => x.checked_sub(*y),
                Op::Multiply => x.checked_mul(*y),
            };
            match checked {
                Some(n) => Value::Integer(n),
                None => {
                    return Err(EvalError::native(format!(
                        "integer overflow: {} {} {}",
                        x,
                        op.symbol(),
                        y
                    )))
                }
            }
        }
        (a, b) => {
            let (Some(x), Some(y)) = (as_decimal(a), as_decimal(b)) else {
                let index = if as_decimal(a).is_none() { 0 } else { 1 };
                return Err(call.mismatch(index));
            };
            Value::Decimal(match op {
                Op::Add => x + y,
                Op::Subtract => x - y,
                Op::Multiply => x * y,
            })
        }
    };
    Ok(Bounce::Out(result))
}

fn as_decimal(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => Some(*n as f64),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// `add value1 value2`, enfixed as `+`
pub struct AddOp;

impl Native for AddOp {
    fn name(&self) -> &str {
        "add"
    }

    fn spec(&self) -> &str {
        BINARY_SPEC
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        binary(call, Op::Add)
    }
}

pub struct SubtractOp;

impl Native for SubtractOp {
    fn name(&self) -> &str {
        "subtract"
    }

    fn spec(&self) -> &str {
        BINARY_SPEC
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        binary(call, Op::Subtract)
    }
}

pub struct MultiplyOp;

impl Native for MultiplyOp {
    fn name(&self) -> &str {
        "multiply"
    }

    fn spec(&self) -> &str {
        BINARY_SPEC
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        binary(call, Op::Multiply)
    }
}

/// Integer division stays integral when exact, otherwise yields a decimal
pub struct DivideOp;

impl Native for DivideOp {
    fn name(&self) -> &str {
        "divide"
    }

    fn spec(&self) -> &str {
        BINARY_SPEC
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let (Some(x), Some(y)) = (as_decimal(call.arg(0)), as_decimal(call.arg(1))) else {
            let index = if as_decimal(call.arg(0)).is_none() { 0 } else { 1 };
            return Err(call.mismatch(index));
        };
        if y == 0.0 {
            return Err(EvalError::native("attempt to divide by zero"));
        }
        if let (Value::Integer(a), Value::Integer(b)) = (call.arg(0), call.arg(1)) {
            if let (Some(0), Some(q)) = (a.checked_rem(*b), a.checked_div(*b)) {
                return Ok(Bounce::Out(Value::Integer(q)));
            }
        }
        Ok(Bounce::Out(Value::Decimal(x / y)))
    }
}

pub struct NegateOp;

impl Native for NegateOp {
    fn name(&self) -> &str {
        "negate"
    }

    fn spec(&self) -> &str {
        "number [any-number!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        match call.arg(0) {
            Value::Integer(n) => n
                .checked_neg()
                .map(|n| Bounce::Out(Value::Integer(n)))
                .ok_or_else(|| EvalError::native(format!("integer overflow: negate {}", n))),
            Value::Decimal(d) => Ok(Bounce::Out(Value::Decimal(-d))),
            _ => Err(call.mismatch(0)),
        }
    }
}
