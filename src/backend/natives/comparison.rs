// =============================================================================
// Comparison Operations
// =============================================================================

use std::cmp::Ordering;

use super::{Bounce, Call, Native, NativeResult};
use crate::backend::eval::errors::EvalError;
use crate::backend::models::Value;

const ORDERED_SPEC: &str = "value1 [any-number! text!] value2 [any-number! text!]";

/// Order two scalars; numbers compare across integer and decimal
fn compare(call: &Call<'_>) -> Result<Ordering, EvalError> {
    let ordering = match (call.arg(0), call.arg(1)) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Decimal(b)) => (*a as f64).partial_cmp(b),
        (Value::Decimal(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Text(_), _) => return Err(call.mismatch(1)),
        (_, Value::Text(_)) => return Err(call.mismatch(0)),
        _ => None,
    };
    ordering.ok_or_else(|| {
        EvalError::native(format!(
            "cannot compare {} with {}",
            call.arg(0),
            call.arg(1)
        ))
    })
}

/// `equal?` and, negated, `not-equal?`; enfixed as `=` and `<>`
pub struct EqualOp {
    pub negate: bool,
}

impl Native for EqualOp {
    fn name(&self) -> &str {
        if self.negate {
            "not-equal?"
        } else {
            "equal?"
        }
    }

    fn spec(&self) -> &str {
        "value1 [<opt> any-value!] value2 [<opt> any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let equal = call.arg(0) == call.arg(1);
        Ok(Bounce::Out(Value::Logic(equal != self.negate)))
    }
}

pub struct LesserOp {
    pub or_equal: bool,
}

impl Native for LesserOp {
    fn name(&self) -> &str {
        if self.or_equal {
            "lesser-or-equal?"
        } else {
            "lesser?"
        }
    }

    fn spec(&self) -> &str {
        ORDERED_SPEC
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let ordering = compare(call)?;
        let result = ordering == Ordering::Less || (self.or_equal && ordering == Ordering::Equal);
        Ok(Bounce::Out(Value::Logic(result)))
    }
}

pub struct GreaterOp {
    pub or_equal: bool,
}

impl Native for GreaterOp {
    fn name(&self) -> &str {
        if self.or_equal {
            "greater-or-equal?"
        } else {
            "greater?"
        }
    }

    fn spec(&self) -> &str {
        ORDERED_SPEC
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        let ordering = compare(call)?;
        let result =
            ordering == Ordering::Greater || (self.or_equal && ordering == Ordering::Equal);
        Ok(Bounce::Out(Value::Logic(result)))
    }
}

/// Logical negation; null and blank count as false
pub struct NotOp;

impl Native for NotOp {
    fn name(&self) -> &str {
        "not"
    }

    fn spec(&self) -> &str {
        "value [<opt> any-value!]"
    }

    fn dispatch(&self, call: &mut Call<'_>) -> NativeResult {
        Ok(Bounce::Out(Value::Logic(!call.arg(0).is_truthy())))
    }
}
