use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;
use crate::value::{Value, ValueRepr};

static FLOAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A\s*-?\d+\.\d+\s*\z").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\A\s*-?\d+\s*\z").unwrap());

pub enum CoerceResult {
    I64(i64, i64),
    F64(f64, f64),
}

fn as_f64(value: &Value) -> Option<f64> {
    Some(match value.0 {
        ValueRepr::I64(x) => x as f64,
        ValueRepr::F64(x) => x,
        _ => return None,
    })
}

/// Coerces two numbers into a common representation.
pub fn coerce(a: &Value, b: &Value) -> Option<CoerceResult> {
    match (&a.0, &b.0) {
        (ValueRepr::I64(a), ValueRepr::I64(b)) => Some(CoerceResult::I64(*a, *b)),
        (ValueRepr::F64(a), _) => Some(CoerceResult::F64(*a, some!(as_f64(b)))),
        (_, ValueRepr::F64(b)) => Some(CoerceResult::F64(some!(as_f64(a)), *b)),
        _ => None,
    }
}

/// Converts a value into a number for math filters.
///
/// Numeric strings parse, everything else that is not a number becomes `0`.
pub fn to_number(value: &Value) -> Value {
    match value.0 {
        ValueRepr::I64(_) | ValueRepr::F64(_) => value.clone(),
        ValueRepr::String(ref s) => {
            if FLOAT_RE.is_match(s) {
                s.trim().parse::<f64>().map(Value::from).unwrap_or(Value::from(0))
            } else if INT_RE.is_match(s) {
                s.trim().parse::<i64>().map(Value::from).unwrap_or(Value::from(0))
            } else {
                Value::from(0)
            }
        }
        _ => Value::from(0),
    }
}

fn numbers(lhs: &Value, rhs: &Value) -> CoerceResult {
    let lhs = to_number(lhs);
    let rhs = to_number(rhs);
    coerce(&lhs, &rhs).unwrap_or(CoerceResult::I64(0, 0))
}

macro_rules! math_binop {
    ($name:ident, $int:ident, $float:tt) => {
        pub fn $name(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
            Ok(match numbers(lhs, rhs) {
                CoerceResult::I64(a, b) => match a.$int(b) {
                    Some(val) => Value::from(val),
                    None => Value::from(a as f64 $float b as f64),
                },
                CoerceResult::F64(a, b) => Value::from(a $float b),
            })
        }
    }
}

math_binop!(add, checked_add, +);
math_binop!(sub, checked_sub, -);
math_binop!(mul, checked_mul, *);

fn zero_division() -> Error {
    Error::argument("divided by 0")
}

/// Divides with floor semantics for integers.
///
/// Integer quotients that do not fit an `i64` become floats.
pub fn div(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match numbers(lhs, rhs) {
        CoerceResult::I64(_, 0) => Err(zero_division()),
        CoerceResult::I64(a, b) => Ok(match floor_div(a, b) {
            Some(val) => Value::from(val),
            None => Value::from((a as f64 / b as f64).floor()),
        }),
        CoerceResult::F64(_, b) if b == 0.0 => Err(zero_division()),
        CoerceResult::F64(a, b) => Ok(Value::from(a / b)),
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let quotient = some!(a.checked_div(b));
    if a % b != 0 && (a < 0) != (b < 0) {
        Some(quotient - 1)
    } else {
        Some(quotient)
    }
}

/// Remainder with the sign of the divisor.
pub fn rem(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    match numbers(lhs, rhs) {
        CoerceResult::I64(_, 0) => Err(zero_division()),
        CoerceResult::I64(a, b) => {
            // only `i64::MIN % -1` overflows, its remainder is 0
            let rv = a.checked_rem(b).unwrap_or(0);
            if rv != 0 && (rv < 0) != (b < 0) {
                Ok(Value::from(rv + b))
            } else {
                Ok(Value::from(rv))
            }
        }
        CoerceResult::F64(_, b) if b == 0.0 => Err(zero_division()),
        CoerceResult::F64(a, b) => Ok(Value::from(((a % b) + b) % b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&Value::from("12")), Value::from(12));
        assert_eq!(to_number(&Value::from(" 1.5 ")), Value::from(1.5));
        assert_eq!(to_number(&Value::from("abc")), Value::from(0));
        assert_eq!(to_number(&Value::NIL), Value::from(0));
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(div(&Value::from(7), &Value::from(2)).unwrap(), Value::from(3));
        assert_eq!(div(&Value::from(-7), &Value::from(2)).unwrap(), Value::from(-4));
        assert_eq!(div(&Value::from(7), &Value::from(-2)).unwrap(), Value::from(-4));
        assert_eq!(rem(&Value::from(-7), &Value::from(3)).unwrap(), Value::from(2));
        assert_eq!(rem(&Value::from(7), &Value::from(-3)).unwrap(), Value::from(-2));
        assert!(div(&Value::from(1), &Value::from(0)).is_err());
    }

    #[test]
    fn test_division_at_integer_bounds() {
        let rv = div(&Value::from(i64::MIN), &Value::from(-1)).unwrap();
        assert_eq!(rv, Value::from(9223372036854775808.0));
        assert_eq!(
            div(&Value::from(i64::MIN), &Value::from(2)).unwrap(),
            Value::from(i64::MIN / 2)
        );
        assert_eq!(
            rem(&Value::from(i64::MIN), &Value::from(-1)).unwrap(),
            Value::from(0)
        );
        assert_eq!(
            rem(&Value::from(5), &Value::from(i64::MAX)).unwrap(),
            Value::from(5)
        );
        assert_eq!(
            rem(&Value::from(-5), &Value::from(i64::MAX)).unwrap(),
            Value::from(i64::MAX - 5)
        );
        assert_eq!(
            rem(&Value::from(5), &Value::from(i64::MIN)).unwrap(),
            Value::from(i64::MIN + 5)
        );
    }

    #[test]
    fn test_overflow_goes_to_float() {
        let rv = add(&Value::from(i64::MAX), &Value::from(1)).unwrap();
        assert!(matches!(rv.0, ValueRepr::F64(_)));
    }
}
