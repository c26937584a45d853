//! Operator semantics.

use lamtrace_script::{BinaryOp, UnaryOp};
use lamtrace_value::{BigInt, Value};

use crate::{HostError, Result};

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value> {
    Ok(match op {
        UnaryOp::Neg => match operand {
            Value::BigInt(b) => Value::bigint(-b.as_ref().clone()),
            other => Value::Number(-other.to_number()),
        },
        UnaryOp::Plus => match operand {
            Value::BigInt(_) => {
                return Err(HostError::Type("cannot convert a BigInt to a number".into()));
            }
            other => Value::Number(other.to_number()),
        },
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::Typeof => Value::string(operand.type_name()),
    })
}

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Value::BigInt(a), Value::BigInt(b)) = (left, right) {
        return bigint_binary(op, a, b);
    }
    Ok(match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => Value::string(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )),
            _ => Value::Number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => compare(left, right, |o| o.is_lt()),
        BinaryOp::Gt => compare(left, right, |o| o.is_gt()),
        BinaryOp::Le => compare(left, right, |o| o.is_le()),
        BinaryOp::Ge => compare(left, right, |o| o.is_ge()),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        BinaryOp::LooseEq => Value::Bool(loose_equals(left, right)),
        BinaryOp::LooseNe => Value::Bool(!loose_equals(left, right)),
    })
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.is_some_and(test))
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_) | Value::Bool(_), Value::String(_) | Value::Bool(_))
        | (Value::String(_) | Value::Bool(_), Value::Number(_)) => {
            #[allow(clippy::float_cmp)]
            let equal = left.to_number() == right.to_number();
            equal
        }
        _ => left.strict_equals(right),
    }
}

fn bigint_binary(op: BinaryOp, a: &BigInt, b: &BigInt) -> Result<Value> {
    Ok(match op {
        BinaryOp::Add => Value::bigint(a + b),
        BinaryOp::Sub => Value::bigint(a - b),
        BinaryOp::Mul => Value::bigint(a * b),
        BinaryOp::Div | BinaryOp::Rem if *b == BigInt::default() => {
            return Err(HostError::Type("BigInt division by zero".into()));
        }
        BinaryOp::Div => Value::bigint(a / b),
        BinaryOp::Rem => Value::bigint(a % b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Le => Value::Bool(a <= b),
        BinaryOp::Ge => Value::Bool(a >= b),
        BinaryOp::StrictEq | BinaryOp::LooseEq => Value::Bool(a == b),
        BinaryOp::StrictNe | BinaryOp::LooseNe => Value::Bool(a != b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(binary(BinaryOp::Add, &num(1.0), &num(2.0)).unwrap().to_string(), "3");
        assert_eq!(binary(BinaryOp::Rem, &num(7.0), &num(4.0)).unwrap().to_string(), "3");
        assert_eq!(
            binary(BinaryOp::Div, &num(1.0), &num(0.0)).unwrap().to_string(),
            "Infinity"
        );
        assert_eq!(unary(UnaryOp::Neg, &num(0.0)).unwrap().to_string(), "-0");
    }

    #[test]
    fn test_string_concat() {
        let joined = binary(BinaryOp::Add, &Value::string("n="), &num(-0.0)).unwrap();
        assert_eq!(joined.to_string(), "\"n=0\"");
    }

    #[test]
    fn test_comparisons() {
        assert!(binary(BinaryOp::Lt, &num(1.0), &num(2.0)).unwrap().is_truthy());
        assert!(!binary(BinaryOp::Lt, &num(f64::NAN), &num(2.0)).unwrap().is_truthy());
        assert!(binary(BinaryOp::Lt, &Value::string("a"), &Value::string("b")).unwrap().is_truthy());
        assert!(binary(BinaryOp::LooseEq, &Value::Null, &Value::Undefined).unwrap().is_truthy());
        assert!(binary(BinaryOp::LooseEq, &num(1.0), &Value::string("1")).unwrap().is_truthy());
        assert!(!binary(BinaryOp::StrictEq, &num(1.0), &Value::string("1")).unwrap().is_truthy());
    }

    #[test]
    fn test_bigint_ops() {
        let a = Value::bigint(7);
        let b = Value::bigint(2);
        assert_eq!(binary(BinaryOp::Mul, &a, &b).unwrap().to_string(), "BigInt(14)");
        assert!(binary(BinaryOp::Div, &a, &Value::bigint(0)).is_err());
        assert!(unary(UnaryOp::Plus, &a).is_err());
        assert_eq!(unary(UnaryOp::Typeof, &a).unwrap().to_string(), "\"bigint\"");
    }
}
