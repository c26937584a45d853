//! Built-in functions installed in every scope.

use lamtrace_value::{BigInt, Value};

use crate::{HostError, Result};

/// A function implemented by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Native {
    /// `BigInt(n)`: integral number or decimal string to big integer.
    BigInt,
    /// `Symbol(description)`: a fresh symbol.
    Symbol,
    /// `print(...args)`: write the arguments to the host console.
    Print,
}

impl Native {
    pub const ALL: [Self; 3] = [Self::BigInt, Self::Symbol, Self::Print];

    pub const fn name(self) -> &'static str {
        match self {
            Self::BigInt => "BigInt",
            Self::Symbol => "Symbol",
            Self::Print => "print",
        }
    }

    /// Call the native. `console` receives `print` output.
    pub fn call(self, args: &[Value], console: &dyn Fn(&str)) -> Result<Value> {
        let first = args.first().unwrap_or(&Value::Undefined);
        match self {
            Self::BigInt => to_bigint(first).map(Value::bigint),
            Self::Symbol => Ok(match first {
                Value::Undefined => Value::symbol(None),
                other => Value::symbol(Some(&other.to_display_string())),
            }),
            Self::Print => {
                let line = args
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                console(&line);
                Ok(Value::Undefined)
            }
        }
    }
}

fn to_bigint(value: &Value) -> Result<BigInt> {
    match value {
        Value::BigInt(b) => Ok(b.as_ref().clone()),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => {
            // Integral f64 values print without a fraction or exponent.
            format!("{n:.0}")
                .parse()
                .map_err(|_| HostError::Type(format!("cannot convert {n} to a BigInt")))
        }
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| HostError::Type(format!("cannot convert \"{s}\" to a BigInt"))),
        Value::Bool(b) => Ok(BigInt::from(u8::from(*b))),
        other => Err(HostError::Type(format!(
            "cannot convert {} to a BigInt",
            other.to_display_string()
        ))),
    }
}
