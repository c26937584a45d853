//! Runtime values for the lamtrace script host.
//!
//! `Value` is the dynamically typed value passed between script functions and
//! handed to the tracer. The formatter in [`format`] renders any value into a
//! short, bounded description for trace output.
//!
//! ```ignore
//! use lamtrace_value::{Value, format_value};
//!
//! assert_eq!(format_value(&Value::Number(-0.0)), "-0");
//! assert_eq!(format_value(&Value::array(vec![Value::Null])), "Array(1)");
//! ```

mod format;
mod number;

pub use format::{MAX_STRING_CHARS, UNPRINTABLE, format_arguments, format_value};
pub use number::{format_number, number_to_string};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use num_bigint::BigInt;
use rustc_hash::FxHashMap;

/// Property map backing plain objects.
pub type ObjectMap = FxHashMap<Rc<str>, Value>;

/// Identifier of a script function known to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub u32);

/// A callable script function value.
#[derive(Clone, Debug)]
pub struct FunctionValue {
    /// Function name, `None` for anonymous function expressions.
    pub name: Option<Rc<str>>,
    /// Host identifier used to resolve the function body.
    pub id: FunctionId,
}

/// A class definition value.
#[derive(Debug)]
pub struct ClassValue {
    pub name: Option<Rc<str>>,
}

/// A unique symbol with an optional description.
#[derive(Debug)]
pub struct Symbol {
    pub description: Option<Rc<str>>,
}

/// Why a host object could not describe itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unprintable;

/// An opaque value provided by the embedder.
///
/// Formatting calls [`HostObject::describe`]; failures degrade to
/// [`UNPRINTABLE`].
pub trait HostObject: fmt::Debug {
    fn describe(&self) -> Result<String, Unprintable>;
}

/// Dynamically typed script value.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    BigInt(Rc<BigInt>),
    Symbol(Rc<Symbol>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Function(FunctionValue),
    Class(Rc<ClassValue>),
    Host(Rc<dyn HostObject>),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Create an array value.
    pub fn array(items: Vec<Self>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    /// Create a plain object value.
    pub fn object(props: ObjectMap) -> Self {
        Self::Object(Rc::new(RefCell::new(props)))
    }

    /// Create a big integer value.
    pub fn bigint(value: impl Into<BigInt>) -> Self {
        Self::BigInt(Rc::new(value.into()))
    }

    /// Create a fresh symbol.
    pub fn symbol(description: Option<&str>) -> Self {
        Self::Symbol(Rc::new(Symbol {
            description: description.map(Rc::from),
        }))
    }

    /// Create a class value.
    pub fn class(name: Option<&str>) -> Self {
        Self::Class(Rc::new(ClassValue {
            name: name.map(Rc::from),
        }))
    }

    /// Name of the value's type, as reported by `typeof`.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Host(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::BigInt(_) => "bigint",
            Self::Symbol(_) => "symbol",
            Self::Function(_) | Self::Class(_) => "function",
        }
    }

    /// Truthiness used by conditions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::BigInt(b) => b.sign() != num_bigint::Sign::NoSign,
            _ => true,
        }
    }

    /// Numeric conversion used by arithmetic.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    /// String conversion used by concatenation.
    ///
    /// Unlike [`format_value`], strings are not quoted and `-0` becomes `0`.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::String(s) => s.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::BigInt(b) => b.to_string(),
            Self::Array(items) => match items.try_borrow() {
                Ok(items) => items
                    .iter()
                    .map(|v| match v {
                        Self::Undefined | Self::Null => String::new(),
                        Self::Array(_) => UNPRINTABLE.to_string(),
                        other => other.to_display_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                Err(_) => UNPRINTABLE.to_string(),
            },
            other => format_value(other),
        }
    }

    /// Strict equality (`===`).
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => Rc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a.id == b.id,
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Host(a), Self::Host(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}
