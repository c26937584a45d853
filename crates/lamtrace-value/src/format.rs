//! Value formatting for trace output.
//!
//! Every rendering is bounded: containers report their kind and length but are
//! never traversed, and formatting never panics. Anything that cannot be
//! described degrades to [`UNPRINTABLE`].

use std::fmt::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::{HostObject, Value, format_number};

/// Placeholder for values that cannot be rendered.
pub const UNPRINTABLE: &str = "[unprintable]";

/// Longest string rendered in full. Longer strings are cut and end in `…`.
pub const MAX_STRING_CHARS: usize = 256;

/// Render a single value into a short descriptive string.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => quote(s),
        Value::BigInt(b) => format!("BigInt({b})"),
        Value::Symbol(sym) => format!("Symbol({})", sym.description.as_deref().unwrap_or("")),
        Value::Array(items) => match items.try_borrow() {
            Ok(items) => format!("Array({})", items.len()),
            Err(_) => UNPRINTABLE.to_string(),
        },
        Value::Object(_) => "[object Object]".to_string(),
        Value::Function(func) => {
            format!("function {}()", func.name.as_deref().unwrap_or("anonymous"))
        }
        Value::Class(class) => format!("class {}", class.name.as_deref().unwrap_or("anonymous")),
        Value::Host(obj) => describe_host(obj.as_ref()),
    }
}

/// Render an argument list as `a, b, c`.
pub fn format_arguments(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format_value(arg));
    }
    out
}

fn describe_host(obj: &dyn HostObject) -> String {
    match catch_unwind(AssertUnwindSafe(|| obj.describe())) {
        Ok(Ok(text)) => text,
        _ => UNPRINTABLE.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_STRING_CHARS) + 2);
    out.push('"');
    let mut chars = s.chars();
    for c in chars.by_ref().take(MAX_STRING_CHARS) {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    if chars.next().is_some() {
        out.push('…');
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionId, FunctionValue, ObjectMap, Unprintable};
    use std::rc::Rc;

    #[derive(Debug)]
    struct Described(&'static str);

    impl HostObject for Described {
        fn describe(&self) -> Result<String, Unprintable> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl HostObject for Broken {
        fn describe(&self) -> Result<String, Unprintable> {
            Err(Unprintable)
        }
    }

    #[derive(Debug)]
    struct Panicking;

    impl HostObject for Panicking {
        fn describe(&self) -> Result<String, Unprintable> {
            panic!("describe exploded")
        }
    }

    fn function(name: Option<&str>) -> Value {
        Value::Function(FunctionValue {
            name: name.map(Rc::from),
            id: FunctionId(0),
        })
    }

    #[test]
    fn test_primitives() {
        assert_eq!(format_value(&Value::Number(-0.0)), "-0");
        assert_eq!(format_value(&Value::Number(1.0)), "1");
        assert_eq!(format_value(&Value::Number(f64::NAN)), "NaN");
        assert_eq!(format_value(&Value::Number(f64::INFINITY)), "Infinity");
        assert_eq!(format_value(&Value::Undefined), "undefined");
        assert_eq!(format_value(&Value::Null), "null");
        assert_eq!(format_value(&Value::Bool(false)), "false");
        assert_eq!(format_value(&Value::string("4")), "\"4\"");
        assert_eq!(format_value(&Value::bigint(5)), "BigInt(5)");
        assert_eq!(format_value(&Value::symbol(Some("6"))), "Symbol(6)");
        assert_eq!(format_value(&Value::symbol(None)), "Symbol()");
    }

    #[test]
    fn test_containers_are_not_traversed() {
        let nested = Value::array(vec![Value::array(vec![Value::Null; 3])]);
        assert_eq!(format_value(&nested), "Array(1)");

        let mut props = ObjectMap::default();
        props.insert(Rc::from("attribute"), Value::Number(3.0));
        assert_eq!(format_value(&Value::object(props)), "[object Object]");
    }

    #[test]
    fn test_callables() {
        assert_eq!(format_value(&function(Some("foo"))), "function foo()");
        assert_eq!(format_value(&function(None)), "function anonymous()");
        assert_eq!(format_value(&Value::class(Some("MyClass"))), "class MyClass");
        assert_eq!(format_value(&Value::class(None)), "class anonymous");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(format_value(&Value::string("a\"b\\c\n")), r#""a\"b\\c\n""#);
    }

    #[test]
    fn test_long_strings_are_cut() {
        let full = "a".repeat(MAX_STRING_CHARS);
        assert_eq!(format_value(&Value::string(full.as_str())), format!("\"{full}\""));

        let long = "b".repeat(MAX_STRING_CHARS * 100);
        let rendered = format_value(&Value::string(long.as_str()));
        assert_eq!(rendered.chars().count(), MAX_STRING_CHARS + 3);
        assert!(rendered.ends_with("b…\""));
    }

    #[test]
    fn test_host_objects_never_fail() {
        assert_eq!(format_value(&Value::Host(Rc::new(Described("Window")))), "Window");
        assert_eq!(format_value(&Value::Host(Rc::new(Broken))), UNPRINTABLE);
        assert_eq!(format_value(&Value::Host(Rc::new(Panicking))), UNPRINTABLE);
    }

    #[test]
    fn test_borrowed_array_is_unprintable() {
        let arr = Value::array(vec![Value::Null]);
        let Value::Array(inner) = &arr else {
            unreachable!()
        };
        let _guard = inner.borrow_mut();
        assert_eq!(format_value(&arr), UNPRINTABLE);
    }

    #[test]
    fn test_format_arguments() {
        let args = [
            Value::Number(-0.0),
            Value::Number(1.0),
            Value::array(vec![Value::string("array")]),
            Value::string("4"),
        ];
        assert_eq!(format_arguments(&args), "-0, 1, Array(1), \"4\"");
        assert_eq!(format_arguments(&[]), "");
    }
}
