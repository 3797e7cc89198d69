//! Renders a `Value` back into Scheme syntax for `display` and the REPL.

use std::fmt;

use crate::value::Value;

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            // Rust's default f64 Display drops the trailing `.0` on whole
            // numbers; Integer and Float must stay visually distinct.
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(true) => write!(f, "#t"),
            Value::Boolean(false) => write!(f, "#f"),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            // Callables and Unit have no defined textual form: a Callable is
            // never returned to the top level, and Unit suppresses printing
            // before `format` is ever reached.
            Value::Callable(_) => write!(f, "#<callable>"),
            Value::Unit => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn formats_scalars() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Boolean(true).to_string(), "#t");
        assert_eq!(Value::Boolean(false).to_string(), "#f");
        assert_eq!(Value::Str(Rc::from("hi")).to_string(), "hi");
    }

    #[test]
    fn whole_number_floats_keep_a_decimal_point() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(-3.0).to_string(), "-3.0");
        assert_eq!(Value::Integer(2).to_string(), "2");
    }

    #[test]
    fn formats_nested_lists() {
        let list = Value::List(Rc::from(vec![
            Value::Integer(1),
            Value::List(Rc::from(vec![Value::Integer(2), Value::Integer(3)])),
        ]));
        assert_eq!(list.to_string(), "(1 (2 3))");
    }
}
