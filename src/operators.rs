//! Static tables mapping operator symbols to pure binary functions.
//!
//! Mixed Integer/Float operands promote to Float across the *whole* fold,
//! not just pairwise: if any operand in `(op x1 x2 ... xn)` is a Float,
//! every operand is widened to Float before folding.

use crate::error::EvalError;
use crate::value::Value;

pub type ArithmeticOp = fn(i64, i64) -> Result<i64, EvalError>;
pub type ArithmeticFloatOp = fn(f64, f64) -> f64;

/// One row of the arithmetic table: the integer-only implementation and the
/// float implementation used once any operand has been promoted.
pub struct Arithmetic {
    pub name: &'static str,
    pub int_op: ArithmeticOp,
    pub float_op: ArithmeticFloatOp,
}

pub fn lookup_arithmetic(name: &str) -> Option<&'static Arithmetic> {
    ARITHMETIC.iter().find(|op| op.name == name)
}

pub fn lookup_relational(name: &str) -> Option<&'static Relational> {
    RELATIONAL.iter().find(|op| op.name == name)
}

static ARITHMETIC: &[Arithmetic] = &[
    Arithmetic {
        name: "+",
        int_op: |a, b| Ok(a.wrapping_add(b)),
        float_op: |a, b| a + b,
    },
    Arithmetic {
        name: "-",
        int_op: |a, b| Ok(a.wrapping_sub(b)),
        float_op: |a, b| a - b,
    },
    Arithmetic {
        name: "*",
        int_op: |a, b| Ok(a.wrapping_mul(b)),
        float_op: |a, b| a * b,
    },
    Arithmetic {
        name: "/",
        int_op: |a, b| {
            if b == 0 {
                return Err(EvalError::Arith {
                    message: "/ division by zero".into(),
                });
            }
            Ok(floor_div(a, b))
        },
        float_op: |a, b| a / b,
    },
    Arithmetic {
        name: "mod",
        int_op: |a, b| {
            if b == 0 {
                return Err(EvalError::Arith {
                    message: "mod division by zero".into(),
                });
            }
            // Truncated remainder: sign follows the left operand, same as
            // Rust's native `%`.
            Ok(a % b)
        },
        float_op: |a, b| a % b,
    },
];

/// Integer division that floors toward negative infinity, as opposed to
/// Rust's native `/` which truncates toward zero.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

pub struct Relational {
    pub name: &'static str,
    pub int_op: fn(i64, i64) -> bool,
    pub float_op: fn(f64, f64) -> bool,
    pub str_op: fn(&str, &str) -> bool,
}

static RELATIONAL: &[Relational] = &[
    Relational {
        name: "<",
        int_op: |a, b| a < b,
        float_op: |a, b| a < b,
        str_op: |a, b| a < b,
    },
    Relational {
        name: ">",
        int_op: |a, b| a > b,
        float_op: |a, b| a > b,
        str_op: |a, b| a > b,
    },
    Relational {
        name: "<=",
        int_op: |a, b| a <= b,
        float_op: |a, b| a <= b,
        str_op: |a, b| a <= b,
    },
    Relational {
        name: ">=",
        int_op: |a, b| a >= b,
        float_op: |a, b| a >= b,
        str_op: |a, b| a >= b,
    },
    Relational {
        name: "=",
        int_op: |a, b| a == b,
        float_op: |a, b| a == b,
        str_op: |a, b| a == b,
    },
    Relational {
        name: "<>",
        int_op: |a, b| a != b,
        float_op: |a, b| a != b,
        str_op: |a, b| a != b,
    },
];

/// Apply an arithmetic operator by left fold over `values` (at least two
/// elements). Promotes the whole fold to Float if any operand is a Float.
pub fn apply_arithmetic(op: &Arithmetic, values: &[Value]) -> Result<Value, EvalError> {
    let any_float = values.iter().any(|v| matches!(v, Value::Float(_)));

    for v in values {
        if !v.is_numeric() {
            return Err(EvalError::Type {
                op: op.name.to_string(),
                expected: "number",
                got: v.kind_name(),
            });
        }
    }

    if any_float {
        let mut iter = values.iter().map(as_float);
        let mut acc = iter.next().unwrap();
        for x in iter {
            acc = (op.float_op)(acc, x);
        }
        Ok(Value::Float(acc))
    } else {
        let mut iter = values.iter().map(|v| match v {
            Value::Integer(i) => *i,
            _ => unreachable!("checked above"),
        });
        let mut acc = iter.next().unwrap();
        for x in iter {
            acc = (op.int_op)(acc, x)?;
        }
        Ok(Value::Integer(acc))
    }
}

/// Apply a relational operator as a chained comparison: true iff every
/// adjacent pair compares true.
pub fn apply_relational(op: &Relational, values: &[Value]) -> Result<Value, EvalError> {
    for pair in values.windows(2) {
        let ok = compare_pair(op, &pair[0], &pair[1])?;
        if !ok {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn compare_pair(op: &Relational, a: &Value, b: &Value) -> Result<bool, EvalError> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok((op.int_op)(*x, *y)),
        (Value::Str(x), Value::Str(y)) => Ok((op.str_op)(x, y)),
        (a, b) if a.is_numeric() && b.is_numeric() => Ok((op.float_op)(as_float(a), as_float(b))),
        (a, b) => Err(EvalError::Type {
            op: op.name.to_string(),
            expected: a.kind_name(),
            got: b.kind_name(),
        }),
    }
}

fn as_float(v: &Value) -> f64 {
    match v {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        _ => unreachable!("checked by caller"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_addition_folds_left_to_right() {
        let op = lookup_arithmetic("+").unwrap();
        let result = apply_arithmetic(
            op,
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )
        .unwrap();
        assert_eq!(result, Value::Integer(6));
    }

    #[test]
    fn mixed_operands_promote_the_whole_fold_to_float() {
        let op = lookup_arithmetic("*").unwrap();
        let result = apply_arithmetic(op, &[Value::Integer(2), Value::Float(0.5)]).unwrap();
        assert_eq!(result, Value::Float(1.0));
    }

    #[test]
    fn integer_division_floors_toward_negative_infinity() {
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, -2), 3);
    }

    #[test]
    fn division_by_zero_is_an_arith_error() {
        let op = lookup_arithmetic("/").unwrap();
        let result = apply_arithmetic(op, &[Value::Integer(1), Value::Integer(0)]);
        assert!(matches!(result, Err(EvalError::Arith { .. })));
    }

    #[test]
    fn chained_relational_comparison() {
        let op = lookup_relational("<").unwrap();
        let result = apply_relational(
            op,
            &[Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        )
        .unwrap();
        assert_eq!(result, Value::Boolean(true));

        let result = apply_relational(
            op,
            &[Value::Integer(1), Value::Integer(3), Value::Integer(2)],
        )
        .unwrap();
        assert_eq!(result, Value::Boolean(false));
    }

    #[test]
    fn cross_type_comparison_is_a_type_error() {
        let op = lookup_relational("=").unwrap();
        let result = apply_relational(op, &[Value::Integer(1), Value::from("a")]);
        assert!(matches!(result, Err(EvalError::Type { .. })));
    }
}
