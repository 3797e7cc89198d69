//! The evaluator's error taxonomy.
//!
//! Messages are human-oriented, not machine-parseable: they name the failing
//! operation and the offending value's kind, e.g. "car expects a list, got
//! integer". Evaluation fails fast — there is no per-form recovery, errors
//! unwind until a top-level handler in `crate::driver` prints them and moves
//! on (REPL) or exits non-zero (script mode).

use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum EvalError {
    #[snafu(display("undefined variable `{}`", name))]
    Undefined { name: String },

    #[snafu(display("{} expects {} argument(s), got {}", name, expected, got))]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[snafu(display("{} expects a {}, got {}", op, expected, got))]
    Type {
        op: String,
        expected: &'static str,
        got: &'static str,
    },

    #[snafu(display("{} expects a non-empty list", op))]
    Range { op: String },

    #[snafu(display("{}", message))]
    Arith { message: String },

    #[snafu(display("redefined variable `{}` in the same scope", name))]
    Redefinition { name: String },

    #[snafu(display("{} syntax error(s) found", count))]
    Syntax { count: usize },

    #[snafu(display("stack overflow"))]
    StackOverflow,
}

pub type EvalResult<T> = Result<T, EvalError>;
