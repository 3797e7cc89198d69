//! Walks a parse tree; one handler per syntactic form.
//!
//! `eval` takes the `Environment` as an explicit argument rather than `&mut
//! self` so that recursive calls can run against the environment exposed by
//! a `CallGuard`/`ScopeGuard` without fighting the borrow checker.

use std::collections::HashMap;
use std::rc::Rc;

use crate::builtins;
use crate::environment::Environment;
use crate::error::EvalError;
use crate::lang::ast::{SymExp, SymExpSrc};
use crate::lang::lexer::Lexer;
use crate::lang::parser::Parser;
use crate::lang::span::Span;
use crate::operators::{self, Arithmetic, Relational};
use crate::value::{Callable, Value};

/// Programs that recurse deeper than this are treated as `StackOverflow`.
/// Real unbounded recursion would abort the process rather than unwind, so
/// calls are counted explicitly and cut off well short of the host stack's
/// actual limit.
const MAX_CALL_DEPTH: usize = 4_000;

/// Owns the environment for one interpreter session.
pub struct Evaluator {
    env: Environment,
}

impl Evaluator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        builtins::install(&mut env);
        Self { env }
    }

    pub fn env(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Evaluate one top-level form.
    pub fn eval(&mut self, node: &SymExpSrc) -> Result<Value, EvalError> {
        eval(&mut self.env, node)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn eval(env: &mut Environment, node: &SymExpSrc) -> Result<Value, EvalError> {
    match &node.exp {
        SymExp::Int(i) => Ok(Value::Integer(*i)),
        SymExp::Float(x) => Ok(Value::Float(*x)),
        SymExp::Boolean(b) => Ok(Value::Boolean(*b)),
        SymExp::Str(s) => Ok(Value::from(s.as_str())),
        SymExp::Quoted(items) => Ok(eval_quoted_list(items)),
        SymExp::Variable(ident) => env
            .lookup(&ident.0)
            .cloned()
            .ok_or_else(|| EvalError::Undefined {
                name: ident.0.clone(),
            }),
        SymExp::List(items) => eval_list(env, items),
    }
}

fn eval_quoted_list(items: &[SymExpSrc]) -> Value {
    Value::List(Rc::from(
        items.iter().map(eval_quoted_item).collect::<Vec<_>>(),
    ))
}

/// Reads a single literal inside a quoted list: atoms become themselves,
/// identifiers become symbol strings, and nested lists (whether written with
/// their own `'` or not) become nested quoted lists.
fn eval_quoted_item(item: &SymExpSrc) -> Value {
    match &item.exp {
        SymExp::Variable(ident) => Value::from(ident.0.as_str()),
        SymExp::Str(s) => Value::from(s.as_str()),
        SymExp::Int(i) => Value::Integer(*i),
        SymExp::Float(f) => Value::Float(*f),
        SymExp::Boolean(b) => Value::Boolean(*b),
        SymExp::Quoted(items) | SymExp::List(items) => eval_quoted_list(items),
    }
}

fn describe(exp: &SymExp) -> &'static str {
    match exp {
        SymExp::Variable(_) => "identifier",
        SymExp::Str(_) => "string",
        SymExp::Float(_) => "float",
        SymExp::Int(_) => "integer",
        SymExp::Boolean(_) => "boolean",
        SymExp::List(_) => "list",
        SymExp::Quoted(_) => "quoted list",
    }
}

fn eval_list(env: &mut Environment, items: &[SymExpSrc]) -> Result<Value, EvalError> {
    let (head, args) = items.split_first().ok_or_else(|| EvalError::Type {
        op: "eval".to_string(),
        expected: "non-empty form",
        got: "empty list",
    })?;

    let ident = match &head.exp {
        SymExp::Variable(ident) => &ident.0,
        other => {
            return Err(EvalError::Type {
                op: "eval".to_string(),
                expected: "callable form",
                got: describe(other),
            })
        }
    };

    match ident.as_str() {
        "define" => eval_define(env, args),
        "if" => eval_if(env, args),
        "cond" => eval_cond(env, args),
        "and" => eval_and(env, args),
        "or" => eval_or(env, args),
        "not" => eval_not(env, args),
        "let" => eval_let(env, args),
        "begin" => eval_begin(env, args),
        "car" => eval_car(env, args),
        "cdr" => eval_cdr(env, args),
        "cons" => eval_cons(env, args),
        "null?" => eval_null(env, args),
        "display" => eval_display(env, args),
        "newline" => eval_newline(args),
        "read" => eval_read(args),
        name => {
            if let Some(op) = operators::lookup_arithmetic(name) {
                eval_arithmetic(env, op, args)
            } else if let Some(op) = operators::lookup_relational(name) {
                eval_relational(env, op, args)
            } else {
                eval_call(env, name, args)
            }
        }
    }
}

fn eval_define(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if args.len() < 2 {
        return Err(EvalError::Arity {
            name: "define".to_string(),
            expected: 2,
            got: args.len(),
        });
    }
    match &args[0].exp {
        SymExp::Variable(ident) => {
            if args.len() != 2 {
                return Err(EvalError::Arity {
                    name: "define".to_string(),
                    expected: 2,
                    got: args.len(),
                });
            }
            let value = eval(env, &args[1])?;
            env.define(ident.0.clone(), value)?;
            Ok(Value::Unit)
        }
        SymExp::List(signature) => {
            let (name_node, param_nodes) = signature.split_first().ok_or(EvalError::Type {
                op: "define".to_string(),
                expected: "a function name",
                got: "an empty signature",
            })?;
            let name = match &name_node.exp {
                SymExp::Variable(ident) => ident.0.clone(),
                other => {
                    return Err(EvalError::Type {
                        op: "define".to_string(),
                        expected: "identifier",
                        got: describe(other),
                    })
                }
            };
            let mut params = Vec::with_capacity(param_nodes.len());
            for p in param_nodes {
                match &p.exp {
                    SymExp::Variable(ident) => params.push(ident.0.clone()),
                    other => {
                        return Err(EvalError::Type {
                            op: "define".to_string(),
                            expected: "identifier",
                            got: describe(other),
                        })
                    }
                }
            }
            let body = args[1..].to_vec();
            env.define(
                name.clone(),
                Value::Callable(Rc::new(Callable { name, params, body })),
            )?;
            Ok(Value::Unit)
        }
        other => Err(EvalError::Type {
            op: "define".to_string(),
            expected: "identifier or function signature",
            got: describe(other),
        }),
    }
}

fn eval_if(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if args.len() != 3 {
        return Err(EvalError::Arity {
            name: "if".to_string(),
            expected: 3,
            got: args.len(),
        });
    }
    if eval(env, &args[0])?.is_truthy() {
        eval(env, &args[1])
    } else {
        eval(env, &args[2])
    }
}

fn eval_cond(env: &mut Environment, clauses: &[SymExpSrc]) -> Result<Value, EvalError> {
    for clause in clauses {
        let items = match &clause.exp {
            SymExp::List(items) if !items.is_empty() => items,
            other => {
                return Err(EvalError::Type {
                    op: "cond".to_string(),
                    expected: "non-empty clause",
                    got: describe(other),
                })
            }
        };
        let (test, body) = items.split_first().expect("checked non-empty above");
        let is_else = matches!(&test.exp, SymExp::Variable(ident) if ident.0 == "else");
        let taken = is_else || eval(env, test)?.is_truthy();
        if taken {
            let mut result = Value::Unit;
            for expr in body {
                result = eval(env, expr)?;
            }
            return Ok(result);
        }
    }
    Ok(Value::Unit)
}

fn eval_and(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    for a in args {
        if !eval(env, a)?.is_truthy() {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn eval_or(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    for a in args {
        if eval(env, a)?.is_truthy() {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn eval_not(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::Arity {
            name: "not".to_string(),
            expected: 1,
            got: args.len(),
        });
    }
    Ok(Value::Boolean(!eval(env, &args[0])?.is_truthy()))
}

fn eval_let(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    let (bindings_node, body) = args.split_first().ok_or(EvalError::Arity {
        name: "let".to_string(),
        expected: 1,
        got: 0,
    })?;
    let bindings = match &bindings_node.exp {
        SymExp::List(items) => items,
        other => {
            return Err(EvalError::Type {
                op: "let".to_string(),
                expected: "a list of bindings",
                got: describe(other),
            })
        }
    };

    // Every binding's value expression is evaluated in the *current* scope,
    // before any of them become visible to each other.
    let mut evaluated = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let pair = match &binding.exp {
            SymExp::List(pair) if pair.len() == 2 => pair,
            other => {
                return Err(EvalError::Type {
                    op: "let".to_string(),
                    expected: "a (name value) binding",
                    got: describe(other),
                })
            }
        };
        let name = match &pair[0].exp {
            SymExp::Variable(ident) => ident.0.clone(),
            other => {
                return Err(EvalError::Type {
                    op: "let".to_string(),
                    expected: "identifier",
                    got: describe(other),
                })
            }
        };
        let value = eval(env, &pair[1])?;
        evaluated.push((name, value));
    }

    let mut guard = env.scoped();
    for (name, value) in evaluated {
        guard.env().define(name, value)?;
    }
    let mut result = Value::Unit;
    for expr in body {
        result = eval(guard.env(), expr)?;
    }
    Ok(result)
}

fn eval_begin(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    let mut result = Value::Unit;
    for expr in args {
        result = eval(env, expr)?;
    }
    Ok(result)
}

fn eval_car(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    let list = eval_single_list_arg(env, "car", args)?;
    list.first()
        .cloned()
        .ok_or_else(|| EvalError::Range {
            op: "car".to_string(),
        })
}

fn eval_cdr(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    let list = eval_single_list_arg(env, "cdr", args)?;
    if list.is_empty() {
        return Err(EvalError::Range {
            op: "cdr".to_string(),
        });
    }
    Ok(Value::List(Rc::from(list[1..].to_vec())))
}

fn eval_single_list_arg(
    env: &mut Environment,
    op: &str,
    args: &[SymExpSrc],
) -> Result<Rc<[Value]>, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::Arity {
            name: op.to_string(),
            expected: 1,
            got: args.len(),
        });
    }
    match eval(env, &args[0])? {
        Value::List(items) => Ok(items),
        other => Err(EvalError::Type {
            op: op.to_string(),
            expected: "list",
            got: other.kind_name(),
        }),
    }
}

fn eval_cons(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::Arity {
            name: "cons".to_string(),
            expected: 2,
            got: args.len(),
        });
    }
    let head = eval(env, &args[0])?;
    match eval(env, &args[1])? {
        Value::List(tail) => {
            let mut items = Vec::with_capacity(tail.len() + 1);
            items.push(head);
            items.extend(tail.iter().cloned());
            Ok(Value::List(Rc::from(items)))
        }
        other => Err(EvalError::Type {
            op: "cons".to_string(),
            expected: "list",
            got: other.kind_name(),
        }),
    }
}

fn eval_null(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    let list = eval_single_list_arg(env, "null?", args)?;
    Ok(Value::Boolean(list.is_empty()))
}

fn eval_display(env: &mut Environment, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::Arity {
            name: "display".to_string(),
            expected: 1,
            got: args.len(),
        });
    }
    let value = eval(env, &args[0])?;
    print!("{}", value);
    Ok(Value::Unit)
}

fn eval_newline(args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::Arity {
            name: "newline".to_string(),
            expected: 0,
            got: args.len(),
        });
    }
    println!();
    Ok(Value::Unit)
}

fn eval_read(args: &[SymExpSrc]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::Arity {
            name: "read".to_string(),
            expected: 0,
            got: args.len(),
        });
    }
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).map_err(|_| EvalError::Type {
        op: "read".to_string(),
        expected: "a line of input",
        got: "an I/O error",
    })?;
    classify_input(line.trim())
}

/// Classifies one line of raw input per the `read` contract: quoted list,
/// then integer, then float, then falling back to the raw string.
fn classify_input(trimmed: &str) -> Result<Value, EvalError> {
    if trimmed.starts_with("'(") && trimmed.ends_with(')') {
        return parse_quoted_list_literal(trimmed);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    if trimmed.contains('.') {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Ok(Value::Float(f));
        }
    }
    Ok(Value::from(trimmed))
}

fn parse_quoted_list_literal(src: &str) -> Result<Value, EvalError> {
    let malformed = || EvalError::Type {
        op: "read".to_string(),
        expected: "a quoted list literal",
        got: "malformed input",
    };

    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token() {
        tokens.push(tok);
    }
    let mut parser = Parser::new(src, &tokens);
    let forms = parser.parse();
    if !parser.errors().is_empty() || forms.len() != 1 {
        return Err(malformed());
    }
    match &forms[0].exp {
        SymExp::Quoted(items) => Ok(eval_quoted_list(items)),
        _ => Err(malformed()),
    }
}

fn eval_arithmetic(
    env: &mut Environment,
    op: &Arithmetic,
    args: &[SymExpSrc],
) -> Result<Value, EvalError> {
    if args.len() < 2 {
        return Err(EvalError::Arity {
            name: op.name.to_string(),
            expected: 2,
            got: args.len(),
        });
    }
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(eval(env, a)?);
    }
    operators::apply_arithmetic(op, &values)
}

fn eval_relational(
    env: &mut Environment,
    op: &Relational,
    args: &[SymExpSrc],
) -> Result<Value, EvalError> {
    if args.len() < 2 {
        return Err(EvalError::Arity {
            name: op.name.to_string(),
            expected: 2,
            got: args.len(),
        });
    }
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(eval(env, a)?);
    }
    operators::apply_relational(op, &values)
}

fn eval_call(env: &mut Environment, name: &str, args: &[SymExpSrc]) -> Result<Value, EvalError> {
    let mut values = Vec::with_capacity(args.len());
    for a in args {
        values.push(eval(env, a)?);
    }

    let callable = match env.lookup(name) {
        None => {
            return Err(EvalError::Undefined {
                name: name.to_string(),
            })
        }
        Some(Value::Callable(callable)) => Rc::clone(callable),
        Some(other) => {
            return Err(EvalError::Type {
                op: name.to_string(),
                expected: "callable",
                got: other.kind_name(),
            })
        }
    };

    if callable.params.len() != values.len() {
        return Err(EvalError::Arity {
            name: name.to_string(),
            expected: callable.params.len(),
            got: values.len(),
        });
    }

    if env.call_depth() >= MAX_CALL_DEPTH {
        return Err(EvalError::StackOverflow);
    }

    let mut frame = HashMap::with_capacity(callable.params.len());
    for (param, value) in callable.params.iter().zip(values) {
        frame.insert(param.clone(), value);
    }

    let mut guard = env.enter_call(frame);
    let mut result = Value::Unit;
    for expr in &callable.body {
        result = eval(guard.env(), expr)?;
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::ast::Ident;

    fn ident(name: &str) -> SymExpSrc {
        SymExpSrc {
            src: Span { begin: 0, end: 0 },
            exp: SymExp::Variable(Ident(name.to_string())),
        }
    }

    fn int(i: i64) -> SymExpSrc {
        SymExpSrc {
            src: Span { begin: 0, end: 0 },
            exp: SymExp::Int(i),
        }
    }

    fn list(items: Vec<SymExpSrc>) -> SymExpSrc {
        SymExpSrc {
            src: Span { begin: 0, end: 0 },
            exp: SymExp::List(items),
        }
    }

    fn eval_source(evaluator: &mut Evaluator, src: &str) -> Result<Value, EvalError> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next_token() {
            tokens.push(tok);
        }
        let mut parser = Parser::new(src, &tokens);
        let forms = parser.parse();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        let mut result = Value::Unit;
        for form in &forms {
            result = evaluator.eval(form)?;
        }
        Ok(result)
    }

    #[test]
    fn sums_via_left_fold() {
        let mut ev = Evaluator::new();
        let expr = list(vec![ident("+"), int(1), int(2), int(3)]);
        assert_eq!(eval(ev.env(), &expr).unwrap(), Value::Integer(6));
    }

    #[test]
    fn factorial_recurses_through_defines() {
        let mut ev = Evaluator::new();
        let result = eval_source(
            &mut ev,
            "(define (fact n) (if (<= n 1) 1 (* n (fact (- n 1))))) (fact 5)",
        )
        .unwrap();
        assert_eq!(result, Value::Integer(120));
    }

    #[test]
    fn callees_do_not_see_caller_locals() {
        let mut ev = Evaluator::new();
        eval_source(&mut ev, "(define g 1) (define (f) g)").unwrap();
        let result = eval_source(&mut ev, "(let ((g 2)) (f))").unwrap();
        // `f` must see the global `g`, not the `let`-bound local of the same
        // name visible at its call site.
        assert_eq!(result, Value::Integer(1));
    }

    #[test]
    fn let_bindings_are_not_mutually_visible() {
        let mut ev = Evaluator::new();
        eval_source(&mut ev, "(define x 10)").unwrap();
        let result = eval_source(&mut ev, "(let ((x 1) (y x)) y)").unwrap();
        assert_eq!(result, Value::Integer(10));
    }

    #[test]
    fn redefinition_in_same_frame_is_an_error() {
        let mut ev = Evaluator::new();
        eval_source(&mut ev, "(define x 1)").unwrap();
        let err = eval_source(&mut ev, "(define x 2)").unwrap_err();
        assert!(matches!(err, EvalError::Redefinition { .. }));
    }

    #[test]
    fn cond_picks_first_truthy_clause() {
        let mut ev = Evaluator::new();
        let result = eval_source(
            &mut ev,
            "(cond ((= 1 2) \"a\") ((= 1 1) \"b\") (else \"c\"))",
        )
        .unwrap();
        assert_eq!(result.to_string(), "b");
    }

    #[test]
    fn cons_car_cdr_round_trip() {
        let mut ev = Evaluator::new();
        let result = eval_source(&mut ev, "(car (cdr (cons 1 (cons 2 '()))))").unwrap();
        assert_eq!(result, Value::Integer(2));
    }

    #[test]
    fn car_of_empty_list_is_a_range_error() {
        let mut ev = Evaluator::new();
        let err = eval_source(&mut ev, "(car '())").unwrap_err();
        assert!(matches!(err, EvalError::Range { .. }));
    }

    #[test]
    fn map_and_filter_are_ordinary_defined_functions() {
        let mut ev = Evaluator::new();
        let result = eval_source(
            &mut ev,
            "(define (sq x) (* x x)) (map sq '(1 2 3 4))",
        )
        .unwrap();
        assert_eq!(result.to_string(), "(1 4 9 16)");

        let result = eval_source(
            &mut ev,
            "(define (odd? x) (= (mod x 2) 1)) (filter odd? '(1 2 3 4 5))",
        )
        .unwrap();
        assert_eq!(result.to_string(), "(1 3 5)");
    }

    #[test]
    fn environment_depth_is_restored_after_an_error() {
        let mut ev = Evaluator::new();
        let before = ev.env().depth();
        let _ = eval_source(&mut ev, "(define (boom) (car '())) (boom)");
        assert_eq!(ev.env().depth(), before);
    }
}
