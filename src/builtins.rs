//! Installs the library functions that are defined in mini-scheme itself
//! rather than implemented as evaluator primitives.
//!
//! `map` and `filter` are ordinary `define`d functions; they are parsed from
//! fixed source text at startup the same way the evaluator parses any other
//! program, and installed into the global frame before the user's own
//! program runs.

use crate::environment::Environment;
use crate::evaluator;
use crate::lang::lexer::Lexer;
use crate::lang::parser::Parser;

const PRELUDE: &str = "
(define (map f lst)
  (if (null? lst)
      '()
      (cons (f (car lst)) (map f (cdr lst)))))

(define (filter f lst)
  (cond ((null? lst) '())
        ((f (car lst)) (cons (car lst) (filter f (cdr lst))))
        (else (filter f (cdr lst)))))
";

pub fn install(env: &mut Environment) {
    let mut lexer = Lexer::new(PRELUDE);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token() {
        tokens.push(tok);
    }
    let mut parser = Parser::new(PRELUDE, &tokens);
    let forms = parser.parse();
    debug_assert!(
        parser.errors().is_empty(),
        "built-in prelude failed to parse: {:?}",
        parser.errors()
    );
    for form in &forms {
        evaluator::eval(env, form).expect("built-in prelude must evaluate cleanly");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::evaluator::Evaluator;

    #[test]
    fn map_and_filter_are_installed_in_the_global_frame() {
        let mut env = Environment::new();
        install(&mut env);
        assert!(env.lookup("map").is_some());
        assert!(env.lookup("filter").is_some());
    }

    #[test]
    fn evaluator_new_carries_the_prelude() {
        let mut ev = Evaluator::new();
        assert!(ev.env().lookup("map").is_some());
        assert!(ev.env().lookup("filter").is_some());
    }
}
