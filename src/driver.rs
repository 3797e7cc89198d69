//! Turns source text into evaluated top-level forms, in both REPL and script
//! mode, and renders results and errors the way a user sees them.

use std::io::{self, BufRead, Write};

use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::lang::ast::SymExpSrc;
use crate::lang::lexer::Lexer;
use crate::lang::parser::Parser;
use crate::lang::span::LineMap;
use crate::value::Value;

pub const PROMPT: &str = "mini-scheme> ";

/// Lex and parse `input`, logging every syntax error found and returning
/// `None` if there were any. A program with syntax errors is never handed to
/// the evaluator.
pub fn parse_program(input_name: &str, input: &str) -> Option<Vec<SymExpSrc>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token() {
        tokens.push(tok);
    }

    let mut parser = Parser::new(input, &tokens);
    let forms = parser.parse();
    let errors = parser.errors();

    if errors.is_empty() {
        return Some(forms);
    }

    let lines = LineMap::new(input);
    for err in errors {
        let pos = lines.offset_to_pos(err.location().begin);
        log::error!("{}:{}: {}", input_name, pos, err.info());
    }
    log::error!(
        "{}",
        EvalError::Syntax {
            count: errors.len()
        }
    );
    None
}

/// Run a program in script mode: top-level results are not printed, and once
/// the whole file has been evaluated, `(main)` is invoked if defined. Returns
/// `Ok(())` only if the file parsed, every top-level form evaluated without
/// error, and `main` existed and returned without error.
pub fn run_script(input_name: &str, input: &str) -> Result<(), ()> {
    let forms = parse_program(input_name, input).ok_or(())?;

    let mut evaluator = Evaluator::new();
    for form in &forms {
        if let Err(err) = evaluator.eval(form) {
            log::error!("{}", err);
            return Err(());
        }
    }

    if evaluator.env().lookup("main").is_none() {
        log::error!("{} does not define (main)", input_name);
        return Err(());
    }

    let call_main = SymExpSrc {
        src: crate::lang::span::Span { begin: 0, end: 0 },
        exp: crate::lang::ast::SymExp::List(vec![SymExpSrc {
            src: crate::lang::span::Span { begin: 0, end: 0 },
            exp: crate::lang::ast::SymExp::Variable(crate::lang::ast::Ident("main".to_string())),
        }]),
    };
    match evaluator.eval(&call_main) {
        Ok(_) => Ok(()),
        Err(err) => {
            log::error!("{}", err);
            Err(())
        }
    }
}

/// Run the interactive REPL against the given input/output streams. Every
/// non-`Unit` top-level result is printed; errors are reported and do not
/// end the session. Returns on EOF.
pub fn run_repl<R: BufRead, W: Write>(mut input: R, mut output: W) {
    let mut evaluator = Evaluator::new();
    let mut line = String::new();

    loop {
        let _ = write!(output, "{}", PROMPT);
        let _ = output.flush();

        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(_) => break,
        }

        if line.trim().is_empty() {
            continue;
        }

        let forms = match parse_program("<stdin>", &line) {
            Some(forms) => forms,
            None => continue,
        };

        for form in &forms {
            match evaluator.eval(form) {
                Ok(Value::Unit) => {}
                Ok(value) => {
                    let _ = writeln!(output, "{}", value);
                }
                Err(err) => {
                    log::error!("{}", err);
                }
            }
        }
    }
}

pub fn run_repl_on_stdio() {
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_repl(stdin.lock(), stdout.lock());
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_program_reports_none_on_syntax_error() {
        assert!(parse_program("<test>", "(+ 1 2").is_none());
        assert!(parse_program("<test>", "(+ 1 2)").is_some());
    }

    #[test]
    fn run_script_requires_a_main_function() {
        assert!(run_script("<test>", "(define x 1)").is_err());
        assert!(run_script("<test>", "(define (main) (display 1))").is_ok());
    }

    #[test]
    fn run_script_fails_when_main_errors() {
        assert!(run_script("<test>", "(define (main) (car '()))").is_err());
    }

    #[test]
    fn repl_prints_results_and_recovers_from_errors() {
        // `(car '())` raises mid-session; the erroring line must not end the
        // REPL or stop later results from printing to `output`. The error
        // itself goes through `log`, not `output` (see run_repl's Err arm).
        let input = b"(+ 1 2)\n(car '())\n(display \"hi\")\n" as &[u8];
        let mut output = Vec::new();
        run_repl(input, &mut output);
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains('3'));
        assert!(text.contains("hi"));
    }
}
