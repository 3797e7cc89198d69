use std::fmt;

use super::ast::*;
use super::lexer::Token;
use super::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    location: Span,
    info: ParseErrorInfo,
}

impl ParseError {
    pub fn new(location: Span, info: ParseErrorInfo) -> Self {
        Self { location, info }
    }

    pub fn location(&self) -> Span {
        self.location
    }

    pub fn info(&self) -> &ParseErrorInfo {
        &self.info
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorInfo {
    InvalidInt(std::num::ParseIntError),
    InvalidFloat(std::num::ParseFloatError),
    InvalidBoolean,
    /// For example, an invalid escape sequence or a missing closing quote.
    InvalidString,
    UnterminatedString,
    Unrecognized,
    Unexpected {
        /// One of these tokens was expected
        expected: Vec<Token>,
        /// But this was the actual next token
        actual: Token,
    },
    /// The end of the input was reached, but the parser was expecting more.
    EOF,
}

impl fmt::Display for ParseErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorInfo::InvalidInt(err) => write!(f, "invalid integer literal: {}", err),
            ParseErrorInfo::InvalidFloat(err) => write!(f, "invalid float literal: {}", err),
            ParseErrorInfo::InvalidBoolean => write!(f, "invalid boolean literal, expected #t or #f"),
            ParseErrorInfo::InvalidString => write!(f, "invalid string literal"),
            ParseErrorInfo::UnterminatedString => write!(f, "unterminated string literal"),
            ParseErrorInfo::Unrecognized => write!(f, "unrecognized character"),
            ParseErrorInfo::Unexpected { expected, actual } => write!(
                f,
                "expected one of {:?}, but got {:?}",
                &expected[..],
                actual
            ),
            ParseErrorInfo::EOF => write!(f, "end of file reached"),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parses a whole document, accumulating every syntax error it finds instead
/// of stopping at the first one. The caller inspects `errors()` after parsing
/// completes; per the driver contract, a non-empty error list means the tree
/// must not be handed to the evaluator.
pub struct Parser<'a> {
    tokens: &'a [(Span, Token)],
    source: &'a str,
    current_token: usize,
    errors: Vec<ParseError>,
    // Count of `(` consumed to start a list/quoted-list that have not yet
    // seen their matching `)`. Only decremented on the successful-close
    // path, so an error bubbling out via `?` partway through a nested form
    // leaves this at the enclosing depth for `resync` to pick up.
    nesting: i32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: &'a [(Span, Token)]) -> Self {
        Self {
            tokens,
            source,
            current_token: 0,
            errors: Vec::new(),
            nesting: 0,
        }
    }

    /// Parse a document consisting of zero or more symbolic expressions.
    /// Never fails outright; instead, malformed top-level expressions are
    /// skipped and recorded in `errors()` so that the caller can report a
    /// total syntax-error count.
    pub fn parse(&mut self) -> Vec<SymExpSrc> {
        let mut out = Vec::new();
        while self.peek_token().is_some() {
            match self.parse_exp() {
                Ok(sym) => out.push(sym),
                Err(err) => {
                    self.errors.push(err);
                    self.resync();
                }
            }
        }
        out
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Skip tokens until we're at a position where resuming top-level parsing
    /// is plausible: right after a balancing `)`, or at end of input.
    fn resync(&mut self) {
        // Start from however many enclosing `(` were already open when the
        // error hit, not 0, or we stop at the first `)` meant to close one
        // of those rather than the one that closes the abandoned top-level
        // form. The failed subtree is being discarded entirely, so reset.
        let mut depth = self.nesting;
        self.nesting = 0;
        loop {
            match self.peek_token() {
                None => return,
                Some((_, Token::ParenOpen)) => {
                    depth += 1;
                    self.pop_token();
                }
                Some((_, Token::ParenClose)) => {
                    self.pop_token();
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.pop_token();
                }
            }
        }
    }

    // Parser for expressions

    fn parse_exp(&mut self) -> ParseResult<SymExpSrc> {
        let (span, token) = self.parse_token()?;
        match token {
            Token::ParenOpen => {
                self.nesting += 1;
                let mut list = Vec::new();
                while !self.is_terminated(Token::ParenClose) {
                    list.push(self.parse_exp()?);
                }
                let end = self.expect_token(Token::ParenClose)?;
                self.nesting -= 1;
                let list_span = Span {
                    begin: span.begin,
                    end: end.end,
                };
                Ok(SymExpSrc {
                    src: list_span,
                    exp: SymExp::List(list),
                })
            }
            Token::Quote => {
                let inner = self.expect_token(Token::ParenOpen)?;
                self.nesting += 1;
                let mut list = Vec::new();
                while !self.is_terminated(Token::ParenClose) {
                    list.push(self.parse_literal()?);
                }
                let end = self.expect_token(Token::ParenClose)?;
                self.nesting -= 1;
                let list_span = Span {
                    begin: span.begin,
                    end: end.end,
                };
                let _ = inner;
                Ok(SymExpSrc {
                    src: list_span,
                    exp: SymExp::Quoted(list),
                })
            }
            Token::Int => {
                let i = self.parse_int(span)?;
                Ok(SymExpSrc {
                    src: span,
                    exp: SymExp::Int(i),
                })
            }
            Token::Float => {
                let f = self.parse_float(span)?;
                Ok(SymExpSrc {
                    src: span,
                    exp: SymExp::Float(f),
                })
            }
            Token::Boolean => {
                let b = self.parse_boolean(span)?;
                Ok(SymExpSrc {
                    src: span,
                    exp: SymExp::Boolean(b),
                })
            }
            Token::String => {
                let s = self.parse_string(span)?;
                Ok(SymExpSrc {
                    src: span,
                    exp: SymExp::Str(s),
                })
            }
            Token::Ident => {
                let ident = self.get_span(span);
                Ok(SymExpSrc {
                    src: span,
                    exp: SymExp::Variable(Ident(ident.to_owned())),
                })
            }
            Token::ErrUnrecognized => Err(ParseError::new(span, ParseErrorInfo::Unrecognized)),
            Token::ErrUnterminatedString => {
                Err(ParseError::new(span, ParseErrorInfo::UnterminatedString))
            }
            Token::ErrInvalidBoolean => Err(ParseError::new(span, ParseErrorInfo::InvalidBoolean)),
            _ => Err(ParseError::new(
                span,
                ParseErrorInfo::Unexpected {
                    expected: vec![
                        Token::ParenOpen,
                        Token::Quote,
                        Token::Int,
                        Token::Float,
                        Token::Boolean,
                        Token::String,
                        Token::Ident,
                    ],
                    actual: token,
                },
            )),
        }
    }

    /// Parse one element inside a quoted list literal. Nested lists are
    /// themselves read as literal lists, without requiring their own `'`.
    fn parse_literal(&mut self) -> ParseResult<SymExpSrc> {
        let (span, token) = self.parse_token()?;
        match token {
            Token::ParenOpen => {
                self.nesting += 1;
                let mut list = Vec::new();
                while !self.is_terminated(Token::ParenClose) {
                    list.push(self.parse_literal()?);
                }
                let end = self.expect_token(Token::ParenClose)?;
                self.nesting -= 1;
                Ok(SymExpSrc {
                    src: Span {
                        begin: span.begin,
                        end: end.end,
                    },
                    exp: SymExp::Quoted(list),
                })
            }
            Token::Int => Ok(SymExpSrc {
                src: span,
                exp: SymExp::Int(self.parse_int(span)?),
            }),
            Token::Float => Ok(SymExpSrc {
                src: span,
                exp: SymExp::Float(self.parse_float(span)?),
            }),
            Token::Boolean => Ok(SymExpSrc {
                src: span,
                exp: SymExp::Boolean(self.parse_boolean(span)?),
            }),
            Token::String => Ok(SymExpSrc {
                src: span,
                exp: SymExp::Str(self.parse_string(span)?),
            }),
            Token::Ident => Ok(SymExpSrc {
                src: span,
                exp: SymExp::Variable(Ident(self.get_span(span).to_owned())),
            }),
            _ => Err(ParseError::new(
                span,
                ParseErrorInfo::Unexpected {
                    expected: vec![
                        Token::ParenOpen,
                        Token::Int,
                        Token::Float,
                        Token::Boolean,
                        Token::String,
                        Token::Ident,
                    ],
                    actual: token,
                },
            )),
        }
    }

    // Parsers for turning single tokens into values

    fn parse_int(&self, span: Span) -> ParseResult<i64> {
        let s = self.get_span(span);
        s.parse()
            .map_err(|error| ParseError::new(span, ParseErrorInfo::InvalidInt(error)))
    }

    fn parse_float(&self, span: Span) -> ParseResult<f64> {
        let s = self.get_span(span);
        s.parse()
            .map_err(|error| ParseError::new(span, ParseErrorInfo::InvalidFloat(error)))
    }

    fn parse_boolean(&self, span: Span) -> ParseResult<bool> {
        match self.get_span(span) {
            "#t" => Ok(true),
            "#f" => Ok(false),
            _ => Err(ParseError::new(span, ParseErrorInfo::InvalidBoolean)),
        }
    }

    fn parse_string(&self, span: Span) -> ParseResult<String> {
        let s = self.get_span(span);
        let mut chars = s.char_indices();

        if chars.next().map(|(_, ch)| ch) != Some('"') {
            return Err(ParseError::new(span, ParseErrorInfo::InvalidString));
        }

        let mut out = String::new();
        let mut escaped = false;
        let mut terminated = false;

        for (_pos, ch) in chars {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
                continue;
            } else if ch == '"' {
                terminated = true;
                break;
            }
            out.push(ch);
        }

        if !terminated {
            return Err(ParseError::new(span, ParseErrorInfo::InvalidString));
        }

        Ok(out)
    }

    // Manipulating/Inspecting the token stream

    fn pop_token(&mut self) -> Option<(Span, Token)> {
        if self.current_token < self.tokens.len() {
            let tok = self.tokens[self.current_token];
            self.current_token += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn peek_token(&self) -> Option<(Span, Token)> {
        self.tokens.get(self.current_token).copied()
    }

    fn get_span(&self, span: Span) -> &'a str {
        &self.source[span.begin..span.end]
    }

    fn parse_token(&mut self) -> ParseResult<(Span, Token)> {
        self.pop_token().ok_or_else(|| {
            ParseError::new(
                Span {
                    begin: self.source.len(),
                    end: self.source.len(),
                },
                ParseErrorInfo::EOF,
            )
        })
    }

    fn expect_token(&mut self, expected: Token) -> ParseResult<Span> {
        if let Some((span, token)) = self.pop_token() {
            if token == expected {
                Ok(span)
            } else {
                Err(ParseError::new(
                    span,
                    ParseErrorInfo::Unexpected {
                        expected: vec![expected],
                        actual: token,
                    },
                ))
            }
        } else {
            Err(self.eof_error())
        }
    }

    fn eof_error(&self) -> ParseError {
        ParseError::new(
            Span {
                begin: self.source.len(),
                end: self.source.len(),
            },
            ParseErrorInfo::EOF,
        )
    }

    /// Check if the next token is the expected terminator or EOF.
    fn is_terminated(&self, terminator: Token) -> bool {
        if let Some((_, token)) = self.peek_token() {
            token == terminator
        } else {
            true
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang::lexer::Lexer;

    fn parse(source: &str) -> (Vec<SymExpSrc>, Vec<ParseError>) {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next_token() {
            tokens.push(tok);
        }
        let mut parser = Parser::new(source, &tokens);
        let forms = parser.parse();
        (forms, parser.errors().to_vec())
    }

    #[test]
    fn resync_after_a_nested_error_does_not_fabricate_a_form() {
        // `@` is unrecognized inside `(bar @)`, nested two levels deep under
        // the top-level `(foo ...)`. resync() must unwind past both of the
        // enclosing `)` that belong to the abandoned form, landing cleanly
        // on `(baz)` as the next (and only other) top-level form, rather
        // than stopping at the first `)` and leaving `(baz)` to be
        // misparsed as a spurious second top-level form.
        let (forms, errors) = parse("(foo (bar @) (baz))");
        assert_eq!(errors.len(), 1);
        assert!(forms.is_empty());
    }

    #[test]
    fn resync_recovers_a_sibling_top_level_form() {
        let (forms, errors) = parse("(foo (bar @) (baz)) (ok)");
        assert_eq!(errors.len(), 1);
        assert_eq!(forms.len(), 1);
    }
}
