//! Reader
//!
//! Builds an expression tree from the token stream produced by
//! [`crate::lang::lexer::tokenize`].

use std::fmt;

use crate::lang::interpreter::MAX_EVAL_DEPTH;
use crate::lang::lexer::{Position, Token, TokenKind};
use crate::lang::value::Number;

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Number(Number),
    Str(String),
    Symbol(String),
    List(Vec<Expr>),
}

impl Expr {
    /// Symbol name, if this is a symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Expr::Nil => write!(f, "nil"),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Symbol(s) => write!(f, "{}", s),
            Expr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,

    #[error("unexpected end of input, expected ')' to close list opened at {0}")]
    UnclosedList(Position),

    #[error("unexpected end of input after quote at {0}")]
    DanglingQuote(Position),

    #[error("unexpected {found} at {position}")]
    UnexpectedToken { found: TokenKind, position: Position },

    #[error("expression nested deeper than {limit} levels at {position}")]
    TooDeep { limit: usize, position: Position },
}

/// Read exactly one expression from `tokens`
///
/// Tokens left over after the first complete expression are an error, so one
/// input line always maps to one evaluation.
pub fn read(tokens: &[Token]) -> Result<Expr, ParseError> {
    let mut reader = Reader {
        tokens,
        pos: 0,
        depth: 0,
    };
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let expr = reader.read_expr()?;
    if let Some(extra) = reader.peek() {
        return Err(ParseError::UnexpectedToken {
            found: extra.kind.clone(),
            position: extra.position,
        });
    }
    Ok(expr)
}

struct Reader<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Open lists and quotes around the current token
    depth: usize,
}

impl<'t> Reader<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn read_expr(&mut self) -> Result<Expr, ParseError> {
        let token = self.next().ok_or(ParseError::Empty)?;

        match &token.kind {
            TokenKind::LParen => self.nested(token.position, |reader| reader.read_list(token.position)),
            TokenKind::RParen => Err(ParseError::UnexpectedToken {
                found: TokenKind::RParen,
                position: token.position,
            }),
            TokenKind::Quote => {
                if self.peek().is_none() {
                    return Err(ParseError::DanglingQuote(token.position));
                }
                let quoted = self.nested(token.position, Reader::read_expr)?;
                Ok(Expr::List(vec![Expr::Symbol("quote".into()), quoted]))
            }
            TokenKind::Int(i) => Ok(Expr::Number(Number::Int(*i))),
            TokenKind::Float(x) => Ok(Expr::Number(Number::Float(*x))),
            TokenKind::Str(s) => Ok(Expr::Str(s.clone())),
            TokenKind::Bool(b) => Ok(Expr::Bool(*b)),
            TokenKind::Symbol(s) if s == "nil" => Ok(Expr::Nil),
            TokenKind::Symbol(s) => Ok(Expr::Symbol(s.clone())),
        }
    }

    /// Run `read` one nesting level deeper
    fn nested(
        &mut self,
        position: Position,
        read: impl FnOnce(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(ParseError::TooDeep {
                limit: MAX_EVAL_DEPTH,
                position,
            });
        }
        self.depth += 1;
        let expr = read(self);
        self.depth -= 1;
        expr
    }

    fn read_list(
        &mut self,
        open: Position,
    ) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedList(open)),
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => {
                    self.pos += 1;
                    return Ok(Expr::List(items));
                }
                Some(_) => items.push(self.read_expr()?),
            }
        }
    }
}
