//! Lexer module
//!
//! Turns source text into a flat token stream. Comments run from `;` to the
//! end of the line.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Source position (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LParen,
    RParen,
    /// `'` reader shorthand for `(quote ...)`
    Quote,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Symbol(String),
}

impl fmt::Display for TokenKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Int(i) => write!(f, "{}", i),
            TokenKind::Float(x) => write!(f, "{}", x),
            TokenKind::Str(s) => write!(f, "{:?}", s),
            TokenKind::Bool(b) => write!(f, "{}", b),
            TokenKind::Symbol(s) => write!(f, "{}", s),
        }
    }
}

/// A token with its starting position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

/// Lexer error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: Position },
    #[error("invalid escape sequence '\\{sequence}' at {position}")]
    InvalidEscape { sequence: char, position: Position },
    #[error("invalid number literal '{literal}' at {position}")]
    InvalidNumber { literal: String, position: Position },
}

/// Tokenize source code
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    Ok(tokens)
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == ';' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace_and_comments();

        let position = self.position();
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };

        let kind = match c {
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '\'' => {
                self.advance();
                TokenKind::Quote
            }
            '"' => self.read_string(position)?,
            _ => self.read_atom(position)?,
        };

        Ok(Some(Token { kind, position }))
    }

    fn read_string(
        &mut self,
        start: Position,
    ) -> Result<TokenKind, LexError> {
        // opening quote
        self.advance();
        let mut value = String::new();

        loop {
            let escape_pos = self.position();
            match self.advance() {
                None => return Err(LexError::UnterminatedString { position: start }),
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        return Err(LexError::InvalidEscape {
                            sequence: other,
                            position: escape_pos,
                        })
                    }
                    None => return Err(LexError::UnterminatedString { position: start }),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn read_atom(
        &mut self,
        start: Position,
    ) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"' | ';') {
                break;
            }
            text.push(c);
            self.advance();
        }

        match text.as_str() {
            "true" => return Ok(TokenKind::Bool(true)),
            "false" => return Ok(TokenKind::Bool(false)),
            _ => {}
        }

        if !looks_numeric(&text) {
            return Ok(TokenKind::Symbol(text));
        }

        if let Ok(i) = text.parse::<i64>() {
            return Ok(TokenKind::Int(i));
        }
        if text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
            if let Ok(x) = text.parse::<f64>() {
                return Ok(TokenKind::Float(x));
            }
        }

        Err(LexError::InvalidNumber {
            literal: text,
            position: start,
        })
    }
}

/// `42`, `-7`, `+3`, `.5`, `-.5` start a number; `-`, `+`, `...` stay symbols.
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    let first = chars.next();
    let second = chars.next();
    let third = chars.next();
    match (first, second, third) {
        (Some(c), _, _) if c.is_ascii_digit() => true,
        (Some('+' | '-'), Some(c), _) if c.is_ascii_digit() => true,
        (Some('.'), Some(c), _) if c.is_ascii_digit() => true,
        (Some('+' | '-'), Some('.'), Some(c)) if c.is_ascii_digit() => true,
        _ => false,
    }
}
