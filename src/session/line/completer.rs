//! Session Completer
//!
//! Completes special forms, primitive names and the user's own global
//! bindings.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::lang::{PRIMITIVE_NAMES, SPECIAL_FORMS};
use crate::session::backend_trait::SymbolInfo;

/// Rustyline helper for the session editor
#[derive(Debug, Default)]
pub struct ReplCompleter {
    /// User bindings, refreshed after every evaluation
    symbols: Vec<SymbolInfo>,
}

impl ReplCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_symbols(
        &mut self,
        symbols: Vec<SymbolInfo>,
    ) {
        self.symbols = symbols;
    }

    /// Start of the symbol under the cursor and the candidates for it
    pub fn candidates(
        &self,
        line: &str,
        pos: usize,
    ) -> (usize, Vec<Pair>) {
        let before = &line[..pos];
        let start = before
            .rfind(|c: char| !is_symbol_char(c))
            .map(|i| i + before[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let word = &before[start..];
        if word.is_empty() {
            return (start, Vec::new());
        }

        let mut candidates: Vec<Pair> = Vec::new();
        for sym in &self.symbols {
            if sym.name.starts_with(word) {
                candidates.push(Pair {
                    display: sym.to_string(),
                    replacement: sym.name.clone(),
                });
            }
        }
        for name in SPECIAL_FORMS.iter().chain(PRIMITIVE_NAMES) {
            if name.starts_with(word) {
                candidates.push(Pair {
                    display: name.to_string(),
                    replacement: name.to_string(),
                });
            }
        }

        candidates.sort_by(|a, b| a.replacement.cmp(&b.replacement));
        candidates.dedup_by(|a, b| a.replacement == b.replacement);
        (start, candidates)
    }
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '\'' | '"' | ';')
}

impl Completer for ReplCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for ReplCompleter {
    type Hint = String;
}

impl Highlighter for ReplCompleter {}

impl Validator for ReplCompleter {}

impl Helper for ReplCompleter {}
