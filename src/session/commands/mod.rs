//! Session Commands
//!
//! Recognizes the REPL meta-commands. Anything else is source text.

/// REPL meta-command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `(quit)`, `(q)` or `(exit)`
    Quit,
    /// `(reset)`
    Reset,
    /// `(help)`
    Help,
}

impl Command {
    /// Whether the session ends after this command
    pub fn is_terminal(self) -> bool {
        matches!(self, Command::Quit)
    }
}

/// Classify one trimmed line of input. Matching is exact and case-sensitive.
pub fn classify(input: &str) -> Option<Command> {
    match input {
        "(quit)" | "(q)" | "(exit)" => Some(Command::Quit),
        "(reset)" => Some(Command::Reset),
        "(help)" => Some(Command::Help),
        _ => None,
    }
}

/// Text printed by `(help)`
pub const HELP: &str = "\
Commands:
  (quit), (q), (exit)  Exit the REPL
  (reset)              Discard all definitions
  (help)               Show this help

Special forms: quote if define lambda let begin
Example: (define square (lambda (x) (* x x)))";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert_eq!(classify("(quit)"), Some(Command::Quit));
        assert_eq!(classify("(q)"), Some(Command::Quit));
        assert_eq!(classify("(exit)"), Some(Command::Quit));
        assert_eq!(classify("(reset)"), Some(Command::Reset));
        assert_eq!(classify("(help)"), Some(Command::Help));
    }

    #[test]
    fn test_only_quit_is_terminal() {
        assert!(Command::Quit.is_terminal());
        assert!(!Command::Reset.is_terminal());
        assert!(!Command::Help.is_terminal());
    }

    #[test]
    fn test_no_partial_matches() {
        for input in ["quit", ":quit", "(QUIT)", "( quit )", "(quit now)", "(reset 1)", "(+ 1 2)", "(help"] {
            assert_eq!(classify(input), None, "{}", input);
        }
    }
}
