//! Session loop integration tests
//!
//! Drives the loop with scripted input against the in-process backend.

use std::collections::VecDeque;
use std::io;

use tokio_util::sync::CancellationToken;
use zylisp::repl::EvalReply;
use zylisp::session::{
    BackendError, EvalBackend, LineConfig, LineSource, LocalBackend, ReadOutcome, SessionLoop,
    SymbolInfo,
};

/// Line source that replays fixed input
#[derive(Default)]
pub struct Script {
    lines: VecDeque<ReadOutcome>,
    pub prompts: Vec<String>,
    pub history: Vec<String>,
    pub saved: bool,
    pub symbols: Vec<SymbolInfo>,
}

impl Script {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| ReadOutcome::Line(l.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn then(
        mut self,
        outcome: ReadOutcome,
    ) -> Self {
        self.lines.push_back(outcome);
        self
    }
}

impl LineSource for Script {
    fn read_line(
        &mut self,
        prompt: &str,
    ) -> io::Result<ReadOutcome> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front().unwrap_or(ReadOutcome::Eof))
    }

    fn add_history(
        &mut self,
        entry: &str,
    ) {
        self.history.push(entry.to_string());
    }

    fn save_history(&mut self) {
        self.saved = true;
    }

    fn set_symbols(
        &mut self,
        symbols: Vec<SymbolInfo>,
    ) {
        self.symbols = symbols;
    }
}

pub fn quiet() -> LineConfig {
    LineConfig {
        banner: false,
        colors: false,
        ..LineConfig::default()
    }
}

pub fn run_script<B: EvalBackend>(
    backend: B,
    script: Script,
    token: CancellationToken,
) -> (Vec<String>, B, Script) {
    let mut session = SessionLoop::new(quiet(), backend, script, Vec::new(), token);
    session.run().unwrap();
    let (backend, script, out) = session.into_parts();
    let text = String::from_utf8(out).unwrap();
    (text.lines().map(str::to_string).collect(), backend, script)
}

/// Local backend that counts what reaches it
#[derive(Default)]
struct Counting {
    inner: LocalBackend,
    evals: usize,
    resets: usize,
}

impl EvalBackend for Counting {
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, BackendError> {
        self.evals += 1;
        self.inner.eval(code)
    }

    fn reset(&mut self) -> Result<(), BackendError> {
        self.resets += 1;
        self.inner.reset()
    }

    fn symbols(&self) -> Vec<SymbolInfo> {
        self.inner.symbols()
    }

    fn describe(&self) -> String {
        "counting".into()
    }
}

#[test]
fn test_define_and_apply() {
    let script = Script::new(&[
        "(define x 10)",
        "x",
        "(define add (lambda (a b) (+ a b)))",
        "(add x 20)",
        "(quit)",
    ]);
    let (out, _, script) = run_script(LocalBackend::new(), script, CancellationToken::new());
    assert_eq!(out, vec!["10", "10", "<function>", "30", "Goodbye!"]);
    assert!(script.saved);
    assert_eq!(script.history.len(), 5);
    assert!(script.symbols.iter().any(|s| s.name == "add" && s.kind == "function"));
}

#[test]
fn test_multiline_factorial() {
    let script = Script::new(&[
        "(define factorial",
        "  (lambda (n)",
        "    (if (= n 0) 1 (* n (factorial (- n 1))))))",
        "(factorial 5)",
        "(factorial 0)",
    ]);
    let (out, _, script) = run_script(LocalBackend::new(), script, CancellationToken::new());
    assert_eq!(out, vec!["<function>", "120", "1"]);
    assert_eq!(&script.prompts[..3], &["> ", "... ", "... "]);
    assert_eq!(
        script.history[0],
        "(define factorial\n  (lambda (n)\n    (if (= n 0) 1 (* n (factorial (- n 1))))))"
    );
}

#[test]
fn test_reset_clears_bindings() {
    let script = Script::new(&["(define x 1)", "(reset)", "x", "(+ 1 2)"]);
    let (out, backend, _) = run_script(Counting::default(), script, CancellationToken::new());
    assert_eq!(
        out,
        vec![
            "1",
            "Environment reset",
            "Error: eval error: unbound symbol: x",
            "3"
        ]
    );
    assert_eq!(backend.resets, 1);
    assert_eq!(backend.evals, 3);
}

#[test]
fn test_commands_never_reach_the_backend() {
    let script = Script::new(&["(help)", "(q)", "(+ 1 2)"]);
    let (out, backend, script) = run_script(Counting::default(), script, CancellationToken::new());
    assert_eq!(backend.evals, 0);
    assert_eq!(out.last().map(String::as_str), Some("Goodbye!"));
    assert!(out.iter().any(|line| line.contains("(reset)")));
    // nothing is read after quit
    assert_eq!(script.prompts.len(), 2);
}

#[test]
fn test_errors_do_not_end_the_session() {
    let script = Script::new(&["(car 1)", "\"open", "(1 2", ")", "(undefined-fn 3)", "\"ok\""]);
    let (out, _, _) = run_script(LocalBackend::new(), script, CancellationToken::new());
    assert_eq!(out.len(), 5);
    assert!(out[0].starts_with("Error: eval error: "));
    assert!(out[1].starts_with("Error: tokenize error: "));
    assert!(out[2].starts_with("Error: eval error: not a function"));
    assert_eq!(out[3], "Error: eval error: unbound symbol: undefined-fn");
    assert_eq!(out[4], "\"ok\"");
}

#[test]
fn test_failed_input_keeps_previous_state() {
    let script = Script::new(&["(define x 1)", "(begin (define x 99) (car 1))", "x"]);
    let (out, _, _) = run_script(LocalBackend::new(), script, CancellationToken::new());
    assert_eq!(out[2], "1");
}

#[test]
fn test_printed_output_comes_first() {
    let script = Script::new(&["(begin (print \"hello\" 42) (list 1 2.0 \"s\"))"]);
    let (out, _, _) = run_script(LocalBackend::new(), script, CancellationToken::new());
    assert_eq!(out, vec!["hello 42", "(1 2.0 \"s\")"]);
}

#[test]
fn test_blank_lines_are_skipped() {
    let script = Script::new(&["", "   ", "nil"]);
    let (out, backend, script) = run_script(Counting::default(), script, CancellationToken::new());
    assert_eq!(out, vec!["nil"]);
    assert_eq!(backend.evals, 1);
    assert_eq!(script.history, vec!["nil"]);
}

#[test]
fn test_eof_ends_quietly() {
    let (out, _, script) = run_script(LocalBackend::new(), Script::new(&[]), CancellationToken::new());
    assert!(out.is_empty());
    assert!(script.saved);
}

#[test]
fn test_eof_inside_expression_discards_it() {
    let script = Script::new(&["(define y"]);
    let (out, backend, _) = run_script(Counting::default(), script, CancellationToken::new());
    assert!(out.is_empty());
    assert_eq!(backend.evals, 0);
}

#[test]
fn test_interrupt_cancels_the_session() {
    let token = CancellationToken::new();
    let script = Script::new(&["1"]).then(ReadOutcome::Interrupted).then(ReadOutcome::Line("2".into()));
    let (out, _, script) = run_script(LocalBackend::new(), script, token.clone());
    assert_eq!(out, vec!["1"]);
    assert!(token.is_cancelled());
    assert!(script.saved);
}

#[test]
fn test_cancelled_before_start_reads_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let (out, _, script) = run_script(LocalBackend::new(), Script::new(&["1"]), token);
    assert!(out.is_empty());
    assert!(script.prompts.is_empty());
}

#[test]
fn test_banner() {
    let config = LineConfig {
        banner: true,
        ..LineConfig::default()
    };
    let mut session = SessionLoop::new(
        config,
        LocalBackend::new(),
        Script::new(&["(exit)"]),
        Vec::new(),
        CancellationToken::new(),
    );
    session.run().unwrap();
    let (_, _, out) = session.into_parts();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with(&format!("{} v{} (local)", zylisp::NAME, zylisp::VERSION)));
    assert!(text.ends_with("Goodbye!\n"));
}
