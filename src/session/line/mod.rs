//! Line-based session loop
//!
//! Reads a unit of input (possibly spanning several lines), handles REPL
//! commands itself and sends everything else to the backend.

use std::io::{self, Write};
use std::path::PathBuf;

use owo_colors::OwoColorize;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, EditMode, Editor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::backend_trait::{BackendError, EvalBackend, SymbolInfo};
use crate::session::commands::{classify, Command, HELP};
use crate::session::format::format_value;

mod completer;
pub use completer::ReplCompleter;

/// Session loop settings
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub prompt: String,
    /// Prompt while an expression is still open
    pub continuation_prompt: String,
    pub history_file: Option<PathBuf>,
    pub history_size: usize,
    pub banner: bool,
    pub colors: bool,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            prompt: "> ".into(),
            continuation_prompt: "... ".into(),
            history_file: None,
            history_size: 1000,
            banner: true,
            colors: false,
        }
    }
}

/// Result of asking for one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    /// Ctrl-D or end of input
    Eof,
}

/// Where the session loop gets its input
pub trait LineSource {
    fn read_line(
        &mut self,
        prompt: &str,
    ) -> io::Result<ReadOutcome>;

    fn add_history(
        &mut self,
        _entry: &str,
    ) {
    }

    /// Persist history at the end of the session
    fn save_history(&mut self) {}

    /// Update the completion candidates for user bindings
    fn set_symbols(
        &mut self,
        _symbols: Vec<SymbolInfo>,
    ) {
    }
}

/// Line source backed by a rustyline editor
pub struct ReadlineSource {
    editor: Editor<ReplCompleter, FileHistory>,
    history_file: Option<PathBuf>,
}

impl ReadlineSource {
    pub fn new(config: &LineConfig) -> Result<Self, ReadlineError> {
        let rl_config = Config::builder()
            .max_history_size(config.history_size)?
            .history_ignore_space(true)
            .history_ignore_dups(true)?
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ReplCompleter::new()));

        if let Some(ref history_file) = config.history_file {
            if history_file.exists() {
                if let Err(e) = editor.load_history(history_file) {
                    warn!(path = %history_file.display(), error = %e, "could not load history");
                }
            }
        }

        Ok(Self {
            editor,
            history_file: config.history_file.clone(),
        })
    }
}

impl LineSource for ReadlineSource {
    fn read_line(
        &mut self,
        prompt: &str,
    ) -> io::Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }

    fn add_history(
        &mut self,
        entry: &str,
    ) {
        if let Err(e) = self.editor.add_history_entry(entry) {
            debug!(error = %e, "history entry dropped");
        }
    }

    fn save_history(&mut self) {
        let Some(ref path) = self.history_file else {
            return;
        };
        let saved = if path.exists() {
            self.editor.append_history(path)
        } else {
            self.editor.save_history(path)
        };
        if let Err(e) = saved {
            warn!(path = %path.display(), error = %e, "could not save history");
        }
    }

    fn set_symbols(
        &mut self,
        symbols: Vec<SymbolInfo>,
    ) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.set_symbols(symbols);
        }
    }
}

/// Whether `text` still has open parentheses outside string literals
/// and comments
pub fn needs_more_input(text: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;

    for c in text.chars() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => in_comment = true,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            _ => {}
        }
    }

    // an unterminated string is left for the lexer to report
    depth > 0
}

/// Interactive session: one backend, one input source, one output
pub struct SessionLoop<B: EvalBackend, S: LineSource, W: Write> {
    config: LineConfig,
    backend: B,
    source: S,
    out: W,
    token: CancellationToken,
}

impl<B: EvalBackend, S: LineSource, W: Write> SessionLoop<B, S, W> {
    pub fn new(
        config: LineConfig,
        backend: B,
        source: S,
        out: W,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            backend,
            source,
            out,
            token,
        }
    }

    /// Run until quit, end of input or cancellation
    pub fn run(&mut self) -> io::Result<()> {
        if self.config.banner {
            writeln!(
                self.out,
                "{} v{} ({})",
                crate::NAME,
                crate::VERSION,
                self.backend.describe()
            )?;
            writeln!(self.out, "Type (help) for commands, (quit) to exit.")?;
        }
        self.source.set_symbols(self.backend.symbols());

        let result = self.run_inner();
        self.source.save_history();
        self.out.flush()?;
        result
    }

    fn run_inner(&mut self) -> io::Result<()> {
        loop {
            if self.token.is_cancelled() {
                debug!("session cancelled");
                return Ok(());
            }
            let Some(input) = self.read_input()? else {
                return Ok(());
            };
            if self.token.is_cancelled() {
                return Ok(());
            }
            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            let keep_going = match classify(input) {
                Some(command) => self.run_command(command)?,
                None => self.evaluate(input)?,
            };
            self.out.flush()?;
            if !keep_going {
                return Ok(());
            }
        }
    }

    /// Read one complete unit of input. `None` ends the session.
    fn read_input(&mut self) -> io::Result<Option<String>> {
        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() {
                &self.config.prompt
            } else {
                &self.config.continuation_prompt
            };
            match self.source.read_line(prompt)? {
                ReadOutcome::Line(line) => {
                    if !buffer.is_empty() {
                        buffer.push('\n');
                    }
                    buffer.push_str(&line);
                    if !needs_more_input(&buffer) {
                        if !buffer.trim().is_empty() {
                            self.source.add_history(&buffer);
                        }
                        return Ok(Some(buffer));
                    }
                    if self.token.is_cancelled() {
                        return Ok(None);
                    }
                }
                ReadOutcome::Interrupted => {
                    self.token.cancel();
                    return Ok(None);
                }
                ReadOutcome::Eof => return Ok(None),
            }
        }
    }

    fn run_command(
        &mut self,
        command: Command,
    ) -> io::Result<bool> {
        match command {
            Command::Quit => {
                writeln!(self.out, "Goodbye!")?;
            }
            Command::Reset => match self.backend.reset() {
                Ok(()) => {
                    writeln!(self.out, "Environment reset")?;
                    self.source.set_symbols(self.backend.symbols());
                }
                Err(BackendError::Cancelled) => return Ok(false),
                Err(e) => self.report(&e)?,
            },
            Command::Help => {
                writeln!(self.out, "{}", HELP)?;
            }
        }
        Ok(!command.is_terminal())
    }

    fn evaluate(
        &mut self,
        input: &str,
    ) -> io::Result<bool> {
        match self.backend.eval(input) {
            Ok(reply) => {
                if !reply.output.is_empty() {
                    write!(self.out, "{}", reply.output)?;
                    if !reply.output.ends_with('\n') {
                        writeln!(self.out)?;
                    }
                }
                writeln!(self.out, "{}", format_value(&reply.value))?;
                self.source.set_symbols(self.backend.symbols());
            }
            Err(BackendError::Cancelled) => return Ok(false),
            Err(e) => self.report(&e)?,
        }
        Ok(true)
    }

    fn report(
        &mut self,
        error: &BackendError,
    ) -> io::Result<()> {
        let tag = if error.is_evaluation() {
            "Error:"
        } else {
            "Protocol Error:"
        };
        if self.config.colors {
            writeln!(self.out, "{} {}", tag.red().bold(), error)
        } else {
            writeln!(self.out, "{} {}", tag, error)
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_parts(self) -> (B, S, W) {
        (self.backend, self.source, self.out)
    }
}
