//! Session Evaluation Engine
//!
//! Turns source text into a value against a given environment:
//! tokenize, read, then evaluate. The first failing stage wins.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::lang::{read, tokenize, Env, EvalError, Interpreter, LexError, ParseError, Value};
use crate::repl::{self, EvalReply, ResultValue};
use crate::session::backend_trait::{BackendError, EvalBackend, SymbolInfo};
use crate::session::format::format_value;

use super::context::EnvironmentManager;

/// A failed evaluation, tagged with the stage that failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StageError {
    #[error("tokenize error: {0}")]
    Tokenize(#[from] LexError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("eval error: {0}")]
    Eval(#[from] EvalError),
}

/// Value of one successful evaluation plus whatever it printed
#[derive(Debug)]
pub struct Evaluation {
    pub value: Value,
    pub output: String,
}

/// Evaluate `source` against `env`.
///
/// On failure the environment is left exactly as it was, including any
/// `define` that ran before the failing sub-expression.
pub fn evaluate_source(
    source: &str,
    env: &Env,
) -> Result<Evaluation, StageError> {
    let tokens = tokenize(source)?;
    let expr = read(&tokens)?;
    trace!(expr = %expr, "evaluating");

    let snapshot = env.snapshot();
    let mut interpreter = Interpreter::new();
    match interpreter.eval(&expr, env) {
        Ok(value) => Ok(Evaluation {
            value,
            output: interpreter.take_output(),
        }),
        Err(e) => {
            env.restore(snapshot);
            Err(e.into())
        }
    }
}

/// Lists nested deeper than this are sent already rendered, keeping every
/// reply within the decoders' recursion limits
pub const MAX_RESULT_DEPTH: usize = 32;

impl From<&Value> for ResultValue {
    fn from(value: &Value) -> Self {
        result_value(value, MAX_RESULT_DEPTH)
    }
}

fn result_value(
    value: &Value,
    depth_left: usize,
) -> ResultValue {
    match value {
        Value::Nil => ResultValue::Nil,
        Value::Bool(b) => ResultValue::Boolean(*b),
        Value::Number(n) => ResultValue::Number(*n),
        Value::Str(s) => ResultValue::String(s.to_string()),
        Value::Symbol(name) => ResultValue::Other(name.to_string()),
        Value::List(_) if depth_left == 0 => {
            ResultValue::Other(format_value(&result_value(value, usize::MAX)))
        }
        Value::List(items) => ResultValue::List(
            items
                .iter()
                .map(|item| result_value(item, depth_left - 1))
                .collect(),
        ),
        Value::Lambda(_) | Value::Primitive(_) => ResultValue::Function,
    }
}

/// Evaluation statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionStats {
    pub eval_count: usize,
    pub total_time: Duration,
}

/// In-process backend: an [`EnvironmentManager`] driven by
/// [`evaluate_source`]. Also serves as the per-connection evaluator of a
/// server.
#[derive(Debug, Default)]
pub struct LocalBackend {
    manager: EnvironmentManager,
    stats: ExecutionStats,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(&self) -> &EnvironmentManager {
        &self.manager
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    fn evaluate(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, StageError> {
        let start = Instant::now();
        let result = evaluate_source(code, self.manager.current());
        self.stats.eval_count += 1;
        self.stats.total_time += start.elapsed();

        let evaluation = result.inspect_err(|e| debug!(error = %e, "evaluation failed"))?;
        Ok(EvalReply {
            value: ResultValue::from(&evaluation.value),
            output: evaluation.output,
        })
    }
}

impl EvalBackend for LocalBackend {
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, BackendError> {
        Ok(self.evaluate(code)?)
    }

    fn reset(&mut self) -> Result<(), BackendError> {
        self.manager.reset();
        Ok(())
    }

    fn symbols(&self) -> Vec<SymbolInfo> {
        self.manager.user_symbols()
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

impl repl::Evaluator for LocalBackend {
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, String> {
        self.evaluate(code).map_err(|e| e.to_string())
    }

    fn reset(&mut self) {
        self.manager.reset();
    }
}
