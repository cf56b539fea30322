//! Session Backend Trait
//!
//! The session loop evaluates through this interface and never learns
//! whether the environment lives in this process or on a server.

use std::fmt;

use crate::repl::{EvalReply, ProtocolError};

use super::engine::StageError;

/// Why an evaluation (or reset) did not produce a result
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Local evaluation failed in one of its stages
    #[error(transparent)]
    Stage(#[from] StageError),

    /// The server evaluated the input and reported a failure
    #[error("{0}")]
    Remote(String),

    /// The request never completed: transport failure or timeout
    #[error(transparent)]
    Protocol(ProtocolError),

    /// The session is shutting down
    #[error("cancelled")]
    Cancelled,
}

impl From<ProtocolError> for BackendError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Remote(message) => BackendError::Remote(message),
            other => BackendError::Protocol(other),
        }
    }
}

impl BackendError {
    /// Errors caused by the input rather than by the connection
    pub fn is_evaluation(&self) -> bool {
        matches!(self, BackendError::Stage(_) | BackendError::Remote(_))
    }
}

/// Symbol information for completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    /// Value kind, e.g. `number` or `function`
    pub kind: &'static str,
}

impl fmt::Display for SymbolInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.kind)
    }
}

/// Evaluation backend driven by the session loop
pub trait EvalBackend {
    /// Evaluate one unit of source text
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, BackendError>;

    /// Replace the environment with a pristine one
    fn reset(&mut self) -> Result<(), BackendError>;

    /// Global bindings currently visible, for completion
    fn symbols(&self) -> Vec<SymbolInfo>;

    /// Short description shown in the banner
    fn describe(&self) -> String;
}
