//! Session Engine Module
//!
//! Evaluation backends for the session loop.

pub mod context;
pub mod evaluator;
pub mod remote;

pub use context::EnvironmentManager;
pub use evaluator::{evaluate_source, Evaluation, ExecutionStats, LocalBackend, StageError, MAX_RESULT_DEPTH};
pub use remote::RemoteBackend;
