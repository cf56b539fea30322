//! Session Module
//!
//! The interactive side of Zylisp.
//!
//! This module contains:
//! - [`backend_trait::EvalBackend`] - Evaluation interface used by the loop
//! - [`engine::LocalBackend`] / [`engine::RemoteBackend`] - In-process and server-backed evaluation
//! - [`engine::EnvironmentManager`] - Owner of the global environment
//! - [`line::SessionLoop`] - Read, classify, evaluate, print
//! - [`commands`] - `(quit)`, `(reset)`, `(help)`
//! - [`format`] - Result rendering
//! - [`dispatch`] - Local, server or client mode

pub mod backend_trait;
pub mod commands;
pub mod dispatch;
pub mod engine;
pub mod format;
pub mod line;

pub use backend_trait::{BackendError, EvalBackend, SymbolInfo};
pub use commands::{classify, Command};
pub use dispatch::{run, run_session, DispatchError};
pub use engine::{EnvironmentManager, LocalBackend, RemoteBackend, StageError};
pub use format::format_value;
pub use line::{LineConfig, LineSource, ReadOutcome, ReadlineSource, SessionLoop};
