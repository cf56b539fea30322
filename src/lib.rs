//! Zylisp
//!
//! An interactive REPL for a small Lisp, running fully local, as an
//! evaluation server, or as a client of one.
//!
//! # Example
//!
//! ```
//! use zylisp::session::{EvalBackend, LocalBackend};
//! use zylisp::session::format_value;
//!
//! let mut backend = LocalBackend::new();
//! backend.eval("(define square (lambda (x) (* x x)))").unwrap();
//! let reply = backend.eval("(square 12)").unwrap();
//! assert_eq!(format_value(&reply.value), "144");
//! ```

#![warn(rust_2018_idioms)]

pub mod lang;
pub mod repl;
pub mod session;
pub mod util;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "Zylisp";
