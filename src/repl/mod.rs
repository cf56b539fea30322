//! REPL transport layer
//!
//! Framed request/response messaging between a REPL client and a server
//! that owns the evaluation environments.

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::Client;
pub use codec::{Codec, MAX_FRAME_LEN};
pub use error::{ProtocolError, TransportError};
pub use protocol::{EvalReply, Op, Outcome, Request, Response, ResultValue};
pub use server::{Evaluator, EvaluatorFactory, Server, ServerConfig};
pub use transport::{Endpoint, TransportKind};
