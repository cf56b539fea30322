//! Wire messages
//!
//! A client sends [`Request`]s and the server answers each with exactly one
//! [`Response`] carrying the same id. Requests on one connection are handled
//! in order.

use serde::{Deserialize, Serialize};

use crate::lang::Number;

/// Displayable result of an evaluation, as carried over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultValue {
    Nil,
    Boolean(bool),
    Number(Number),
    String(String),
    List(Vec<ResultValue>),
    Function,
    /// Anything else, already rendered (symbols, for instance)
    Other(String),
}

/// Successful evaluation: value plus anything printed while computing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReply {
    pub value: ResultValue,
    #[serde(default)]
    pub output: String,
}

/// Request operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Evaluate source text in the connection's environment
    Eval { code: String },
    /// Replace the connection's environment with a fresh one
    Reset,
    /// Ask the server who it is; used as the connect handshake
    Describe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub op: Op,
}

/// Response outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Value(EvalReply),
    /// The evaluator rejected the input; the connection is still fine
    Error { message: String },
    Reset,
    Described { server: String, version: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub outcome: Outcome,
}

/// Just the id of a [`Response`], for routing one whose outcome does not decode
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseId {
    pub id: u64,
}
