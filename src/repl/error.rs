//! Transport and protocol errors

use std::io;
use std::time::Duration;

/// Errors raised while setting up or running the transport layer
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("address {0} is already in use")]
    AddressInUse(String),

    #[error("no in-process server named '{0}'")]
    NoSuchServer(String),

    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("{0} transport is not supported on this platform")]
    Unsupported(&'static str),

    #[error("handshake failed: {0}")]
    Handshake(#[source] ProtocolError),
}

/// Errors raised by a single request/response exchange
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The server evaluated the request and reported a failure
    #[error("{0}")]
    Remote(String),
}

impl ProtocolError {
    /// Whether the connection itself is at fault, as opposed to the code sent over it
    pub fn is_transport(&self) -> bool {
        !matches!(self, ProtocolError::Remote(_))
    }
}
