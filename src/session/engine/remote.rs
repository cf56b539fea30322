//! Remote evaluation backend
//!
//! Forwards input to a server through a [`Client`]. The session loop is
//! synchronous, so every call blocks on the runtime handle, racing the
//! request against process cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::repl::{Client, Codec, EvalReply, ProtocolError, TransportError};
use crate::session::backend_trait::{BackendError, EvalBackend, SymbolInfo};

pub struct RemoteBackend {
    client: Client,
    handle: Handle,
    token: CancellationToken,
    addr: String,
}

impl RemoteBackend {
    /// Connect to `addr`. One attempt; the caller decides what a failure means.
    pub fn connect(
        addr: &str,
        codec: Codec,
        timeout: Duration,
        handle: Handle,
        token: CancellationToken,
    ) -> Result<Self, TransportError> {
        let mut client = Client::new(codec).with_timeout(timeout);
        handle.block_on(client.connect(addr))?;
        Ok(Self {
            client,
            handle,
            token,
            addr: addr.to_string(),
        })
    }

    /// Close the connection to the server
    pub fn close(&mut self) {
        self.handle.block_on(self.client.close());
        debug!(addr = %self.addr, "disconnected");
    }

    fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ProtocolError>>,
    ) -> Result<T, BackendError> {
        self.handle.block_on(async {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(BackendError::Cancelled),
                result = request => result.map_err(BackendError::from),
            }
        })
    }
}

impl EvalBackend for RemoteBackend {
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, BackendError> {
        self.call(self.client.eval(code))
    }

    fn reset(&mut self) -> Result<(), BackendError> {
        self.call(self.client.reset())
    }

    fn symbols(&self) -> Vec<SymbolInfo> {
        Vec::new()
    }

    fn describe(&self) -> String {
        match self.client.server_info() {
            Some((name, version)) => format!("connected to {} ({} {})", self.addr, name, version),
            None => format!("connected to {}", self.addr),
        }
    }
}
