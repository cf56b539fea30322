//! REPL client
//!
//! One connection, many in-flight requests: writes go through an async mutex
//! and a background task routes every response to the caller waiting on its
//! id. A caller that gives up (timeout) just drops its slot, so a late
//! response is discarded and the connection stays usable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::codec::{read_payload, write_frame, Codec};
use super::error::{ProtocolError, TransportError};
use super::protocol::{EvalReply, Op, Outcome, Request, Response, ResponseId};
use super::transport::{self, BoxedStream, Endpoint};

/// How long the connect handshake may take when no timeout is configured
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Waiting callers by request id; `None` once the reader has stopped
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Result<Response, ProtocolError>>>>>>;

struct Connection {
    writer: tokio::sync::Mutex<WriteHalf<BoxedStream>>,
    pending: Pending,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// REPL client
pub struct Client {
    codec: Codec,
    timeout: Option<Duration>,
    next_id: AtomicU64,
    connection: Option<Connection>,
    server: Option<(String, String)>,
}

impl Client {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            timeout: None,
            next_id: AtomicU64::new(1),
            connection: None,
            server: None,
        }
    }

    /// Bound every request by `timeout`
    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Server name and version reported during the handshake
    pub fn server_info(&self) -> Option<(&str, &str)> {
        self.server
            .as_ref()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }

    /// Connect to `addr` and perform the handshake. The transport follows
    /// from the address form.
    pub async fn connect(
        &mut self,
        addr: &str,
    ) -> Result<(), TransportError> {
        self.close().await;

        let endpoint = Endpoint::parse(addr)?;
        let stream = transport::connect(&endpoint).await?;
        let (reader, writer) = tokio::io::split(stream);
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let reader = tokio::spawn(route_responses(reader, self.codec, pending.clone()));
        self.connection = Some(Connection {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            reader,
        });

        let limit = self.timeout.unwrap_or(HANDSHAKE_TIMEOUT);
        let handshake = match self.request(Op::Describe, Some(limit)).await {
            Ok(Outcome::Described { server, version }) => Ok((server, version)),
            Ok(other) => Err(ProtocolError::UnexpectedResponse(format!("{:?}", other))),
            Err(e) => Err(e),
        };
        match handshake {
            Ok((server, version)) => {
                info!(addr = %endpoint, server = %server, version = %version, "connected");
                self.server = Some((server, version));
                Ok(())
            }
            Err(e) => {
                self.close().await;
                Err(TransportError::Handshake(e))
            }
        }
    }

    /// Evaluate `code` on the server. An evaluation failure reported by the
    /// server comes back as [`ProtocolError::Remote`].
    pub async fn eval(
        &self,
        code: &str,
    ) -> Result<EvalReply, ProtocolError> {
        let op = Op::Eval {
            code: code.to_string(),
        };
        match self.request(op, self.timeout).await? {
            Outcome::Value(reply) => Ok(reply),
            Outcome::Error { message } => Err(ProtocolError::Remote(message)),
            other => Err(ProtocolError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    /// Replace this connection's environment on the server
    pub async fn reset(&self) -> Result<(), ProtocolError> {
        match self.request(Op::Reset, self.timeout).await? {
            Outcome::Reset => Ok(()),
            other => Err(ProtocolError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    /// Close the connection. Safe to call when not connected.
    pub async fn close(&mut self) {
        self.server = None;
        if let Some(connection) = self.connection.take() {
            let mut writer = connection.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "shutdown after close");
            }
        }
    }

    async fn request(
        &self,
        op: Op,
        limit: Option<Duration>,
    ) -> Result<Outcome, ProtocolError> {
        let connection = self.connection.as_ref().ok_or(ProtocolError::NotConnected)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        match connection.pending.lock().as_mut() {
            Some(waiting) => {
                waiting.insert(id, tx);
            }
            None => return Err(ProtocolError::ConnectionClosed),
        }

        let request = Request { id, op };
        let exchange = async {
            {
                let mut writer = connection.writer.lock().await;
                write_frame(&mut *writer, self.codec, &request).await?;
            }
            rx.await.map_err(|_| ProtocolError::ConnectionClosed)?
        };
        let result = match limit {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(ProtocolError::Timeout(limit))),
            None => exchange.await,
        };

        if result.is_err() {
            if let Some(waiting) = connection.pending.lock().as_mut() {
                waiting.remove(&id);
            }
        }
        result.map(|response| response.outcome)
    }
}

async fn route_responses(
    mut reader: ReadHalf<BoxedStream>,
    codec: Codec,
    pending: Pending,
) {
    loop {
        let payload = match read_payload(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read response");
                break;
            }
        };

        // the frame was consumed whole, so a bad payload only fails its own request
        let (id, result) = match codec.decode::<Response>(&payload) {
            Ok(response) => (response.id, Ok(response)),
            Err(e) => match codec.decode::<ResponseId>(&payload) {
                Ok(header) => (header.id, Err(e)),
                Err(_) => {
                    warn!(error = %e, "dropping response without a readable id");
                    continue;
                }
            },
        };
        let slot = pending.lock().as_mut().and_then(|waiting| waiting.remove(&id));
        match slot {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => debug!(id, "discarding response nobody waits for"),
        }
    }
    // dropping the senders wakes every waiter with ConnectionClosed
    pending.lock().take();
}
