//! REPL server
//!
//! Accepts connections on one transport and gives every connection its own
//! evaluator, built by the configured factory. Requests on a connection are
//! answered strictly in order; evaluation itself runs on the blocking pool.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::codec::{read_frame, write_frame, Codec};
use super::error::TransportError;
use super::protocol::{EvalReply, Op, Outcome, Request, Response};
use super::transport::{BoxedStream, Endpoint, Listener, TransportKind};

/// Per-connection evaluation handler
pub trait Evaluator: Send + 'static {
    /// Evaluate one unit of source text; `Err` carries the message sent back
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, String>;

    /// Discard all state accumulated by previous evaluations
    fn reset(&mut self);
}

/// Builds a fresh evaluator for each accepted connection
pub type EvaluatorFactory = Arc<dyn Fn() -> Box<dyn Evaluator> + Send + Sync>;

/// Server settings
#[derive(Clone)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub addr: String,
    pub codec: Codec,
    pub evaluator: EvaluatorFactory,
}

impl fmt::Debug for ServerConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("transport", &self.transport)
            .field("addr", &self.addr)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// A bound server, ready to [`serve`](Server::serve)
pub struct Server {
    listener: Listener,
    codec: Codec,
    factory: EvaluatorFactory,
    addr: String,
}

impl Server {
    /// Bind the listener. Nothing is accepted until `serve` runs.
    pub async fn bind(config: ServerConfig) -> Result<Self, TransportError> {
        let endpoint = Endpoint::for_kind(config.transport, &config.addr)?;
        let listener = Listener::bind(&endpoint).await?;
        let addr = listener.local_address();
        info!(
            transport = %config.transport,
            codec = %config.codec,
            addr = %addr,
            "server listening"
        );
        Ok(Self {
            listener,
            codec: config.codec,
            factory: config.evaluator,
            addr,
        })
    }

    /// Address clients should connect to
    pub fn addr(&self) -> String {
        self.addr.clone()
    }

    /// Accept and serve connections until `token` is cancelled
    pub async fn serve(
        mut self,
        token: CancellationToken,
    ) -> Result<(), TransportError> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Some(Ok((stream, peer))) => {
                        info!(peer = %peer, "connection accepted");
                        let evaluator = (self.factory)();
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            self.codec,
                            evaluator,
                            token.child_token(),
                        ));
                    }
                    Some(Err(e)) => warn!(error = %e, "accept failed"),
                    None => break,
                },
                // reap finished connections so the set does not grow unbounded
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(addr = %self.addr, open = connections.len(), "server shutting down");
        connections.shutdown().await;
        Ok(())
    }
}

async fn serve_connection(
    mut stream: BoxedStream,
    peer: String,
    codec: Codec,
    mut evaluator: Box<dyn Evaluator>,
    token: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break,
            frame = read_frame::<_, Request>(&mut stream, codec) => frame,
        };
        let request = match frame {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(peer = %peer, "peer closed the connection");
                break;
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "dropping connection");
                break;
            }
        };

        debug!(peer = %peer, id = request.id, "request");
        let outcome = match handle(evaluator, request.op).await {
            Some((outcome, returned)) => {
                evaluator = returned;
                outcome
            }
            None => break,
        };

        let response = Response {
            id: request.id,
            outcome,
        };
        if let Err(e) = write_frame(&mut stream, codec, &response).await {
            warn!(peer = %peer, error = %e, "failed to send response");
            break;
        }
    }
    debug!(peer = %peer, "connection finished");
}

/// Run one operation. `None` means the evaluator was lost and the
/// connection must close.
async fn handle(
    mut evaluator: Box<dyn Evaluator>,
    op: Op,
) -> Option<(Outcome, Box<dyn Evaluator>)> {
    match op {
        Op::Describe => Some((
            Outcome::Described {
                server: crate::NAME.to_string(),
                version: crate::VERSION.to_string(),
            },
            evaluator,
        )),
        Op::Reset => {
            evaluator.reset();
            Some((Outcome::Reset, evaluator))
        }
        Op::Eval { code } => {
            let joined = tokio::task::spawn_blocking(move || {
                let result = evaluator.eval(&code);
                (result, evaluator)
            })
            .await;
            match joined {
                Ok((Ok(reply), evaluator)) => Some((Outcome::Value(reply), evaluator)),
                Ok((Err(message), evaluator)) => Some((Outcome::Error { message }, evaluator)),
                Err(e) => {
                    error!(error = %e, "evaluation task failed");
                    None
                }
            }
        }
    }
}
