//! Mode dispatch
//!
//! Builds exactly one execution path from the session configuration.

use std::io;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::repl::{Evaluator, EvaluatorFactory, Server, ServerConfig, TransportError};
use crate::util::config::{ConfigError, Mode, SessionConfig};

use super::backend_trait::EvalBackend;
use super::engine::{LocalBackend, RemoteBackend};
use super::line::{LineConfig, LineSource, ReadlineSource, SessionLoop};

/// Why a run ended abnormally
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: TransportError,
    },

    #[error("server error: {0}")]
    Server(#[source] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<&SessionConfig> for LineConfig {
    fn from(config: &SessionConfig) -> Self {
        LineConfig {
            prompt: config.prompt.clone(),
            history_file: config.history_file.clone(),
            history_size: config.history_size,
            banner: config.banner,
            colors: config.colors,
            ..LineConfig::default()
        }
    }
}

/// Evaluator factory for server mode: a fresh environment per connection
pub fn local_evaluators() -> EvaluatorFactory {
    Arc::new(|| Box::new(LocalBackend::new()) as Box<dyn Evaluator>)
}

/// Run the configured mode until it finishes or `token` is cancelled
pub fn run(
    config: &SessionConfig,
    runtime: &Runtime,
    token: CancellationToken,
) -> Result<(), DispatchError> {
    config.validate()?;
    info!(mode = %config.mode, "starting");

    match config.mode {
        Mode::Local => {
            let source = open_editor(config)?;
            run_session(config, LocalBackend::new(), source, io::stdout(), token)
        }
        Mode::Server => {
            let addr = config.addr.clone().ok_or(ConfigError::MissingAddress(config.mode))?;
            let server_config = ServerConfig {
                transport: config.transport,
                addr,
                codec: config.codec,
                evaluator: local_evaluators(),
            };
            runtime.block_on(async {
                let server = Server::bind(server_config).await.map_err(DispatchError::Server)?;
                println!("{} server listening on {}", crate::NAME, server.addr());
                server.serve(token).await.map_err(DispatchError::Server)
            })
        }
        Mode::Client => {
            let addr = config.addr.clone().ok_or(ConfigError::MissingAddress(config.mode))?;
            let backend = RemoteBackend::connect(
                &addr,
                config.codec,
                config.timeout,
                runtime.handle().clone(),
                token.clone(),
            )
            .map_err(|source| DispatchError::Connect {
                addr: addr.clone(),
                source,
            })?;
            let source = open_editor(config)?;

            let mut session = SessionLoop::new(config.into(), backend, source, io::stdout(), token);
            let result = session.run();
            let (mut backend, _, _) = session.into_parts();
            backend.close();
            Ok(result?)
        }
    }
}

/// Drive one interactive session to completion
pub fn run_session<B, S, W>(
    config: &SessionConfig,
    backend: B,
    source: S,
    out: W,
    token: CancellationToken,
) -> Result<(), DispatchError>
where
    B: EvalBackend,
    S: LineSource,
    W: io::Write,
{
    let mut session = SessionLoop::new(config.into(), backend, source, out, token);
    session.run()?;
    Ok(())
}

fn open_editor(config: &SessionConfig) -> Result<ReadlineSource, DispatchError> {
    ReadlineSource::new(&LineConfig::from(config))
        .map_err(|e| DispatchError::Io(io::Error::other(e.to_string())))
}
