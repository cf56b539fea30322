//! Transports
//!
//! Three ways to carry frames between client and server:
//!
//! - `in-process`: an in-memory pipe, reachable only inside this process
//! - `unix`: a unix domain socket
//! - `tcp`: a TCP socket
//!
//! Whatever the transport, a connection ends up as one boxed [`Stream`].

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::TransportError;

/// Buffer size of in-process pipes
const IN_PROCESS_BUFFER: usize = 64 * 1024;

/// Transport kind, chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    InProcess,
    Unix,
    Tcp,
}

impl TransportKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "in-process" => Some(TransportKind::InProcess),
            "unix" => Some(TransportKind::Unix),
            "tcp" => Some(TransportKind::Tcp),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransportKind::InProcess => "in-process",
            TransportKind::Unix => "unix",
            TransportKind::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte stream of one connection
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// A parsed endpoint address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    InProcess(String),
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Address as given to a client: the form of the address picks the
    /// transport (`inproc:NAME`, `unix:PATH` or anything with a `/`,
    /// otherwise `HOST:PORT`).
    pub fn parse(address: &str) -> Result<Self, TransportError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(invalid(address, "empty address"));
        }
        if let Some(name) = address.strip_prefix("inproc:") {
            return Ok(Endpoint::InProcess(name.to_string()));
        }
        if let Some(path) = address.strip_prefix("unix:") {
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if address.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(address)));
        }
        Ok(Endpoint::Tcp(normalize_tcp(address)?))
    }

    /// Address as given to a server of a known transport kind
    pub fn for_kind(
        kind: TransportKind,
        address: &str,
    ) -> Result<Self, TransportError> {
        let address = address.trim();
        match kind {
            TransportKind::InProcess => Ok(Endpoint::InProcess(
                address.strip_prefix("inproc:").unwrap_or(address).to_string(),
            )),
            TransportKind::Unix => Ok(Endpoint::Unix(PathBuf::from(
                address.strip_prefix("unix:").unwrap_or(address),
            ))),
            TransportKind::Tcp => Ok(Endpoint::Tcp(normalize_tcp(address)?)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Endpoint::InProcess(name) => write!(f, "inproc:{}", name),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "{}", addr),
        }
    }
}

fn invalid(
    address: &str,
    reason: &str,
) -> TransportError {
    TransportError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

/// `:5555` means every interface
fn normalize_tcp(address: &str) -> Result<String, TransportError> {
    let normalized = if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    };
    match normalized.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(normalized),
        _ => Err(invalid(address, "expected HOST:PORT")),
    }
}

type Registry = HashMap<String, mpsc::UnboundedSender<DuplexStream>>;

/// In-process servers by name
static IN_PROCESS: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// A bound listener of any transport
pub(crate) enum Listener {
    InProcess {
        name: String,
        incoming: mpsc::UnboundedReceiver<DuplexStream>,
    },
    #[cfg(unix)]
    Unix {
        path: PathBuf,
        listener: tokio::net::UnixListener,
        /// Device and inode of the socket file this listener created
        file: Option<(u64, u64)>,
    },
    Tcp(TcpListener),
}

impl Listener {
    pub(crate) async fn bind(endpoint: &Endpoint) -> Result<Self, TransportError> {
        match endpoint {
            Endpoint::InProcess(name) => {
                let mut registry = IN_PROCESS.lock();
                if registry.get(name).is_some_and(|tx| !tx.is_closed()) {
                    return Err(TransportError::AddressInUse(endpoint.to_string()));
                }
                let (tx, incoming) = mpsc::unbounded_channel();
                registry.insert(name.clone(), tx);
                Ok(Listener::InProcess {
                    name: name.clone(),
                    incoming,
                })
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                clear_stale_socket(path).await?;
                let listener = tokio::net::UnixListener::bind(path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        TransportError::AddressInUse(endpoint.to_string())
                    } else {
                        TransportError::Io(e)
                    }
                })?;
                Ok(Listener::Unix {
                    path: path.clone(),
                    listener,
                    file: socket_identity(path),
                })
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported("unix")),
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        TransportError::AddressInUse(addr.clone())
                    } else {
                        TransportError::Io(e)
                    }
                })?;
                Ok(Listener::Tcp(listener))
            }
        }
    }

    /// Address clients should use to reach this listener
    pub(crate) fn local_address(&self) -> String {
        match self {
            Listener::InProcess { name, .. } => format!("inproc:{}", name),
            #[cfg(unix)]
            Listener::Unix { path, .. } => format!("unix:{}", path.display()),
            Listener::Tcp(listener) => listener
                .local_addr()
                .map(|addr: SocketAddr| addr.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string()),
        }
    }

    /// Wait for the next connection; `None` once the listener can accept no more
    pub(crate) async fn accept(&mut self) -> Option<Result<(BoxedStream, String), TransportError>> {
        match self {
            Listener::InProcess { name, incoming } => {
                let stream = incoming.recv().await?;
                Some(Ok((Box::new(stream), format!("inproc:{}", name))))
            }
            #[cfg(unix)]
            Listener::Unix { listener, path, .. } => Some(
                listener
                    .accept()
                    .await
                    .map(|(stream, _)| {
                        (Box::new(stream) as BoxedStream, format!("unix:{}", path.display()))
                    })
                    .map_err(TransportError::from),
            ),
            Listener::Tcp(listener) => Some(
                listener
                    .accept()
                    .await
                    .map(|(stream, peer)| {
                        let _ = stream.set_nodelay(true);
                        (Box::new(stream) as BoxedStream, peer.to_string())
                    })
                    .map_err(TransportError::from),
            ),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        match self {
            Listener::InProcess { name, .. } => {
                IN_PROCESS.lock().remove(name);
            }
            #[cfg(unix)]
            Listener::Unix { path, file, .. } => {
                // only our own socket; the path may have been replaced since
                if file.is_some() && socket_identity(path) == *file {
                    let _ = std::fs::remove_file(path);
                }
            }
            Listener::Tcp(_) => {}
        }
    }
}

/// Remove a socket file left behind by a server that is gone. Anything else
/// at `path`, including a socket somebody still listens on, means the
/// address is taken.
#[cfg(unix)]
async fn clear_stale_socket(path: &std::path::Path) -> Result<(), TransportError> {
    use std::os::unix::fs::FileTypeExt;

    let in_use = || TransportError::AddressInUse(format!("unix:{}", path.display()));
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            if tokio::net::UnixStream::connect(path).await.is_ok() {
                return Err(in_use());
            }
            debug!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(in_use()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn socket_identity(path: &std::path::Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;

    std::fs::symlink_metadata(path)
        .ok()
        .map(|meta| (meta.dev(), meta.ino()))
}

/// Open a connection to `endpoint`
pub(crate) async fn connect(endpoint: &Endpoint) -> Result<BoxedStream, TransportError> {
    match endpoint {
        Endpoint::InProcess(name) => {
            let (client, server) = tokio::io::duplex(IN_PROCESS_BUFFER);
            let sender = IN_PROCESS
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| TransportError::NoSuchServer(name.clone()))?;
            sender
                .send(server)
                .map_err(|_| TransportError::NoSuchServer(name.clone()))?;
            Ok(Box::new(client))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(TransportError::Unsupported("unix")),
        Endpoint::Tcp(addr) => {
            let stream = tokio::net::TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
    }
}
