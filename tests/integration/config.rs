//! Mode dispatch integration tests

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use zylisp::repl::{Codec, TransportKind};
use zylisp::session::{self, DispatchError};
use zylisp::util::config::{CliOverrides, ConfigError, Mode, SessionConfig, UserConfig};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn test_missing_address_fails_fast() {
    let config = SessionConfig {
        mode: Mode::Client,
        ..SessionConfig::default()
    };
    let err = session::run(&config, &runtime(), CancellationToken::new()).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Config(ConfigError::MissingAddress(Mode::Client))
    ));
    assert_eq!(err.to_string(), "client mode requires --addr");
}

#[test]
fn test_unknown_mode_is_a_config_error() {
    let cli = CliOverrides {
        mode: Some("repl".into()),
        ..CliOverrides::default()
    };
    let err = SessionConfig::resolve(&cli, &UserConfig::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "unknown mode 'repl' (expected local, server or client)"
    );
}

#[test]
fn test_client_without_server_is_a_connect_error() {
    let config = SessionConfig {
        mode: Mode::Client,
        addr: Some("inproc:dispatch-nobody".into()),
        timeout: Duration::from_secs(1),
        ..SessionConfig::default()
    };
    let err = session::run(&config, &runtime(), CancellationToken::new()).unwrap_err();
    assert!(matches!(err, DispatchError::Connect { .. }));
}

#[test]
fn test_server_stops_when_cancelled() {
    let config = SessionConfig {
        mode: Mode::Server,
        transport: TransportKind::Tcp,
        addr: Some("127.0.0.1:0".into()),
        codec: Codec::MsgPack,
        ..SessionConfig::default()
    };
    let token = CancellationToken::new();
    token.cancel();
    session::run(&config, &runtime(), token).unwrap();
}

#[test]
fn test_server_address_in_use() {
    let rt = runtime();
    let holder = rt.block_on(tokio::net::TcpListener::bind("127.0.0.1:0")).unwrap();
    let taken = holder.local_addr().unwrap().to_string();

    let config = SessionConfig {
        mode: Mode::Server,
        transport: TransportKind::Tcp,
        addr: Some(taken),
        ..SessionConfig::default()
    };
    let err = session::run(&config, &rt, CancellationToken::new()).unwrap_err();
    assert!(matches!(err, DispatchError::Server(_)));
}
