//! Server and client integration tests
//!
//! Real servers with the in-process evaluator, driven through the remote
//! backend the way client mode drives them.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use zylisp::repl::{
    Codec, EvalReply, Evaluator, EvaluatorFactory, ProtocolError, ResultValue, Server, ServerConfig, TransportKind,
};
use zylisp::session::dispatch::local_evaluators;
use zylisp::session::{format_value, BackendError, EvalBackend, RemoteBackend};

use crate::session_loop::{run_script, Script};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn start_server(
    rt: &Runtime,
    transport: TransportKind,
    addr: &str,
    codec: Codec,
    evaluator: EvaluatorFactory,
) -> (String, CancellationToken) {
    let server = rt
        .block_on(Server::bind(ServerConfig {
            transport,
            addr: addr.to_string(),
            codec,
            evaluator,
        }))
        .unwrap();
    let addr = server.addr();
    let token = CancellationToken::new();
    rt.spawn(server.serve(token.clone()));
    (addr, token)
}

fn connect(
    rt: &Runtime,
    addr: &str,
    codec: Codec,
    timeout: Duration,
) -> RemoteBackend {
    RemoteBackend::connect(addr, codec, timeout, rt.handle().clone(), CancellationToken::new()).unwrap()
}

fn eval_display(
    backend: &mut RemoteBackend,
    code: &str,
) -> String {
    match backend.eval(code) {
        Ok(reply) => format_value(&reply.value),
        Err(e) => format!("Error: {}", e),
    }
}

#[test]
fn test_round_trip_every_transport_and_codec() {
    let rt = runtime();
    let mut targets = vec![
        (TransportKind::InProcess, "roundtrip-json".to_string(), Codec::Json),
        (TransportKind::InProcess, "roundtrip-msgpack".to_string(), Codec::MsgPack),
        (TransportKind::Tcp, "127.0.0.1:0".to_string(), Codec::Json),
        (TransportKind::Tcp, "127.0.0.1:0".to_string(), Codec::MsgPack),
    ];
    let dir = tempfile::tempdir().unwrap();
    if cfg!(unix) {
        let socket = dir.path().join("zylisp.sock");
        targets.push((TransportKind::Unix, socket.display().to_string(), Codec::MsgPack));
    }

    for (transport, addr, codec) in targets {
        let (addr, server) = start_server(&rt, transport, &addr, codec, local_evaluators());
        let mut backend = connect(&rt, &addr, codec, Duration::from_secs(5));

        assert_eq!(eval_display(&mut backend, "(define x 10)"), "10", "{}", addr);
        assert_eq!(eval_display(&mut backend, "x"), "10");
        assert_eq!(
            eval_display(&mut backend, "(define add (lambda (a b) (+ a b)))"),
            "<function>"
        );
        assert_eq!(eval_display(&mut backend, "(add x 20)"), "30");
        assert_eq!(eval_display(&mut backend, "(list 1.5 \"s\" nil true)"), "(1.5 \"s\" nil true)");

        let reply = backend.eval("(begin (print \"side\") 'sym)").unwrap();
        assert_eq!(reply.output, "side\n");
        assert_eq!(reply.value, ResultValue::Other("sym".into()));

        backend.close();
        server.cancel();
    }
}

#[test]
fn test_evaluation_errors_come_back_as_errors() {
    let rt = runtime();
    let (addr, server) = start_server(&rt, TransportKind::InProcess, "remote-errors", Codec::Json, local_evaluators());
    let mut backend = connect(&rt, &addr, Codec::Json, Duration::from_secs(5));

    let err = backend.eval("(car 1)").unwrap_err();
    assert!(err.is_evaluation());
    assert!(matches!(err, BackendError::Remote(ref m) if m.starts_with("eval error: ")));

    let err = backend.eval("(+ 1").unwrap_err();
    assert!(matches!(err, BackendError::Remote(ref m) if m.starts_with("parse error: ")));

    assert_eq!(eval_display(&mut backend, "(+ 1 2)"), "3");
    server.cancel();
}

#[test]
fn test_connections_are_isolated() {
    let rt = runtime();
    let (addr, server) = start_server(&rt, TransportKind::Tcp, "127.0.0.1:0", Codec::Json, local_evaluators());
    let mut first = connect(&rt, &addr, Codec::Json, Duration::from_secs(5));
    let mut second = connect(&rt, &addr, Codec::Json, Duration::from_secs(5));

    assert_eq!(eval_display(&mut first, "(define x 1)"), "1");
    assert_eq!(eval_display(&mut second, "(define y 2)"), "2");
    assert_eq!(
        eval_display(&mut second, "x"),
        "Error: eval error: unbound symbol: x"
    );

    // reset only touches the connection that asked for it
    second.reset().unwrap();
    assert_eq!(
        eval_display(&mut second, "y"),
        "Error: eval error: unbound symbol: y"
    );
    assert_eq!(eval_display(&mut first, "x"), "1");
    server.cancel();
}

#[test]
fn test_client_session_against_server() {
    let rt = runtime();
    let (addr, server) = start_server(&rt, TransportKind::InProcess, "remote-session", Codec::MsgPack, local_evaluators());
    let backend = connect(&rt, &addr, Codec::MsgPack, Duration::from_secs(5));

    let script = Script::new(&[
        "(define factorial (lambda (n) (if (= n 0) 1 (* n (factorial (- n 1))))))",
        "(factorial 5)",
        "(reset)",
        "(factorial 0)",
        "(quit)",
    ]);
    let (out, mut backend, _) = run_script(backend, script, CancellationToken::new());
    assert_eq!(
        out,
        vec![
            "<function>",
            "120",
            "Environment reset",
            "Error: eval error: unbound symbol: factorial",
            "Goodbye!"
        ]
    );
    backend.close();
    server.cancel();
}

#[test]
fn test_deeply_nested_result_round_trips() {
    let rt = runtime();
    for codec in [Codec::Json, Codec::MsgPack] {
        let name = format!("remote-deep-{}", codec);
        let (addr, server) = start_server(&rt, TransportKind::InProcess, &name, codec, local_evaluators());
        let mut backend = connect(&rt, &addr, codec, Duration::from_secs(5));

        let nested = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(eval_display(&mut backend, &format!("(quote {})", nested)), nested);
        assert_eq!(eval_display(&mut backend, "(+ 1 2)"), "3");

        backend.close();
        server.cancel();
    }
}

/// Answers `deep` with a value no decoder accepts, echoes anything else
struct Bottomless;

impl Evaluator for Bottomless {
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, String> {
        let mut value = ResultValue::String(code.to_string());
        if code == "deep" {
            for _ in 0..300 {
                value = ResultValue::List(vec![value]);
            }
        }
        Ok(EvalReply {
            value,
            output: String::new(),
        })
    }

    fn reset(&mut self) {}
}

#[test]
fn test_undecodable_reply_fails_only_its_request() {
    let rt = runtime();
    let factory: EvaluatorFactory = Arc::new(|| Box::new(Bottomless) as Box<dyn Evaluator>);
    let (addr, server) = start_server(&rt, TransportKind::InProcess, "remote-undecodable", Codec::Json, factory);
    let mut backend = connect(&rt, &addr, Codec::Json, Duration::from_secs(5));

    let err = backend.eval("deep").unwrap_err();
    assert!(matches!(err, BackendError::Protocol(ProtocolError::Decode(_))), "{:?}", err);
    assert_eq!(eval_display(&mut backend, "after"), "\"after\"");

    backend.close();
    server.cancel();
}

/// Sleeps on `slow`, answers immediately otherwise
struct Sleepy;

impl Evaluator for Sleepy {
    fn eval(
        &mut self,
        code: &str,
    ) -> Result<EvalReply, String> {
        if code == "slow" {
            std::thread::sleep(Duration::from_millis(600));
        }
        Ok(EvalReply {
            value: ResultValue::String(code.to_string()),
            output: String::new(),
        })
    }

    fn reset(&mut self) {}
}

#[test]
fn test_timeout_is_recoverable() {
    let rt = runtime();
    let factory: EvaluatorFactory = Arc::new(|| Box::new(Sleepy) as Box<dyn Evaluator>);
    let (addr, server) = start_server(&rt, TransportKind::InProcess, "remote-timeout", Codec::Json, factory);
    let backend = connect(&rt, &addr, Codec::Json, Duration::from_millis(400));

    let script = Script::new(&["slow", "fast"]);
    let (out, mut backend, _) = run_script(backend, script, CancellationToken::new());
    assert_eq!(
        out,
        vec!["Protocol Error: request timed out after 400ms", "\"fast\""]
    );
    backend.close();
    server.cancel();
}

#[test]
fn test_cancellation_during_a_remote_call() {
    let rt = runtime();
    let factory: EvaluatorFactory = Arc::new(|| Box::new(Sleepy) as Box<dyn Evaluator>);
    let (addr, server) = start_server(&rt, TransportKind::InProcess, "remote-cancel", Codec::Json, factory);

    let token = CancellationToken::new();
    let mut backend = RemoteBackend::connect(
        &addr,
        Codec::Json,
        Duration::from_secs(5),
        rt.handle().clone(),
        token.clone(),
    )
    .unwrap();

    let canceller = token.clone();
    rt.spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });
    assert!(matches!(backend.eval("slow"), Err(BackendError::Cancelled)));
    server.cancel();
}

#[test]
fn test_server_gone_is_a_protocol_error() {
    let rt = runtime();
    let (addr, server) = start_server(&rt, TransportKind::InProcess, "remote-gone", Codec::Json, local_evaluators());
    let mut backend = connect(&rt, &addr, Codec::Json, Duration::from_secs(1));
    server.cancel();
    std::thread::sleep(Duration::from_millis(100));

    let err = backend.eval("(+ 1 2)").unwrap_err();
    assert!(matches!(err, BackendError::Protocol(_)));
    assert!(!err.is_evaluation());
}
