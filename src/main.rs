//! Zylisp - CLI

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use zylisp::session;
use zylisp::util::config::{load_user_config, CliOverrides, SessionConfig};
use zylisp::util::logger::{self, LogLevel};
use zylisp::{NAME, VERSION};

/// Stack for threads that evaluate user code; deep recursion needs room
const EVAL_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Exit status when a second signal forces shutdown
const FORCED_EXIT: i32 = 130;

/// How long a cancelled session may take to wind down. A line read blocked in
/// the terminal never sees the token, so the process exits after this.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Interactive REPL for Zylisp: local, server or client
#[derive(Parser, Debug)]
#[command(name = "zylisp")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    /// Execution mode: local, server or client [default: local]
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Server transport: in-process, unix or tcp [default: in-process]
    #[arg(long, value_name = "KIND")]
    transport: Option<String>,

    /// Address to listen on (server) or connect to (client)
    #[arg(long, value_name = "ADDR")]
    addr: Option<String>,

    /// Wire codec: json or msgpack [default: json]
    #[arg(long, value_name = "CODEC")]
    codec: Option<String>,

    /// Prompt string [default: "> "]
    #[arg(long)]
    prompt: Option<String>,

    /// Remote evaluation timeout in seconds [default: 30]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// History file [default: ~/.zylisp_history]
    #[arg(long, value_name = "FILE")]
    history: Option<PathBuf>,

    /// Do not print the startup banner
    #[arg(long)]
    no_banner: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(self) -> CliOverrides {
        CliOverrides {
            mode: self.mode,
            transport: self.transport,
            addr: self.addr,
            codec: self.codec,
            prompt: self.prompt,
            timeout_secs: self.timeout,
            history_file: self.history,
            no_banner: self.no_banner,
            verbose: self.verbose,
        }
    }
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let user = load_user_config().context("failed to load user configuration")?;
    let config = SessionConfig::resolve(&args.overrides(), &user)?;
    logger::init_with_level(LogLevel::for_mode(config.mode, config.verbose));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("zylisp-worker")
        .thread_stack_size(EVAL_STACK_SIZE)
        .build()
        .context("failed to start the async runtime")?;

    let token = CancellationToken::new();
    watch_signals(&runtime, token.clone());

    // the interactive loop evaluates on this thread, so it gets the same stack
    std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("zylisp-session".into())
            .stack_size(EVAL_STACK_SIZE)
            .spawn_scoped(scope, || session::run(&config, &runtime, token))
            .context("failed to start the session thread")?;
        handle
            .join()
            .map_err(|_| anyhow!("session thread panicked"))?
            .map_err(anyhow::Error::from)
    })
}

/// How the signal watcher ended the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// A second signal arrived
    Forced,
    /// The session did not return within the grace period
    GraceExpired,
}

/// First SIGINT/SIGTERM cancels the session, a second one exits at once
fn watch_signals(
    runtime: &Runtime,
    token: CancellationToken,
) {
    runtime.spawn(async move {
        match supervise(next_signal, token, SHUTDOWN_GRACE).await {
            Some(Shutdown::Forced) => std::process::exit(FORCED_EXIT),
            Some(Shutdown::GraceExpired) => {
                tracing::debug!("session still blocked after cancellation");
                std::process::exit(0)
            }
            None => {}
        }
    });
}

/// Cancel `token` on the first signal, then wait for either a second signal
/// or the end of the grace period. Returns `None` if signals cannot be
/// received at all.
async fn supervise<F, Fut>(
    mut next_signal: F,
    token: CancellationToken,
    grace: Duration,
) -> Option<Shutdown>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_signal().await {
        tracing::warn!(error = %e, "cannot listen for signals");
        return None;
    }
    eprintln!("Shutting down...");
    token.cancel();

    tokio::select! {
        Ok(()) = next_signal() => Some(Shutdown::Forced),
        _ = tokio::time::sleep(grace) => Some(Shutdown::GraceExpired),
    }
}

#[cfg(unix)]
async fn next_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use std::pin::Pin;

    use tokio::sync::{mpsc, Mutex};

    use super::*;

    type SignalFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

    /// Signal source fed by a channel; a closed channel reads as an error
    fn signals(count: usize) -> impl FnMut() -> SignalFuture {
        let (tx, rx) = mpsc::unbounded_channel();
        for _ in 0..count {
            tx.send(()).unwrap();
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));
        move || -> SignalFuture {
            let rx = rx.clone();
            Box::pin(async move {
                rx.lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| std::io::Error::other("no more signals"))
            })
        }
    }

    #[tokio::test]
    async fn test_blocked_session_exits_after_grace() {
        let token = CancellationToken::new();
        let outcome = supervise(signals(1), token.clone(), Duration::from_millis(50)).await;
        assert_eq!(outcome, Some(Shutdown::GraceExpired));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_second_signal_forces_exit() {
        let token = CancellationToken::new();
        let outcome = supervise(signals(2), token.clone(), Duration::from_secs(60)).await;
        assert_eq!(outcome, Some(Shutdown::Forced));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_signal_source_leaves_session_alone() {
        let token = CancellationToken::new();
        let outcome = supervise(signals(0), token.clone(), Duration::from_millis(50)).await;
        assert_eq!(outcome, None);
        assert!(!token.is_cancelled());
    }
}
