// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! voice-hotkeyd: the voice-hotkey daemon binary. Parses no CLI
//! arguments beyond `--version`/`--help` -- everything else comes from
//! the environment (`vh_core::config::Config`) -- acquires the
//! single-instance lock, binds the connection server, prints `READY`
//! for the CLI's start-and-wait handshake, and runs until a shutdown
//! signal arrives. Adapted from the teacher's `ojd` binary shape.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use vh_core::config::Config;
use vh_core::error::LifecycleError;
use vh_daemon::adapters::{DesktopNotifyAdapter, ShellInjector, ShellTranscriber};
use vh_daemon::lifecycle;

const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("voice-hotkeyd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("voice-hotkeyd {}", env!("CARGO_PKG_VERSION"));
                println!("Background daemon for the voice-hotkey command/dictation pipeline.");
                println!();
                println!("Normally started by the `voice-hotkey` CLI, not invoked directly.");
                println!("Listens on a per-user Unix socket for requests.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("usage: voice-hotkeyd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::from_env()?;
    let log_guard = setup_logging(&config)?;
    info!("starting voice-hotkey daemon");

    let transcribe_cmd =
        std::env::var("VOICE_TRANSCRIBE_CMD").unwrap_or_else(|_| "voice-hotkey-transcribe".to_string());
    let transcriber = Arc::new(ShellTranscriber::new(transcribe_cmd, TRANSCRIBE_TIMEOUT));
    let injector = Arc::new(ShellInjector::new(config.dictation_injector.clone()));
    let notify = Arc::new(DesktopNotifyAdapter::new());

    let mut handles = match lifecycle::startup(config, transcriber.clone(), injector, notify).await {
        Ok(handles) => handles,
        Err(LifecycleError::LockFailed(path, _)) => {
            let pid = std::fs::read_to_string(&path).unwrap_or_default();
            eprintln!("voice-hotkeyd is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    tokio::spawn(async move {
        if let Err(e) = transcriber.warm("default").await {
            tracing::warn!(error = %e, "model warm-up failed");
        }
    });

    let shutdown = handles.shutdown.clone();
    let listener = handles.take_listener();
    let listener_task = tokio::spawn(listener.run(shutdown.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = ?handles.config.socket_path(), "daemon ready");
    println!("READY");

    tokio::select! {
        _ = shutdown.cancelled() => info!("shutdown requested over the connection server"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    shutdown.cancel();
    let _ = listener_task.await;
    lifecycle::shutdown(&handles);
    Ok(())
}

#[allow(clippy::expect_used)]
fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        log_path.parent().expect("log path always has a parent under state_dir"),
        log_path.file_name().expect("log path always has a file name"),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
