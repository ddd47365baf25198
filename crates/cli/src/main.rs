// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! voice-hotkey: the CLI client. Bound to hotkeys by the window manager
//! (one invocation per keypress/release), it sends a single action to
//! the daemon, auto-starting it on first use, and exits with the rc the
//! daemon returned. `--daemon` runs the server in-process instead,
//! mirroring `original_source`'s single-script `--daemon` flag for
//! callers that would rather not manage a separate `voice-hotkeyd`.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use vh_core::client::{find_daemon_binary, DaemonClient};
use vh_core::config::Config;
use vh_core::error::LifecycleError;
use vh_daemon::adapters::{DesktopNotifyAdapter, ShellInjector, ShellTranscriber};
use vh_daemon::lifecycle;

const DAEMON_BINARY_NAME: &str = "voice-hotkeyd";
const DAEMON_BINARY_ENV: &str = "VOICE_HOTKEYD_BIN";
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "voice-hotkey", version, about = "Voice hotkey daemon client")]
struct Cli {
    /// Run the daemon in-process instead of dispatching to `voice-hotkeyd`.
    #[arg(long)]
    daemon: bool,

    /// Request JSON responses even for actions that would otherwise get a
    /// bare integer reply.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Clone, Copy)]
enum Action {
    /// Begin a press-and-hold command capture.
    CommandStart,
    /// End a press-and-hold command capture and execute the match.
    CommandStop,
    /// One-shot endpointed command capture (release-free voice command).
    #[command(alias = "voice")]
    CommandAuto,
    /// Begin a press-and-hold dictation capture.
    DictateStart,
    /// End a press-and-hold dictation capture and inject the text.
    DictateStop,
    /// One-shot endpointed dictation capture.
    #[command(aliases = ["text", "dictate"])]
    DictateAuto,
    /// Flip between the default and secondary dictation languages.
    LanguageToggle,
    /// Same as `language-toggle`, kept for parity with the original script.
    DictateLanguage,
    /// Manually fire a wake session, as the wake listener would.
    WakeStart,
    /// Turn the wake-word listener's trigger path on.
    WakewordEnable,
    /// Turn the wake-word listener's trigger path off.
    WakewordDisable,
    /// Flip the wake-word enabled flag.
    WakewordToggle,
    /// Print whether the wake-word trigger path is enabled (rc 0/1).
    WakewordStatus,
    /// Print the current state-machine/queue snapshot as a bare line.
    RuntimeStatus,
    /// Print the current state-machine/queue snapshot as JSON.
    RuntimeStatusJson,
    /// Ask the daemon to shut down.
    Shutdown,
    /// Liveness check: expect rc 0 if the daemon is reachable.
    Ping,
}

impl Action {
    fn wire_name(self) -> &'static str {
        match self {
            Action::CommandStart => "command-start",
            Action::CommandStop => "command-stop",
            Action::CommandAuto => "command-auto",
            Action::DictateStart => "dictate-start",
            Action::DictateStop => "dictate-stop",
            Action::DictateAuto => "dictate-auto",
            Action::LanguageToggle => "language-toggle",
            Action::DictateLanguage => "dictate-language",
            Action::WakeStart => "wake-start",
            Action::WakewordEnable => "wakeword-enable",
            Action::WakewordDisable => "wakeword-disable",
            Action::WakewordToggle => "wakeword-toggle",
            Action::WakewordStatus => "wakeword-status",
            Action::RuntimeStatus => "runtime-status",
            Action::RuntimeStatusJson => "runtime-status-json",
            Action::Shutdown => "shutdown",
            Action::Ping => "ping",
        }
    }

    /// `runtime-status-json` always wants a JSON reply regardless of
    /// `--json`, since a bare integer can't carry the status payload.
    fn forces_json(self) -> bool {
        matches!(self, Action::RuntimeStatusJson)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    if cli.daemon {
        return run_embedded_daemon(config).await;
    }

    let Some(action) = cli.action else {
        eprintln!("error: no action given (and --daemon not set); see --help");
        return ExitCode::from(1);
    };

    match dispatch(&config, action, cli.json).await {
        Ok(rc) => exit_code_for(rc),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch(config: &Config, action: Action, want_json: bool) -> Result<i32, vh_core::client::ClientError> {
    let daemon_binary = find_daemon_binary(DAEMON_BINARY_ENV, DAEMON_BINARY_NAME);
    let client = DaemonClient::connect_or_start(config, &daemon_binary).await?;
    let wants_json = want_json || action.forces_json();
    let response = client.send(action.wire_name(), wants_json, config.daemon_response_timeout).await?;

    if wants_json {
        println!("{}", serde_json::to_string(&response).unwrap_or_else(|_| format!("{{\"rc\":{}}}", response.rc)));
    } else if let Some(status) = &response.status {
        println!("{}", serde_json::to_string(status).unwrap_or_default());
    }
    Ok(response.rc)
}

/// Map the daemon's rc to the process exit code. Per spec these already
/// coincide (0 ok, 1 generic failure, 2 invalid/stale, 3 no speech, 4
/// cancelled) -- this exists so a future divergence has one place to live.
fn exit_code_for(rc: i32) -> ExitCode {
    ExitCode::from(rc.clamp(0, 255) as u8)
}

/// Runs the full daemon lifecycle in this process, identical to
/// `voice-hotkeyd`'s own `main` minus the `--version`/`--help` handling
/// (clap already owns argument parsing here).
async fn run_embedded_daemon(config: Config) -> ExitCode {
    info!("starting voice-hotkey daemon in-process");

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
            return ExitCode::from(1);
        }
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            return ExitCode::from(1);
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

    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return ExitCode::from(1);
        }
    };
    let mut sigint = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return ExitCode::from(1);
        }
    };

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
    ExitCode::SUCCESS
}
