// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client shared by every process that speaks the connection
//! server's wire protocol: the CLI (auto-start, generous retries) and
//! the wake trigger coordinator (no auto-start, short timeouts, a
//! single retry). Grounded on the sibling `oddjobs` family's
//! `cli::client::DaemonClient`/`cli::daemon_process` -- the
//! `ClientError` taxonomy, connect-or-start-with-retry shape, and
//! per-direction timeout pattern are kept; the startup handshake is
//! replaced with this daemon's own `READY`-line-on-stdout protocol
//! (the teacher instead polls socket existence against `Stdio::null()`)
//! since this system's daemon binary is specified to print `READY`
//! once its listener is bound.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::protocol::{decode_response, DecodeError, Response};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon is not running")]
    DaemonNotRunning,
    #[error("failed to start daemon: {0}")]
    StartFailed(String),
    #[error("timed out waiting for daemon to start")]
    StartTimeout,
    #[error("timed out waiting for a response")]
    ResponseTimeout,
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A connection to the daemon's Unix socket. Cheap to construct --
/// holds only the resolved socket path -- and opens a fresh stream per
/// request, matching the connection server's one-request-per-connection
/// protocol.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an already-running daemon. Fails with
    /// [`ClientError::DaemonNotRunning`] rather than starting one.
    pub async fn connect(socket_path: PathBuf, connect_timeout: Duration) -> Result<Self, ClientError> {
        match tokio::time::timeout(connect_timeout, UnixStream::connect(&socket_path)).await {
            Ok(Ok(_stream)) => Ok(Self { socket_path }),
            Ok(Err(e)) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused) => {
                Err(ClientError::DaemonNotRunning)
            }
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Err(_) => Err(ClientError::DaemonNotRunning),
        }
    }

    /// Connect with a small bounded retry loop and no auto-start, the
    /// mode the wake trigger coordinator uses: a dropped trigger is
    /// cheap to reissue on the next detection, so it is not worth
    /// spawning a daemon or waiting long for one.
    pub async fn connect_limited(
        socket_path: PathBuf,
        connect_timeout: Duration,
        retries: u32,
    ) -> Result<Self, ClientError> {
        let mut last_err = ClientError::DaemonNotRunning;
        for attempt in 0..=retries {
            match Self::connect(socket_path.clone(), connect_timeout).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    last_err = e;
                    if attempt < retries {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    /// Connect to the daemon named by `config`, spawning it (and waiting
    /// for its `READY` line) if it isn't already listening. The mode the
    /// CLI uses for every action command.
    pub async fn connect_or_start(config: &Config, daemon_binary: &Path) -> Result<Self, ClientError> {
        let socket_path = config.socket_path();
        match Self::connect(socket_path.clone(), config.daemon_connect_timeout).await {
            Ok(client) => return Ok(client),
            Err(ClientError::DaemonNotRunning) => {}
            Err(e) => return Err(e),
        }

        let startup_timeout = config.daemon_start_delay * config.daemon_start_retries;
        let mut child = spawn_and_wait_ready(daemon_binary, startup_timeout).await?;
        Self::connect_with_retry(socket_path, config, &mut child).await
    }

    async fn connect_with_retry(
        socket_path: PathBuf,
        config: &Config,
        child: &mut Child,
    ) -> Result<Self, ClientError> {
        let deadline = Instant::now() + config.daemon_start_delay * config.daemon_start_retries;
        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(ClientError::StartFailed(format!("daemon exited with {status}")));
            }
            match Self::connect(socket_path.clone(), config.daemon_connect_timeout).await {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => {
                    if Instant::now() >= deadline {
                        return Err(ClientError::StartTimeout);
                    }
                    tokio::time::sleep(config.daemon_start_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send one bare-token request and read back one response line,
    /// bounding the write and the read independently so a daemon that
    /// accepts the connection but never answers can't hang the caller
    /// past `response_timeout`.
    pub async fn send(&self, action: &str, wants_json: bool, response_timeout: Duration) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let line = if wants_json {
            format!("{{\"input\":\"{action}\"}}\n")
        } else {
            format!("{action}\n")
        };
        tokio::time::timeout(Duration::from_secs(2), write_half.write_all(line.as_bytes()))
            .await
            .map_err(|_| ClientError::ResponseTimeout)??;
        write_half.flush().await?;

        let mut response_line = String::new();
        let read = tokio::time::timeout(response_timeout, reader.read_line(&mut response_line))
            .await
            .map_err(|_| ClientError::ResponseTimeout)??;
        if read == 0 {
            return Err(ClientError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "daemon closed connection")));
        }
        Ok(decode_response(response_line.trim_end_matches('\n'))?)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

/// Spawn `binary` with its stdout piped and block until it prints a
/// `READY` line, exits early, or `startup_timeout` elapses. The
/// listener is bound before `READY` is printed (see `main.rs`), so a
/// successful return here means the socket is already accepting
/// connections.
async fn spawn_and_wait_ready(binary: &Path, startup_timeout: Duration) -> Result<Child, ClientError> {
    let mut child = Command::new(binary)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ClientError::StartFailed(format!("failed to spawn {}: {e}", binary.display())))?;

    let Some(stdout) = child.stdout.take() else {
        return Err(ClientError::StartFailed("daemon stdout was not piped".to_string()));
    };
    let mut lines = BufReader::new(stdout).lines();

    let wait_for_ready = async {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim() == "READY" => return Ok(()),
                Ok(Some(_)) => continue,
                Ok(None) => return Err(ClientError::StartFailed("daemon exited before printing READY".to_string())),
                Err(e) => return Err(ClientError::Io(e)),
            }
        }
    };

    match tokio::time::timeout(startup_timeout, wait_for_ready).await {
        Ok(Ok(())) => Ok(child),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!("timed out waiting for daemon READY line");
            Err(ClientError::StartTimeout)
        }
    }
}

/// Resolve the daemon binary to spawn: an explicit override, a sibling
/// of the current executable, then a bare name for `PATH` lookup.
/// Grounded on the sibling family's `find_ojd_binary`, trimmed of its
/// debug-build `CARGO_MANIFEST_DIR` heuristic (this workspace has no
/// analogous dev-vs-release split to guard against).
pub fn find_daemon_binary(env_override: &str, binary_name: &str) -> PathBuf {
    if let Ok(path) = std::env::var(env_override) {
        return PathBuf::from(path);
    }
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let sibling = dir.join(binary_name);
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from(binary_name)
}

/// Best-effort read of the daemon's pid from its lock file, used by
/// status commands. Not used for liveness decisions -- the socket
/// connect attempt is the source of truth for whether the daemon is
/// reachable.
pub fn read_daemon_pid(config: &Config) -> Option<i32> {
    let contents = std::fs::read_to_string(config.lock_path()).ok()?;
    match contents.trim().parse() {
        Ok(pid) => Some(pid),
        Err(_) => {
            debug!(contents = %contents.trim(), "lock file did not contain a plain pid");
            None
        }
    }
}
