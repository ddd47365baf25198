// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection server: accepts Unix-socket connections, bounds them with
//! a semaphore (the "bounded thread pool" of connection handlers), reads
//! one line-framed request, dispatches it through the [`Router`], and
//! writes one response. Adapted from the teacher's
//! `oj_daemon::listener::{Listener, handle_connection}` — the accept
//! loop, per-connection spawn, and disconnect-racing idiom are kept;
//! the 4-byte length-prefixed framing is replaced with the newline
//! protocol this daemon speaks on the wire.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vh_core::protocol::{decode_request, DecodeError, Response};

use crate::router::Router;

/// Maximum number of connections being actively handled at once. Not a
/// thread pool in the literal sense (tasks are async, not OS threads),
/// but the same bound-and-reject role the original's
/// `ThreadPoolExecutor` played, modeled here with a semaphore.
const DEFAULT_MAX_CONNECTION_WORKERS: usize = 4;
const MAX_CONNECTION_WORKERS_LIMIT: usize = 32;

pub fn resolve_max_connection_workers(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_MAX_CONNECTION_WORKERS).clamp(1, MAX_CONNECTION_WORKERS_LIMIT)
}

pub struct Listener {
    unix: UnixListener,
    router: Arc<Router>,
    permits: Arc<Semaphore>,
    max_request_bytes: usize,
}

impl Listener {
    pub fn bind(socket_path: &Path, router: Arc<Router>, max_request_bytes: usize) -> std::io::Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }
        let unix = UnixListener::bind(socket_path)?;
        let workers = resolve_max_connection_workers(None);
        Ok(Self { unix, router, permits: Arc::new(Semaphore::new(workers)), max_request_bytes })
    }

    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    return;
                }
                accepted = self.unix.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let router = Arc::clone(&self.router);
                            let permits = Arc::clone(&self.permits);
                            let max_request_bytes = self.max_request_bytes;
                            tokio::spawn(async move {
                                let Ok(permit) = permits.try_acquire_owned() else {
                                    warn!("connection pool saturated, dropping connection");
                                    return;
                                };
                                if let Err(e) = handle_connection(stream, &router, max_request_bytes).await {
                                    debug!(error = %e, "connection handling ended with error");
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => error!(error = %e, "accept error"),
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    router: &Router,
    max_request_bytes: usize,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(()); // client disconnected without sending anything
    }

    let decoded = decode_request(line.trim_end_matches('\n'), max_request_bytes);

    // Race the handler against the client disconnecting mid-request
    // (e.g. the CLI's own response timeout firing), exactly as the
    // teacher's `detect_client_disconnect` races `handle_request`.
    let cancel = CancellationToken::new();
    let response = tokio::select! {
        resp = dispatch(decoded, router, cancel.clone()) => resp,
        _ = detect_client_disconnect(&mut reader) => {
            cancel.cancel();
            debug!("client disconnected before response was ready");
            return Ok(());
        }
    };

    write_half.write_all(response.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await?;
    Ok(())
}

async fn dispatch(
    decoded: Result<vh_core::protocol::Request, DecodeError>,
    router: &Router,
    cancel: CancellationToken,
) -> String {
    match decoded {
        Ok(req) => {
            let wants_json = req.wants_json;
            let resp = router.handle(req, cancel).await;
            resp.encode(wants_json)
        }
        Err(e @ DecodeError::UnknownAction(_)) => {
            warn!(error = %e, "rejecting unknown action");
            Response::rc(2).encode(true)
        }
        Err(e) => {
            warn!(error = %e, "rejecting malformed request");
            Response::rc(1).encode(true)
        }
    }
}

async fn detect_client_disconnect<R: AsyncReadExt + Unpin>(reader: &mut BufReader<R>) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

pub fn socket_parent_dir(socket_path: &Path) -> Option<PathBuf> {
    socket_path.parent().map(|p| p.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_worker_count_to_limit() {
        assert_eq!(resolve_max_connection_workers(Some(0)), 1);
        assert_eq!(resolve_max_connection_workers(Some(1000)), MAX_CONNECTION_WORKERS_LIMIT);
        assert_eq!(resolve_max_connection_workers(None), DEFAULT_MAX_CONNECTION_WORKERS);
    }
}