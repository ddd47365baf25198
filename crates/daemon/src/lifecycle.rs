// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown: single-instance lock acquisition, state
//! directory and socket setup, and the reverse teardown on exit.
//! Grounded on the teacher's `daemon::lifecycle::{startup, DaemonState}`
//! -- lock-before-truncate, directories-before-socket, bind-last ordering
//! kept; the WAL/snapshot/breadcrumb recovery machinery has no
//! counterpart here, since this daemon carries no durable job history.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::sync::Arc;

use fs2::FileExt;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vh_core::config::Config;
use vh_core::error::LifecycleError;
use vh_core::hold::HoldKind;
use vh_core::state_machine::RuntimeStateMachine;

use crate::adapters::{DynNotify, Injector, Transcriber};
use crate::execution::ExecutionQueue;
use crate::listener::Listener;
use crate::process_registry::ProcessRegistry;
use crate::router::Router;
use crate::session::HoldSessionManager;
use crate::signal::stop_process;

/// Everything `main` needs to run the daemon and later tear it down.
pub struct DaemonHandles {
    pub config: Arc<Config>,
    listener: Option<Listener>,
    pub router: Arc<Router>,
    pub registry: Arc<ProcessRegistry>,
    pub queue: Arc<ExecutionQueue>,
    pub shutdown: CancellationToken,
    // Held only to keep the exclusive lock alive; released on drop.
    #[allow(dead_code)]
    lock_file: File,
}

impl DaemonHandles {
    /// Takes the listener out so it can be spawned as its own task while
    /// `self` stays intact (and the lock file stays held) for the rest
    /// of the daemon's lifetime.
    #[allow(clippy::expect_used)]
    pub fn take_listener(&mut self) -> Listener {
        self.listener.take().expect("listener taken more than once")
    }
}

pub async fn startup(
    config: Config,
    transcriber: Arc<dyn Transcriber>,
    injector: Arc<dyn Injector>,
    notify: Arc<dyn DynNotify>,
) -> Result<DaemonHandles, LifecycleError> {
    match startup_inner(config, transcriber, injector, notify).await {
        Ok(handles) => Ok(handles),
        Err(e) => {
            if !matches!(e, LifecycleError::LockFailed(_, _)) {
                warn!(error = %e, "daemon startup failed, cleaning up");
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    config: Config,
    transcriber: Arc<dyn Transcriber>,
    injector: Arc<dyn Injector>,
    notify: Arc<dyn DynNotify>,
) -> Result<DaemonHandles, LifecycleError> {
    // 1. Create the state directory first -- everything else lives under it.
    fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire the exclusive lock BEFORE truncating the lock file, so a
    // second daemon invocation racing this one fails the lock instead of
    // wiping the running daemon's pid.
    let lock_path = config.lock_path();
    let lock_file = OpenOptions::new().write(true).create(true).truncate(false).open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|e| LifecycleError::LockFailed(lock_path.clone(), e))?;
    lock_file.set_len(0)?;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Remove a stale socket left by a crashed prior instance, then bind
    // last -- only once every other fallible step has succeeded.
    let socket_path = config.socket_path();
    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }

    let config = Arc::new(config);
    let state_machine = Arc::new(RuntimeStateMachine::new());
    let queue = Arc::new(ExecutionQueue::new(config.execution_queue_capacity, "vh-execution"));
    let registry = Arc::new(ProcessRegistry::new());

    let command_session = Arc::new(HoldSessionManager::new(
        HoldKind::Command,
        config.command_state_path(),
        config.audio_backend.clone(),
        config.audio_source.clone(),
        16_000,
        config.state_max_age,
        Arc::clone(&registry),
    ));
    let dictate_session = Arc::new(HoldSessionManager::new(
        HoldKind::Dictate,
        config.dictate_state_path(),
        config.audio_backend.clone(),
        config.audio_source.clone(),
        16_000,
        config.state_max_age,
        Arc::clone(&registry),
    ));

    let shutdown = CancellationToken::new();
    let runtime = Handle::current();

    let router = Arc::new(Router::new(
        Arc::clone(&config),
        state_machine,
        Arc::clone(&queue),
        command_session,
        dictate_session,
        transcriber,
        injector,
        notify,
        runtime,
        shutdown.clone(),
    ));

    let listener = Listener::bind(&socket_path, Arc::clone(&router), config.daemon_max_request_bytes)
        .map_err(|e| LifecycleError::BindFailed(socket_path.clone(), e))?;

    info!(state_dir = ?config.state_dir, "daemon started");
    Ok(DaemonHandles { config, listener: Some(listener), router, registry, queue, shutdown, lock_file })
}

/// Stop every still-registered capture subprocess, then remove the
/// socket and lock files. The lock file handle itself is released by
/// `Drop` once `handles` goes out of scope.
pub fn shutdown(handles: &DaemonHandles) {
    info!("daemon shutting down");
    handles.queue.shutdown();
    handles.registry.for_each_on_shutdown(|p| stop_process(p.pid, &p.label));

    let socket_path = handles.config.socket_path();
    if socket_path.exists() {
        if let Err(e) = fs::remove_file(&socket_path) {
            warn!(error = %e, "failed to remove socket file");
        }
    }
    let lock_path = handles.config.lock_path();
    if lock_path.exists() {
        if let Err(e) = fs::remove_file(&lock_path) {
            warn!(error = %e, "failed to remove lock file");
        }
    }
    info!("daemon shutdown complete");
}
