// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy shared by every component in the daemon.
///
/// Each variant maps to one of the outcome classes the execution queue and
/// connection server use to decide whether to retry, rearm, or surface a
/// hard failure: transient external failures are safe to retry, protocol
/// errors never are, and state conflicts tell the caller the daemon was
/// simply busy rather than broken.
#[derive(Debug, Error)]
pub enum VhError {
    /// A subprocess or external service failed in a way that may succeed
    /// on a later attempt (ffmpeg exited non-zero, transcriber timed out).
    #[error("transient external failure: {0}")]
    TransientExternal(String),

    /// The wire request was malformed, oversized, or used an unknown
    /// action token.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The runtime state machine refused the action because the daemon
    /// was already busy or in an incompatible state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A bounded resource (execution queue, connection pool) was full.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    /// The operation was cancelled by a newer hold session or an explicit
    /// cancel request, not by failure.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Capture ended without ever detecting speech.
    #[error("no speech detected")]
    NoSpeech,

    /// Unrecoverable: corrupt state, missing state directory, lock
    /// acquisition failure.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VhError {
    /// Exit-code-equivalent classification used by the hold session and
    /// wake trigger paths, matching the original process's rc
    /// conventions (0 ok, 3 no-speech, 4 cancelled, other non-zero error).
    pub fn rc(&self) -> i32 {
        match self {
            VhError::NoSpeech => 3,
            VhError::Cancelled(_) => 4,
            _ => 1,
        }
    }
}

/// Raised when the state directory cannot be resolved or created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no home directory could be determined for the state directory")]
    NoStateDir,
    #[error("failed to create state directory {0}: {1}")]
    CreateFailed(PathBuf, #[source] io::Error),
}

/// Raised during daemon startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to acquire daemon lock at {0}: {1}")]
    LockFailed(PathBuf, #[source] io::Error),
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, #[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}