// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data model for the bounded FIFO execution queue. The queue and worker
//! themselves live in `vh-daemon` (they need tokio/thread plumbing); this
//! module holds the pure data shapes so both the daemon and the CLI's
//! status rendering can share them. Grounded on
//! `voice_hotkey/runtime/job_queue.py`.

use serde::{Deserialize, Serialize};

pub type JobId = u64;

/// Point-in-time view of the queue, returned by `runtime-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub running_job_id: Option<JobId>,
    pub running_job_name: Option<String>,
    pub running_age_ms: Option<u64>,
    pub worker_alive: bool,
    pub worker_restarts: u64,
}

/// Lightweight info about a queued or running job, used by callers that
/// only need identity, not the job's closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJobInfo {
    pub job_id: JobId,
    pub name: String,
}

/// Terminal outcome of a job once the worker has run it to completion,
/// been cancelled, or skipped it because it was cancelled while still
/// pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { rc: i32 },
    Cancelled,
    Failed,
}