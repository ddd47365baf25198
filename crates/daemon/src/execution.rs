// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded FIFO execution queue with a single dedicated worker thread
//! and a supervisor that restarts it if it dies, never replaying jobs.
//! Grounded on `voice_hotkey/runtime/job_queue.py::RuntimeJobQueue`,
//! reimplemented with a real OS thread (not a tokio task) for the
//! worker, matching the original's dedicated-thread model, and a
//! `tokio::sync::oneshot` per job so async callers (the connection
//! server) can `.await` a result instead of blocking on a `Future`.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use vh_core::queue::{JobId, JobOutcome, QueueSnapshot};

pub type CancelFlag = Arc<AtomicBool>;
pub type JobFn = Box<dyn FnOnce(&CancelFlag) -> i32 + Send + 'static>;

struct QueuedJob {
    job_id: JobId,
    name: String,
    job: JobFn,
    cancel_flag: CancelFlag,
    queued_at: Instant,
    responder: oneshot::Sender<JobOutcome>,
}

struct RunningJob {
    job_id: JobId,
    name: String,
    cancel_flag: CancelFlag,
    started_at: Instant,
}

struct Shared {
    pending: VecDeque<QueuedJob>,
    running: Option<RunningJob>,
    shutdown: bool,
}

struct Inner {
    shared: Mutex<Shared>,
    condvar: Condvar,
    next_job_id: AtomicU64,
    worker_restarts: AtomicU64,
    max_size: usize,
    worker_name: String,
    worker: Mutex<thread::JoinHandle<()>>,
}

/// A bounded, single-worker, cancellable job queue.
pub struct ExecutionQueue {
    inner: Arc<Inner>,
    _monitor: thread::JoinHandle<()>,
}

impl ExecutionQueue {
    #[allow(clippy::expect_used)]
    pub fn new(max_size: usize, worker_name: impl Into<String>) -> Self {
        let worker_name = worker_name.into();
        // `Inner` needs to exist before the worker thread can be spawned
        // (the thread borrows an `Arc<Inner>`), but `Inner.worker` needs
        // the join handle -- worked around with an `Arc<Mutex<Option<..>>>`
        // bootstrap swapped into place immediately after construction.
        let bootstrap = thread::Builder::new()
            .name(format!("{worker_name}-bootstrap"))
            .spawn(|| {})
            .expect("failed to spawn bootstrap thread");
        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared { pending: VecDeque::new(), running: None, shutdown: false }),
            condvar: Condvar::new(),
            next_job_id: AtomicU64::new(1),
            worker_restarts: AtomicU64::new(0),
            max_size,
            worker_name: worker_name.clone(),
            worker: Mutex::new(bootstrap),
        });

        *inner.worker.lock() = spawn_worker(Arc::clone(&inner));
        let monitor = spawn_monitor(Arc::clone(&inner));

        Self { inner, _monitor: monitor }
    }

    /// Enqueue `job` under `name`. Returns `None` if the queue is full
    /// (the caller should treat this as `ResourceExhaustion`), matching
    /// the original's `submit` returning `None` rather than blocking.
    pub fn submit(&self, name: impl Into<String>, job: JobFn) -> Option<oneshot::Receiver<JobOutcome>> {
        let name = name.into();
        let (tx, rx) = oneshot::channel();
        let cancel_flag: CancelFlag = Arc::new(AtomicBool::new(false));
        let job_id = self.inner.next_job_id.fetch_add(1, Ordering::Relaxed);

        let mut shared = self.inner.shared.lock();
        if shared.pending.len() >= self.inner.max_size {
            warn!(name = %name, pending = shared.pending.len(), "execution queue full");
            return None;
        }
        shared.pending.push_back(QueuedJob {
            job_id,
            name: name.clone(),
            job,
            cancel_flag,
            queued_at: Instant::now(),
            responder: tx,
        });
        info!(job_id, %name, pending = shared.pending.len(), "job queued");
        self.inner.condvar.notify_one();
        Some(rx)
    }

    pub fn pending(&self) -> usize {
        self.inner.shared.lock().pending.len()
    }

    /// Cancel the running job (if its name matches) and drop any
    /// still-pending jobs with the same name, resolving their receivers
    /// with [`JobOutcome::Cancelled`]. Returns whether anything was
    /// cancelled.
    pub fn cancel_by_name(&self, name: &str) -> bool {
        let mut cancelled = false;
        let mut shared = self.inner.shared.lock();

        if let Some(running) = shared.running.as_ref() {
            if running.name == name {
                running.cancel_flag.store(true, Ordering::SeqCst);
                info!(job_id = running.job_id, %name, "cancellation signaled for running job");
                cancelled = true;
            }
        }

        let mut remaining = VecDeque::with_capacity(shared.pending.len());
        while let Some(job) = shared.pending.pop_front() {
            if job.name == name {
                let _ = job.responder.send(JobOutcome::Cancelled);
                info!(job_id = job.job_id, %name, "queued job cancelled");
                cancelled = true;
                continue;
            }
            remaining.push_back(job);
        }
        shared.pending = remaining;
        cancelled
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let shared = self.inner.shared.lock();
        let (running_job_id, running_job_name, running_age_ms) = match &shared.running {
            Some(r) => (Some(r.job_id), Some(r.name.clone()), Some(r.started_at.elapsed().as_millis() as u64)),
            None => (None, None, None),
        };
        QueueSnapshot {
            pending: shared.pending.len(),
            running_job_id,
            running_job_name,
            running_age_ms,
            worker_alive: !self.inner.worker.lock().is_finished(),
            worker_restarts: self.inner.worker_restarts.load(Ordering::Relaxed),
        }
    }

    pub fn shutdown(&self) {
        let mut shared = self.inner.shared.lock();
        shared.shutdown = true;
        self.inner.condvar.notify_all();
    }
}

#[allow(clippy::expect_used)]
fn spawn_worker(inner: Arc<Inner>) -> thread::JoinHandle<()> {
    let name = inner.worker_name.clone();
    thread::Builder::new()
        .name(name)
        .spawn(move || worker_loop(inner))
        .expect("failed to spawn execution worker thread")
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let job = {
            let mut shared = inner.shared.lock();
            loop {
                if let Some(job) = shared.pending.pop_front() {
                    break Some(job);
                }
                if shared.shutdown {
                    break None;
                }
                inner.condvar.wait(&mut shared);
            }
        };
        let Some(job) = job else { return };

        let started_at = Instant::now();
        let wait_ms = started_at.saturating_duration_since(job.queued_at).as_millis();
        {
            let mut shared = inner.shared.lock();
            shared.running = Some(RunningJob {
                job_id: job.job_id,
                name: job.name.clone(),
                cancel_flag: Arc::clone(&job.cancel_flag),
                started_at,
            });
        }
        info!(job_id = job.job_id, name = %job.name, wait_ms, "job started");

        if job.cancel_flag.load(Ordering::SeqCst) {
            let _ = job.responder.send(JobOutcome::Cancelled);
        } else {
            let cancel_flag = job.cancel_flag.clone();
            let run = panic::catch_unwind(AssertUnwindSafe(|| (job.job)(&cancel_flag)));
            let outcome = match run {
                Ok(rc) => JobOutcome::Completed { rc },
                Err(_) => {
                    error!(job_id = job.job_id, name = %job.name, "job panicked");
                    JobOutcome::Failed
                }
            };
            let run_ms = started_at.elapsed().as_millis();
            info!(job_id = job.job_id, name = %job.name, run_ms, ?outcome, "job finished");
            let _ = job.responder.send(outcome);
        }

        let mut shared = inner.shared.lock();
        if matches!(&shared.running, Some(r) if r.job_id == job.job_id) {
            shared.running = None;
        }
    }
}

/// Supervisor loop: wakes once a second and, if the worker thread has
/// died, spawns a replacement. Never replays the job that was running
/// when the worker died -- its `oneshot` receiver is simply dropped,
/// surfacing as a closed channel to the caller. Grounded on
/// `job_queue.py::_monitor_loop`.
#[allow(clippy::expect_used)]
fn spawn_monitor(inner: Arc<Inner>) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name(format!("{}-monitor", inner.worker_name))
        .spawn(move || loop {
            thread::sleep(Duration::from_secs(1));
            if inner.shared.lock().shutdown {
                return;
            }
            let mut worker = inner.worker.lock();
            if worker.is_finished() {
                inner.worker_restarts.fetch_add(1, Ordering::Relaxed);
                error!(
                    restarts = inner.worker_restarts.load(Ordering::Relaxed),
                    "execution worker thread died; restarting"
                );
                inner.shared.lock().running = None;
                *worker = spawn_worker(Arc::clone(&inner));
            }
        })
        .expect("failed to spawn execution monitor thread")
}

impl Drop for ExecutionQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_jobs_fifo_and_reports_rc() {
        let queue = ExecutionQueue::new(8, "test-exec");
        let rx = queue.submit("job-a", Box::new(|_cancel| 0)).unwrap();
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, JobOutcome::Completed { rc: 0 });
    }

    #[tokio::test]
    async fn rejects_submission_when_full() {
        let queue = ExecutionQueue::new(1, "test-exec-full");
        // Fill the single slot with a job that blocks until released.
        let gate = Arc::new(AtomicBool::new(false));
        let gate_clone = Arc::clone(&gate);
        let _rx1 = queue
            .submit(
                "blocker",
                Box::new(move |_cancel| {
                    while !gate_clone.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    0
                }),
            )
            .unwrap();
        // give the worker a moment to pick it up so pending is empty,
        // then fill the (now empty) pending slot.
        thread::sleep(Duration::from_millis(20));
        let _rx2 = queue.submit("second", Box::new(|_cancel| 0)).unwrap();
        let rejected = queue.submit("third", Box::new(|_cancel| 0));
        assert!(rejected.is_none());
        gate.store(true, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn cancel_by_name_cancels_pending_job() {
        let queue = ExecutionQueue::new(8, "test-exec-cancel");
        let gate = Arc::new(AtomicBool::new(false));
        let gate_clone = Arc::clone(&gate);
        let _running = queue
            .submit(
                "blocker",
                Box::new(move |_cancel| {
                    while !gate_clone.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    0
                }),
            )
            .unwrap();
        thread::sleep(Duration::from_millis(20));
        let rx = queue.submit("to-cancel", Box::new(|_cancel| 0)).unwrap();
        assert!(queue.cancel_by_name("to-cancel"));
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, JobOutcome::Cancelled);
        gate.store(true, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn snapshot_reports_pending_and_worker_alive() {
        let queue = ExecutionQueue::new(8, "test-exec-snapshot");
        let snap = queue.snapshot();
        assert!(snap.worker_alive);
        assert_eq!(snap.pending, 0);
    }
}