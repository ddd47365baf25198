// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal-based subprocess shutdown escalation: SIGINT, wait, SIGTERM,
//! wait, SIGKILL, each step gated by a liveness check so a process that
//! already exited is never re-signaled. Grounded on
//! `live/.local/bin/voice-hotkey.py::{pid_alive, wait_for_pid_exit,
//! stop_recording_pid}`, reimplemented with `nix::sys::signal::kill`
//! per the teacher's `nix` (signal/term) workspace dependency.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{error, info, warn};

/// True if `pid` names a live, non-zombie process. Reads `/proc/<pid>/stat`
/// directly rather than relying on `kill(pid, 0)` succeeding, so a
/// zombie process (which still holds a PID but has exited) is reported
/// as dead.
pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    let proc_path = format!("/proc/{pid}");
    if !std::path::Path::new(&proc_path).exists() {
        return false;
    }
    if let Ok(stat) = fs::read_to_string(format!("{proc_path}/stat")) {
        if let Some(after_comm) = stat.split(") ").nth(1) {
            if after_comm.starts_with('Z') {
                return false;
            }
        }
    }
    true
}

pub fn wait_for_pid_exit(pid: i32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    !pid_alive(pid)
}

/// Best-effort identity check: confirm `/proc/<pid>/cmdline` contains
/// `expected_substring` before signaling, so a PID recycled by the OS
/// for an unrelated process is never signaled by a stale state file.
pub fn cmdline_contains(pid: i32, expected_substring: &str) -> bool {
    match fs::read(format!("/proc/{pid}/cmdline")) {
        Ok(bytes) => {
            let joined = String::from_utf8_lossy(&bytes).replace('\0', " ");
            joined.contains(expected_substring)
        }
        Err(_) => false,
    }
}

/// Escalate SIGINT -> SIGTERM -> SIGKILL against `pid`, waiting after
/// each signal for the process to exit before trying the next one.
/// `label` is used only for logging. A process that's already gone (or
/// vanishes mid-escalation) short-circuits the remaining steps.
pub fn stop_process(pid: i32, label: &str) {
    if !pid_alive(pid) {
        info!(pid, label, "process already exited");
        return;
    }

    if !send_signal(pid, Signal::SIGINT, label) {
        return;
    }
    if wait_for_pid_exit(pid, Duration::from_millis(1500)) {
        info!(pid, label, "process exited after SIGINT");
        return;
    }

    warn!(pid, label, "process still alive after SIGINT; sending SIGTERM");
    if !send_signal(pid, Signal::SIGTERM, label) {
        return;
    }
    if wait_for_pid_exit(pid, Duration::from_millis(1000)) {
        info!(pid, label, "process exited after SIGTERM");
        return;
    }

    error!(pid, label, "process still alive; sending SIGKILL");
    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
        error!(pid, label, error = %e, "could not SIGKILL process");
    }
    wait_for_pid_exit(pid, Duration::from_millis(500));
}

/// Send one signal, returning `false` if the escalation should stop
/// (process already gone).
fn send_signal(pid: i32, sig: Signal, label: &str) -> bool {
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => {
            info!(pid, label, ?sig, "process disappeared before signal delivery");
            false
        }
        Err(e) => {
            warn!(pid, label, ?sig, error = %e, "could not signal process");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_pid_is_not_alive() {
        // PID 0 and negative are never valid process ids to signal.
        assert!(!pid_alive(0));
        assert!(!pid_alive(-1));
    }

    #[test]
    fn unreachable_cmdline_is_not_a_match() {
        assert!(!cmdline_contains(i32::MAX, "ffmpeg"));
    }

    #[test]
    fn stop_process_on_already_dead_pid_is_a_noop() {
        // A pid that can't possibly be alive; stop_process should return
        // immediately without attempting to signal anything.
        stop_process(-1, "test");
    }
}