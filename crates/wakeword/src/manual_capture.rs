// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-fire check: is a manual (dictate, command, or wake) capture
//! already in flight? Grounded on
//! `voice_hotkey/wakeword.py::_manual_capture_active`, which reads the
//! same three state files before letting a detection reach the
//! trigger step, so a press-and-hold the user is actively performing
//! is never interrupted by a wake detection racing it.

use std::time::{SystemTime, UNIX_EPOCH};

use vh_core::config::Config;
use vh_core::hold::{read_private_json, HoldSessionState};
use vh_core::wake::WakeSessionMarker;
use vh_daemon::signal::{cmdline_contains, pid_alive};

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn now_unix_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

fn hold_state_active(path: &std::path::Path, max_age_secs: u64) -> bool {
    let Ok(Some(state)) = read_private_json::<HoldSessionState>(path) else { return false };
    if state.age_secs(now_unix()) > max_age_secs {
        return false;
    }
    pid_alive(state.pid as i32) && cmdline_contains(state.pid as i32, "ffmpeg")
}

/// True if a dictate hold, command hold, or wake session is currently
/// active, per the same state files and liveness rules the daemon
/// itself uses to decide whether a hold is stale.
pub fn is_manual_capture_active(config: &Config) -> bool {
    let max_age = config.state_max_age.as_secs();
    hold_state_active(&config.dictate_state_path(), max_age)
        || hold_state_active(&config.command_state_path(), max_age)
        || WakeSessionMarker::is_active(&config.wake_session_state_path(), now_unix_ms(), max_age as u128 * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vh_core::hold::HoldKind;
    use vh_core::test_support::test_config;

    #[test]
    fn absent_state_files_mean_no_active_capture() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        assert!(!is_manual_capture_active(&config));
    }

    #[test]
    fn stale_hold_state_is_not_active() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut state = HoldSessionState::new(HoldKind::Dictate, u32::MAX, "en", "/tmp/x.wav");
        state.started_at_unix = 0; // far in the past
        vh_core::hold::write_private_json(&config.dictate_state_path(), &state).unwrap();
        assert!(!is_manual_capture_active(&config));
    }
}
