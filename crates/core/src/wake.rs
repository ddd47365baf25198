// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data model for the wake trigger coordinator: pre-roll framing, the
//! persisted on/off toggle, and the rc-to-reason classification used for
//! rearm windows and outcome counters. Grounded on
//! `voice_hotkey/wakeword.py`.

use serde::{Deserialize, Serialize};

use crate::error::VhError;

pub const NO_SPEECH_EXIT_CODE: i32 = 3;
pub const CANCELLED_EXIT_CODE: i32 = 4;

pub const WAKEWORD_NO_SPEECH_REARM_MS: u64 = 5000;
pub const WAKEWORD_ERROR_REARM_MS: u64 = 1200;

/// Persisted wake-word enable toggle, mtime-cached by readers so a
/// frequently-polled listener doesn't stat+read on every frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WakewordState {
    pub enabled: bool,
}

impl WakewordState {
    pub fn load_or_default(path: &std::path::Path, default_enabled: bool) -> Result<Self, VhError> {
        match crate::hold::read_private_json::<Self>(path)? {
            Some(state) => Ok(state),
            None => Ok(Self { enabled: default_enabled }),
        }
    }

    pub fn save(&self, path: &std::path::Path) -> Result<(), VhError> {
        crate::hold::write_private_json(path, self)
    }
}

/// Pre-roll ring buffer serialized to disk just before a wake trigger
/// hands off to the daemon, so the endpointed capture can merge audio
/// that preceded the trigger decision. Grounded on
/// `wakeword.py::_write_wake_preroll`.
#[derive(Debug, Clone)]
pub struct WakePrerollFile {
    pub written_at_unix_ms: u128,
    pub pcm: Vec<u8>,
}

impl WakePrerollFile {
    /// A pre-roll file is only worth merging if it's fresh -- an old
    /// one lying around from a previous (possibly much earlier) trigger
    /// must not bleed into an unrelated capture.
    pub fn is_fresh(&self, now_unix_ms: u128, max_age_ms: u128) -> bool {
        now_unix_ms.saturating_sub(self.written_at_unix_ms) <= max_age_ms
    }
}

/// Marker the daemon writes for the lifetime of a `WakeSession`, read by
/// the wake listener alongside the dictate/command hold state files to
/// decide whether a manual capture is already active. The wake session
/// has no subprocess of its own to check for liveness -- it runs inside
/// the daemon's own async task -- so `is_active` only checks freshness
/// against `max_age`, the same bound `HoldSessionState` uses for a
/// crashed-owner timeout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WakeSessionMarker {
    pub started_at_unix_ms: u128,
}

impl WakeSessionMarker {
    pub fn write(path: &std::path::Path, now_unix_ms: u128) -> Result<(), VhError> {
        crate::hold::write_private_json(path, &Self { started_at_unix_ms: now_unix_ms })
    }

    pub fn clear(path: &std::path::Path) {
        let _ = std::fs::remove_file(path);
    }

    pub fn is_active(path: &std::path::Path, now_unix_ms: u128, max_age_ms: u128) -> bool {
        match crate::hold::read_private_json::<Self>(path) {
            Ok(Some(marker)) => now_unix_ms.saturating_sub(marker.started_at_unix_ms) <= max_age_ms,
            _ => false,
        }
    }
}

/// Classifies a wake-trigger request's return code into the reason
/// bucket used for per-reason outcome counters. Grounded on
/// `wakeword.py::_classify_wake_trigger_result`.
pub fn classify_wake_trigger_result(rc: i32) -> String {
    match rc {
        0 => "ok".to_string(),
        NO_SPEECH_EXIT_CODE => "no_speech".to_string(),
        CANCELLED_EXIT_CODE => "cancelled".to_string(),
        2 => "stale_daemon".to_string(),
        1 => "busy_or_error".to_string(),
        other => format!("rc_{other}"),
    }
}

/// Outcome of applying a wake-trigger result: whether to rearm and for
/// how long. Grounded on `wakeword.py::_apply_wake_trigger_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeTriggerOutcome {
    pub reason_is_ok: bool,
    pub rearm_ms: u64,
}

pub fn apply_wake_trigger_result(rc: i32) -> WakeTriggerOutcome {
    match rc {
        NO_SPEECH_EXIT_CODE => {
            WakeTriggerOutcome { reason_is_ok: false, rearm_ms: WAKEWORD_NO_SPEECH_REARM_MS }
        }
        CANCELLED_EXIT_CODE => {
            WakeTriggerOutcome { reason_is_ok: false, rearm_ms: WAKEWORD_ERROR_REARM_MS }
        }
        0 => WakeTriggerOutcome { reason_is_ok: true, rearm_ms: 0 },
        _ => WakeTriggerOutcome { reason_is_ok: false, rearm_ms: WAKEWORD_ERROR_REARM_MS },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_codes() {
        assert_eq!(classify_wake_trigger_result(0), "ok");
        assert_eq!(classify_wake_trigger_result(NO_SPEECH_EXIT_CODE), "no_speech");
        assert_eq!(classify_wake_trigger_result(CANCELLED_EXIT_CODE), "cancelled");
        assert_eq!(classify_wake_trigger_result(2), "stale_daemon");
        assert_eq!(classify_wake_trigger_result(1), "busy_or_error");
        assert_eq!(classify_wake_trigger_result(9), "rc_9");
    }

    #[test]
    fn no_speech_rearms_for_no_speech_window() {
        let outcome = apply_wake_trigger_result(NO_SPEECH_EXIT_CODE);
        assert!(!outcome.reason_is_ok);
        assert_eq!(outcome.rearm_ms, WAKEWORD_NO_SPEECH_REARM_MS);
    }

    #[test]
    fn success_does_not_rearm() {
        let outcome = apply_wake_trigger_result(0);
        assert!(outcome.reason_is_ok);
        assert_eq!(outcome.rearm_ms, 0);
    }

    #[test]
    fn preroll_freshness_window() {
        let preroll = WakePrerollFile { written_at_unix_ms: 1_000, pcm: vec![] };
        assert!(preroll.is_fresh(1_500, 1_000));
        assert!(!preroll.is_fresh(3_000, 1_000));
    }
}