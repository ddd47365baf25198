// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only builders shared across crates, gated behind
//! `test-support`/`cfg(test)` the way the teacher's `oj_core::test_support`
//! is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::hold::{HoldKind, HoldSessionState};

pub fn sample_hold_session(kind: HoldKind) -> HoldSessionState {
    HoldSessionState::new(kind, 4242, "en", "/tmp/voice-hotkey-test.wav")
}

/// A fully-populated [`Config`] rooted at `state_dir`, for tests that
/// need a real `Config` without going through `from_env` (and its
/// attendant env-var mutation across parallel test threads).
pub fn test_config(state_dir: impl Into<PathBuf>) -> Config {
    Config {
        state_dir: state_dir.into(),
        audio_seconds: 12,
        dictate_seconds: 6,
        audio_backend: "pulse".into(),
        audio_source: "default".into(),
        default_language: "en".into(),
        secondary_language: "fi".into(),
        daemon_connect_timeout: Duration::from_millis(400),
        daemon_response_timeout: Duration::from_secs(180),
        daemon_start_retries: 40,
        daemon_start_delay: Duration::from_millis(100),
        daemon_max_request_bytes: 8192,
        state_max_age: Duration::from_secs(900),
        log_transcripts: false,
        log_command_output_max: 300,
        dictation_injector: "wtype".into(),
        overlay_enabled: true,
        wakeword_enabled_default: false,
        wakeword_model_dir: Path::new("/tmp/model").to_path_buf(),
        wake_greeting_enabled: true,
        wake_greeting_text: "hello".into(),
        wake_chime_enabled: false,
        wake_chime_file: String::new(),
        wake_chime_volume: 1.0,
        wake_cooldown: Duration::from_millis(1500),
        wake_frame_ms: 80,
        wake_min_consecutive: 3,
        wake_threshold: 0.5,
        wake_preroll_ms: 2000,
        wake_daemon_response_timeout: Duration::from_secs(8),
        vad_frame_ms: 30,
        vad_rms_threshold: 500,
        vad_min_speech_ms: 150,
        vad_end_silence_ms: 800,
        wake_session_max_seconds: 8,
        start_speech_timeout: Duration::from_secs(3),
        wake_start_speech_timeout: Duration::from_secs_f64(7.0),
        execution_queue_capacity: 8,
    }
}