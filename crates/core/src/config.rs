// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven configuration, following the `env_int`/`env_float`/
//! `env_bool` convention of the original `voice_hotkey/config.py` and the
//! `state_dir()`-style resolution of the teacher's `daemon::env` module.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

fn env_int(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_float(name: &str, default: f64) -> f64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Resolved runtime configuration. Constructed once at daemon/CLI startup
/// via [`Config::from_env`]; never mutated afterward.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,

    pub audio_seconds: u64,
    pub dictate_seconds: u64,
    pub audio_backend: String,
    pub audio_source: String,

    pub default_language: String,
    /// The other end of the `language-toggle` pair (`fi` in the
    /// original bilingual script's default). Generalized to a plain
    /// second tag rather than a fixed two-locale enum.
    pub secondary_language: String,

    pub daemon_connect_timeout: Duration,
    pub daemon_response_timeout: Duration,
    pub daemon_start_retries: u32,
    pub daemon_start_delay: Duration,
    pub daemon_max_request_bytes: usize,

    pub state_max_age: Duration,
    pub log_transcripts: bool,
    pub log_command_output_max: usize,

    pub dictation_injector: String,
    pub overlay_enabled: bool,

    pub wakeword_enabled_default: bool,
    pub wakeword_model_dir: PathBuf,
    pub wake_greeting_enabled: bool,
    pub wake_greeting_text: String,
    pub wake_chime_enabled: bool,
    pub wake_chime_file: String,
    pub wake_chime_volume: f64,

    /// Minimum gap between two wake triggers, regardless of detector
    /// output, so a lingering echo of the wake word can't immediately
    /// re-fire a session.
    pub wake_cooldown: Duration,
    /// Frame size fed to the wake detector. Independent of `vad_frame_ms`
    /// since the wake model and the endpointer can run at different
    /// granularities.
    pub wake_frame_ms: u32,
    /// Consecutive above-threshold frames required before a trigger
    /// fires, to absorb single-frame false positives.
    pub wake_min_consecutive: u32,
    pub wake_threshold: f64,
    /// How much pre-roll audio to keep buffered ahead of a trigger.
    pub wake_preroll_ms: u64,
    /// Timeout for the `wake-start` request the listener sends the
    /// daemon; short and non-retried since a dropped trigger is cheap
    /// to reissue on the next detection.
    pub wake_daemon_response_timeout: Duration,

    pub vad_frame_ms: u32,
    pub vad_rms_threshold: i64,
    pub vad_min_speech_ms: u32,
    pub vad_end_silence_ms: u32,

    /// Endpointed-capture wall-clock ceiling for `wake-start`. Separate
    /// from `audio_seconds`/`dictate_seconds` (used directly as the
    /// command/dictate ceilings) since wake's pre-roll-merged capture
    /// warrants its own bound.
    pub wake_session_max_seconds: u64,
    /// How long a `command-auto`/`dictate-auto` capture waits for the
    /// VAD to detect speech before giving up with a no-speech outcome.
    pub start_speech_timeout: Duration,
    /// Same as `start_speech_timeout`, but for `wake-start`: longer by
    /// default since a wake trigger has no hold-button to confirm the
    /// user actually meant to speak.
    pub wake_start_speech_timeout: Duration,

    pub execution_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let state_dir = resolve_state_dir()?;
        Ok(Self {
            state_dir,
            audio_seconds: env_int("VOICE_AUDIO_SECONDS", 12),
            dictate_seconds: env_int("VOICE_DICTATE_SECONDS", 6),
            audio_backend: env_string("VOICE_AUDIO_BACKEND", "pulse"),
            audio_source: env_string("VOICE_AUDIO_SOURCE", "default"),
            default_language: env_string("VOICE_DEFAULT_LANGUAGE", "en"),
            secondary_language: env_string("VOICE_SECONDARY_LANGUAGE", "fi"),
            daemon_connect_timeout: Duration::from_secs_f64(env_float(
                "VOICE_DAEMON_CONNECT_TIMEOUT",
                0.4,
            )),
            daemon_response_timeout: Duration::from_secs(env_int(
                "VOICE_DAEMON_RESPONSE_TIMEOUT",
                180,
            )),
            daemon_start_retries: env_int("VOICE_DAEMON_START_RETRIES", 40) as u32,
            daemon_start_delay: Duration::from_secs_f64(env_float(
                "VOICE_DAEMON_START_DELAY",
                0.1,
            )),
            daemon_max_request_bytes: env_int("VOICE_DAEMON_MAX_REQUEST_BYTES", 8192) as usize,
            state_max_age: Duration::from_secs(env_int("VOICE_STATE_MAX_AGE_SECONDS", 900)),
            log_transcripts: env_bool("VOICE_LOG_TRANSCRIPTS", false),
            log_command_output_max: env_int("VOICE_LOG_COMMAND_OUTPUT_MAX", 300) as usize,
            dictation_injector: env_string("VOICE_DICTATION_INJECTOR", "wtype"),
            overlay_enabled: env_bool("VOICE_OVERLAY_ENABLED", true),
            wakeword_enabled_default: env_bool("VOICE_WAKEWORD_ENABLED", false),
            wakeword_model_dir: expand_home(&env_string(
                "VOICE_WAKEWORD_MODEL_PATH",
                "~/.config/voice-hotkey/wakeword/",
            )),
            wake_greeting_enabled: env_bool("VOICE_WAKE_GREETING_ENABLED", true),
            wake_greeting_text: env_string("VOICE_WAKE_GREETING_TEXT", "hello"),
            wake_chime_enabled: env_bool("VOICE_WAKE_CHIME_ENABLED", false),
            wake_chime_file: env_string("VOICE_WAKE_CHIME_FILE", ""),
            wake_chime_volume: env_float("VOICE_WAKE_CHIME_VOLUME", 1.0),
            wake_cooldown: Duration::from_secs_f64(env_float("VOICE_WAKEWORD_COOLDOWN", 1.5)),
            wake_frame_ms: env_int("VOICE_WAKEWORD_FRAME_MS", 80) as u32,
            wake_min_consecutive: env_int("VOICE_WAKEWORD_MIN_CONSECUTIVE", 3) as u32,
            wake_threshold: env_float("VOICE_WAKEWORD_THRESHOLD", 0.5),
            wake_preroll_ms: env_int("VOICE_WAKEWORD_PREROLL_MS", 2000),
            wake_daemon_response_timeout: Duration::from_secs_f64(env_float(
                "VOICE_WAKE_DAEMON_RESPONSE_TIMEOUT",
                8.0,
            )),
            vad_frame_ms: env_int("VOICE_VAD_FRAME_MS", 30) as u32,
            vad_rms_threshold: env_int("VOICE_VAD_RMS_THRESHOLD", 500) as i64,
            vad_min_speech_ms: env_int("VOICE_VAD_MIN_SPEECH_MS", 150) as u32,
            vad_end_silence_ms: env_int("VOICE_VAD_END_SILENCE_MS", 800) as u32,
            wake_session_max_seconds: env_int("VOICE_WAKE_SESSION_MAX_SECONDS", 8),
            start_speech_timeout: Duration::from_secs_f64(env_float(
                "VOICE_START_SPEECH_TIMEOUT_SECONDS",
                3.0,
            )),
            wake_start_speech_timeout: Duration::from_secs_f64(env_float(
                "VOICE_WAKE_START_SPEECH_TIMEOUT_SECONDS",
                7.0,
            )),
            execution_queue_capacity: env_int("VOICE_EXECUTION_QUEUE_CAPACITY", 8) as usize,
        })
    }

    pub fn socket_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey.sock")
    }

    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey.log")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey.lock")
    }

    pub fn language_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey-language")
    }

    pub fn dictate_state_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey-dictate.json")
    }

    pub fn command_state_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey-command.json")
    }

    pub fn wakeword_state_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey-wakeword.json")
    }

    pub fn wake_preroll_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey-wake-preroll.pcm")
    }

    /// Marker written by the daemon for the lifetime of a `WakeSession`,
    /// mirroring the dictate/command hold state files so the wake
    /// listener can treat all three capture kinds uniformly when
    /// deciding whether a manual capture is already in flight. Unlike
    /// the hold state files this one names no subprocess pid: the
    /// session runs inside the daemon itself, so freshness alone (not
    /// liveness) is what the reader checks.
    pub fn wake_session_state_path(&self) -> PathBuf {
        self.state_dir.join("voice-hotkey-wake-session.json")
    }
}

fn resolve_state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = env::var("VOICE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs_home().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local").join("state"))
}

fn dirs_home() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_bool_accepts_common_spellings() {
        assert!(env_bool("VOICE_HOTKEY_TEST_UNSET_TRUE_LIKE", true));
        assert!(!env_bool("VOICE_HOTKEY_TEST_UNSET_FALSE_LIKE", false));
    }

    #[test]
    fn state_paths_are_flat_under_state_dir() {
        let cfg = Config {
            state_dir: PathBuf::from("/tmp/vh-test"),
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
            wakeword_model_dir: PathBuf::from("/tmp/model"),
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
        };
        assert_eq!(cfg.socket_path(), PathBuf::from("/tmp/vh-test/voice-hotkey.sock"));
        assert_eq!(cfg.lock_path(), PathBuf::from("/tmp/vh-test/voice-hotkey.lock"));
    }
}