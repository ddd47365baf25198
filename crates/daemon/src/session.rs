// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Press-and-hold capture manager: start launches an unbounded ffmpeg
//! capture and persists a descriptor; stop reads the descriptor back,
//! escalates signals against the recorded pid, waits for the audio file
//! to fill, and hands it to the transcriber. Grounded on
//! `live/.local/bin/voice-hotkey.py::{start_press_hold_dictation,
//! start_press_hold_command, stop_press_hold_dictation,
//! stop_press_hold_command}`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};
use vh_core::error::VhError;
use vh_core::hold::{HoldKind, HoldSessionState};

use crate::paths::{new_session_dir, validate_session_paths};
use crate::process_registry::ProcessRegistry;
use crate::signal::{cmdline_contains, pid_alive, stop_process};

/// Outcome reported back to the caller (router) after a stop call.
#[derive(Debug)]
pub enum StopOutcome {
    /// No session was active; a friendly no-op.
    NoActiveSession,
    /// The persisted descriptor referenced paths that failed validation.
    InvalidState,
    /// Capture produced no audio.
    NoSpeech,
    /// Capture succeeded; `wav_path` holds the recorded audio for the
    /// caller to hand to the transcriber. `tmpdir` is returned so the
    /// caller can clean it up only after transcription. `language_tag`
    /// is carried over from the descriptor written at session start.
    Captured { wav_path: PathBuf, tmpdir: PathBuf, language_tag: String },
}

pub struct HoldSessionManager {
    kind: HoldKind,
    state_path: PathBuf,
    audio_backend: String,
    audio_source: String,
    sample_rate_hz: u32,
    state_max_age: Duration,
    registry: std::sync::Arc<ProcessRegistry>,
}

impl HoldSessionManager {
    pub fn new(
        kind: HoldKind,
        state_path: PathBuf,
        audio_backend: impl Into<String>,
        audio_source: impl Into<String>,
        sample_rate_hz: u32,
        state_max_age: Duration,
        registry: std::sync::Arc<ProcessRegistry>,
    ) -> Self {
        Self {
            kind,
            state_path,
            audio_backend: audio_backend.into(),
            audio_source: audio_source.into(),
            sample_rate_hz,
            state_max_age,
            registry,
        }
    }

    /// Start a new hold capture, preempting any session left over from a
    /// previous (possibly crashed) invocation of the same kind first.
    pub fn start(&self, language_tag: &str) -> Result<(), VhError> {
        self.preempt_existing();

        let prefix = match self.kind {
            HoldKind::Command => "voice-hotkey-command",
            HoldKind::Dictate => "voice-hotkey-dictate",
        };
        let (tmpdir, wav_path) = new_session_dir(prefix)?;

        let child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", &self.audio_backend])
            .args(["-i", &self.audio_source])
            .args(["-ac", "1"])
            .args(["-ar", &self.sample_rate_hz.to_string()])
            .arg(&wav_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VhError::TransientExternal(format!("failed to spawn capture ffmpeg: {e}")))?;
        let pid = child.id() as i32;
        // `child` is allowed to drop here without `.wait()`: this capture
        // is unbounded-duration by design, `stop` reaps it by pid via
        // signals rather than through this handle, matching the
        // original's fire-and-forget `Popen` shape.
        drop(child);
        self.registry.register(pid, format!("{:?}-hold", self.kind));

        let started_at_unix = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        let state = HoldSessionState {
            kind: self.kind,
            pid: pid as u32,
            started_at_unix,
            language_tag: language_tag.to_string(),
            wav_path: wav_path.to_string_lossy().into_owned(),
        };
        vh_core::hold::write_private_json(&self.state_path, &state)?;
        info!(pid, kind = ?self.kind, ?wav_path, "hold session started");
        Ok(())
    }

    /// Stop the active session (if any), escalate signals, wait for
    /// audio, and report the outcome.
    pub fn stop(&self) -> StopOutcome {
        let Ok(Some(state)) = vh_core::hold::read_private_json::<HoldSessionState>(&self.state_path) else {
            return StopOutcome::NoActiveSession;
        };

        let wav_path = PathBuf::from(&state.wav_path);
        let tmpdir = match wav_path.parent() {
            Some(p) => p.to_path_buf(),
            None => {
                self.cleanup(&state);
                return StopOutcome::InvalidState;
            }
        };
        if !validate_session_paths(&tmpdir, &wav_path) {
            warn!(pid = state.pid, "hold session paths failed validation; refusing to touch them");
            self.cleanup(&state);
            return StopOutcome::InvalidState;
        }

        let now_unix = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        let identity_label = match self.kind {
            HoldKind::Command => "ffmpeg",
            HoldKind::Dictate => "ffmpeg",
        };
        let should_signal = pid_alive(state.pid as i32)
            && cmdline_contains(state.pid as i32, identity_label)
            && cmdline_contains(state.pid as i32, &state.wav_path)
            && state.age_secs(now_unix) <= self.state_max_age.as_secs();

        if should_signal {
            stop_process(state.pid as i32, &format!("{:?}-hold", self.kind));
        } else {
            info!(pid = state.pid, "hold session pid stale or identity mismatch; skipping signal");
        }
        self.registry.reap(state.pid as i32);

        let has_audio = wait_for_nonempty(&wav_path, Duration::from_secs(2));
        self.cleanup_descriptor();

        if !has_audio {
            self.cleanup_tmpdir(&tmpdir);
            return StopOutcome::NoSpeech;
        }
        StopOutcome::Captured { wav_path, tmpdir, language_tag: state.language_tag }
    }

    fn preempt_existing(&self) {
        if let Ok(Some(_)) = vh_core::hold::read_private_json::<HoldSessionState>(&self.state_path) {
            info!(kind = ?self.kind, "preempting existing hold session before start");
            let outcome = self.stop();
            if let StopOutcome::Captured { tmpdir, .. } = outcome {
                self.cleanup_tmpdir(&tmpdir);
            }
        }
    }

    fn cleanup(&self, state: &HoldSessionState) {
        self.registry.reap(state.pid as i32);
        self.cleanup_descriptor();
    }

    fn cleanup_descriptor(&self) {
        let _ = std::fs::remove_file(&self.state_path);
    }

    pub fn cleanup_tmpdir(&self, tmpdir: &Path) {
        let _ = std::fs::remove_dir_all(tmpdir);
    }

    /// Whether a (possibly stale) session descriptor is currently on
    /// disk, used by the stop-vs-cancel-only admission check in the
    /// router.
    pub fn has_active_descriptor(&self) -> bool {
        self.state_path.exists()
    }
}

fn wait_for_nonempty(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(meta) = std::fs::metadata(path) {
            if meta.len() > 0 {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path) -> HoldSessionManager {
        HoldSessionManager::new(
            HoldKind::Dictate,
            dir.join("voice-hotkey-dictate.json"),
            "pulse",
            "default",
            16_000,
            Duration::from_secs(900),
            std::sync::Arc::new(ProcessRegistry::new()),
        )
    }

    #[test]
    fn stop_with_no_descriptor_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        assert!(matches!(mgr.stop(), StopOutcome::NoActiveSession));
    }

    #[test]
    fn stop_with_invalid_tmpdir_reports_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let state = HoldSessionState::new(HoldKind::Dictate, 999_999, "en", "/tmp-evil/session/capture.wav");
        vh_core::hold::write_private_json(&mgr.state_path, &state).unwrap();
        assert!(matches!(mgr.stop(), StopOutcome::InvalidState));
        assert!(!mgr.state_path.exists());
    }

    #[test]
    fn stop_with_empty_audio_file_reports_no_speech() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let (tmpdir, wav_path) = new_session_dir("voice-hotkey-test").unwrap();
        std::fs::write(&wav_path, []).unwrap();
        let state = HoldSessionState::new(HoldKind::Dictate, 999_999, "en", wav_path.to_string_lossy());
        vh_core::hold::write_private_json(&mgr.state_path, &state).unwrap();
        assert!(matches!(mgr.stop(), StopOutcome::NoSpeech));
        assert!(!tmpdir.exists());
    }

    #[test]
    fn stop_with_nonempty_audio_file_reports_captured() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let (tmpdir, wav_path) = new_session_dir("voice-hotkey-test").unwrap();
        std::fs::write(&wav_path, [0u8; 32]).unwrap();
        let state = HoldSessionState::new(HoldKind::Dictate, 999_999, "en", wav_path.to_string_lossy());
        vh_core::hold::write_private_json(&mgr.state_path, &state).unwrap();
        match mgr.stop() {
            StopOutcome::Captured { wav_path: got, tmpdir: got_dir, language_tag } => {
                assert_eq!(got, wav_path);
                assert_eq!(got_dir, tmpdir);
                assert_eq!(language_tag, "en");
            }
            other => panic!("expected captured, got {other:?}"),
        }
        mgr.cleanup_tmpdir(&tmpdir);
    }
}
