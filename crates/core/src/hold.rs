// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hold-session data model and the atomic, restrictive-permission
//! state-file write helper every persisted state file in this workspace
//! uses. Grounded on `voice_hotkey/state_utils.py::write_private_text`.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::VhError;

/// Which hold gesture a [`HoldSessionState`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldKind {
    Command,
    Dictate,
}

impl HoldKind {
    pub fn start_action(self) -> &'static str {
        match self {
            HoldKind::Command => "command-start",
            HoldKind::Dictate => "dictate-start",
        }
    }

    pub fn stop_action(self) -> &'static str {
        match self {
            HoldKind::Command => "command-stop",
            HoldKind::Dictate => "dictate-stop",
        }
    }
}

/// Persisted descriptor for an in-flight press-and-hold capture,
/// written to the kind-specific state file so a second `*-stop` call
/// (or a crash-recovery sweep) can find the capturing subprocess.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoldSessionState {
    pub kind: HoldKind,
    pub pid: u32,
    /// Seconds since the Unix epoch when capture started.
    pub started_at_unix: u64,
    pub language_tag: String,
    pub wav_path: String,
}

impl HoldSessionState {
    pub fn new(kind: HoldKind, pid: u32, language_tag: impl Into<String>, wav_path: impl Into<String>) -> Self {
        let started_at_unix =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        Self { kind, pid, started_at_unix, language_tag: language_tag.into(), wav_path: wav_path.into() }
    }

    pub fn age_secs(&self, now_unix: u64) -> u64 {
        now_unix.saturating_sub(self.started_at_unix)
    }
}

/// Atomically write `content` to `path` with mode 0600: write to a
/// sibling temp file, fsync, chmod, then rename over the destination.
/// Never leaves a partially-written file at `path`.
pub fn write_private_bytes(path: &Path, content: &[u8]) -> Result<(), VhError> {
    let parent = path.parent().ok_or_else(|| VhError::Fatal("state path has no parent".into()))?;
    fs::create_dir_all(parent)?;

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("state");
    let tmp_path = parent.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let write_result = (|| -> std::io::Result<()> {
        let mut f = File::create(&tmp_path)?;
        f.write_all(content)?;
        f.flush()?;
        f.sync_all()?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    write_result?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

pub fn write_private_json<T: Serialize>(path: &Path, value: &T) -> Result<(), VhError> {
    let content = serde_json::to_vec_pretty(value)?;
    write_private_bytes(path, &content)
}

pub fn read_private_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, VhError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reads the plain-text language tag file, falling back to `default` if
/// it doesn't exist yet.
pub fn read_language_tag(path: &Path, default: &str) -> Result<String, VhError> {
    match fs::read_to_string(path) {
        Ok(tag) => Ok(tag.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default.to_string()),
        Err(e) => Err(e.into()),
    }
}

pub fn write_language_tag(path: &Path, tag: &str) -> Result<(), VhError> {
    write_private_bytes(path, tag.trim().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn roundtrips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = HoldSessionState::new(HoldKind::Command, 1234, "en", "/tmp/x.wav");
        write_private_json(&path, &state).unwrap();

        let loaded: HoldSessionState = read_private_json(&path).unwrap().unwrap();
        assert_eq!(loaded, state);

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let loaded: Option<HoldSessionState> = read_private_json(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn language_tag_roundtrips_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice-hotkey-language");
        assert_eq!(read_language_tag(&path, "en").unwrap(), "en");
        write_language_tag(&path, "fi").unwrap();
        assert_eq!(read_language_tag(&path, "en").unwrap(), "fi");
    }

    #[test]
    fn no_leftover_tmp_file_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_private_bytes(&path, b"hello").unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}