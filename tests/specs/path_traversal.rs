//! S6 (spec.md §8): a crafted hold-state file naming a path outside the
//! system temp root must never be touched.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::os::unix::fs::OpenOptionsExt as _;

use crate::prelude::{rc_of, Harness, SILENCE_SOURCE};

#[test]
fn traversal_tmpdir_is_rejected_without_touching_it() {
    let harness = Harness::new(SILENCE_SOURCE);

    let ping = harness.run("ping");
    assert_eq!(rc_of(&ping), 0);

    let canary = std::env::temp_dir().join("voice-hotkey-spec-s6-canary");
    std::fs::create_dir_all(&canary).unwrap();
    let canary_file = canary.join("untouched");
    std::fs::write(&canary_file, b"do not delete me").unwrap();

    let state = serde_json::json!({
        "kind": "dictate",
        "pid": 999_999_999u32,
        "started_at_unix": 0,
        "language_tag": "en",
        "wav_path": canary.join("capture.wav").to_string_lossy(),
    });
    write_private_json(&harness.dictate_state_path(), &state);

    let stop = harness.run("dictate-stop");
    assert_eq!(rc_of(&stop), 1, "a traversal-crafted state file must fail closed");

    assert!(canary_file.exists(), "the canary file outside the tmpdir must survive untouched");
    assert!(!harness.dictate_state_path().exists(), "the crafted state file should still be removed");

    std::fs::remove_dir_all(&canary).ok();
}

/// Mirrors `vh_core::hold::write_private_json` without depending on the
/// daemon's private helper: 0o600, atomic temp+rename.
fn write_private_json(path: &std::path::Path, value: &serde_json::Value) {
    use std::io::Write as _;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = std::fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(&tmp).unwrap();
        file.write_all(serde_json::to_string(value).unwrap().as_bytes()).unwrap();
    }
    std::fs::rename(&tmp, path).unwrap();
}
