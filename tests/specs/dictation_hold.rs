//! S1 (spec.md §8): happy press-hold dictation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use crate::prelude::{rc_of, wait_for, Harness, SILENCE_SOURCE};

#[test]
fn press_hold_dictation_injects_transcript_and_cleans_up() {
    let harness = Harness::new(SILENCE_SOURCE);

    let start = harness.run("dictate-start");
    assert_eq!(rc_of(&start), 0, "dictate-start should succeed");

    // Give the capture ffmpeg a moment to produce a non-empty wav file.
    std::thread::sleep(Duration::from_millis(600));

    let stop = harness.run("dictate-stop");
    assert_eq!(rc_of(&stop), 0, "dictate-stop should succeed");

    let injected = wait_for(Duration::from_secs(2), || harness.injected_text().is_some());
    assert!(injected, "expected the stub injector to have received text");
    assert_eq!(harness.injected_text().unwrap().trim(), "hello world");

    assert!(!harness.dictate_state_path().exists(), "hold state file should be removed after stop");
}

#[test]
fn dictate_stop_with_no_active_session_is_a_no_op() {
    let harness = Harness::new(SILENCE_SOURCE);
    let stop = harness.run("dictate-stop");
    assert_eq!(rc_of(&stop), 0);
}
