//! S3 (spec.md §8): queue full.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use crate::prelude::{rc_of, wait_for, Harness, TONE_SOURCE};

#[test]
fn second_command_auto_is_refused_while_the_first_runs() {
    let harness = Harness::new(TONE_SOURCE)
        .env("VOICE_EXECUTION_QUEUE_CAPACITY", "1")
        .env("VOICE_AUDIO_SECONDS", "2");

    // Warm the daemon up first so its auto-start delay doesn't eat into
    // the window the first command-auto is expected to occupy the queue.
    let ping = harness.run("ping");
    assert_eq!(rc_of(&ping), 0);

    let mut first = harness.spawn("command-auto");

    // Give the first job a moment to actually be picked up by the worker
    // before probing queue state and submitting the second request.
    let picked_up = wait_for(Duration::from_secs(1), || {
        let status = harness.run_json("runtime-status-json");
        status.status.success() && String::from_utf8_lossy(&status.stdout).contains("command-auto")
    });
    assert!(picked_up, "expected the first command-auto to be running");

    let second = harness.run("command-auto");
    assert_eq!(rc_of(&second), 1, "a second command-auto should be refused while the queue is full");

    let first_status = first.wait().expect("first command-auto should exit");
    assert_eq!(first_status.code(), Some(0), "the first command-auto should complete successfully");

    assert!(harness.daemon_log().contains("busy"), "queue-full path should notify with a message mentioning busy");
}
