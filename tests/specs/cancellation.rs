//! S4 (spec.md §8): cancellation of command-auto by command-stop.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use crate::prelude::{rc_of, Harness, TONE_SOURCE};

#[test]
fn command_stop_cancels_an_in_flight_command_auto() {
    let harness = Harness::new(TONE_SOURCE).env("VOICE_AUDIO_SECONDS", "8");

    let ping = harness.run("ping");
    assert_eq!(rc_of(&ping), 0);

    let mut auto = harness.spawn("command-auto");

    // Long enough for the capture to be underway, short enough that it
    // would not have finished on its own (session max is 8s above).
    std::thread::sleep(Duration::from_millis(400));

    let stop = harness.run("command-stop");
    assert_eq!(rc_of(&stop), 0, "command-stop should succeed");

    let status = wait_for_exit(&mut auto, Duration::from_secs(3));
    assert_eq!(status, Some(4), "a cancelled command-auto should report rc=4");

    assert!(!harness.daemon_log().contains("no speech"), "a cancellation must not be logged as a no-speech outcome");
}

fn wait_for_exit(child: &mut std::process::Child, timeout: Duration) -> Option<i32> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return status.code();
        }
        if std::time::Instant::now() >= deadline {
            let _ = child.kill();
            return None;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
