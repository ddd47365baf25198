// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wake-chime playback: a fire-and-forget audible cue on trigger,
//! tried against a fallback chain of desktop audio players. Grounded on
//! `voice_hotkey/wakeword.py::_play_wake_chime` -- the `paplay` ->
//! `pw-play` -> `canberra-gtk-play` fallback order and volume scaling
//! are kept; `subprocess.Popen(..., start_new_session=True)` becomes a
//! detached `std::process::Command::spawn` whose child is immediately
//! dropped rather than awaited.
use std::process::{Command, Stdio};

use tracing::debug;

/// Players tried in order; the first one found on `PATH` wins. Each
/// entry is `(binary, volume_flag)` -- `canberra-gtk-play` has no
/// volume flag of its own, so it is tried last and silently ignores
/// `volume`.
const PLAYERS: &[(&str, Option<&str>)] =
    &[("paplay", Some("--volume")), ("pw-play", Some("--volume")), ("canberra-gtk-play", None)];

/// PulseAudio/PipeWire's `--volume` flag takes a 0..65536 integer scale
/// rather than a 0.0..1.0 float.
const PULSE_VOLUME_MAX: f64 = 65536.0;

/// Play `chime_file` (or a compiled-in default cue if empty) at
/// `volume` (0.0..1.0), trying each player in `PLAYERS` until one
/// spawns successfully. Never blocks on playback finishing and never
/// fails the caller -- a missing chime is a degraded experience, not
/// an error worth surfacing to the trigger path.
pub fn play_wake_chime(chime_file: &str, volume: f64) {
    let volume = volume.clamp(0.0, 1.0);
    for (player, volume_flag) in PLAYERS {
        let mut cmd = Command::new(player);
        if !chime_file.is_empty() {
            cmd.arg(chime_file);
        }
        if let Some(flag) = volume_flag {
            let scaled = (volume * PULSE_VOLUME_MAX).round() as i64;
            cmd.arg(flag).arg(scaled.to_string());
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        match cmd.spawn() {
            Ok(child) => {
                // Fire-and-forget: let it run past this function's
                // return, matching start_new_session=True in the
                // original.
                drop(child);
                return;
            }
            Err(e) => debug!(player, error = %e, "wake chime player unavailable"),
        }
    }
    debug!("no wake chime player found on PATH; skipping chime");
}
