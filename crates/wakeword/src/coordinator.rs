// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wake trigger coordinator's main loop: a continuous capture
//! stream scored against one or more wake-word models, gated by a
//! manual-capture-active check and a cooldown/rearm window, handing
//! off to the daemon's `wake-start` over the socket on a confirmed
//! trigger. Grounded on `voice_hotkey/wakeword.py::_wakeword_loop`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vh_core::config::Config;
use vh_core::wake::{apply_wake_trigger_result, classify_wake_trigger_result, WakewordState};
use vh_core::DaemonClient;
use vh_daemon::adapters::pcm_stream::{FfmpegPcmStream, PcmStream};

use crate::chime::play_wake_chime;
use crate::detector::WakeDetector;
use crate::manual_capture::is_manual_capture_active;

/// How long an above-threshold streak must persist before the stream
/// is considered unhealthy and restarted, mirroring
/// `wakeword.py`'s `empty_frame_restart_threshold = max(8, 2000 // frame_ms)`.
fn empty_frame_restart_threshold(frame_ms: u32) -> u32 {
    (2000 / frame_ms.max(1)).max(8)
}

/// How often a "manual capture active, skipping" log line may repeat.
const SKIP_LOG_INTERVAL: Duration = Duration::from_secs(2);

struct PrerollBuffer {
    bytes: VecDeque<u8>,
    cap: usize,
}

impl PrerollBuffer {
    fn new(cap_bytes: usize) -> Self {
        Self { bytes: VecDeque::with_capacity(cap_bytes), cap: cap_bytes }
    }

    fn push(&mut self, frame: &[u8]) {
        self.bytes.extend(frame);
        while self.bytes.len() > self.cap {
            self.bytes.pop_front();
        }
    }

    fn snapshot(&self) -> Vec<u8> {
        self.bytes.iter().copied().collect()
    }
}

/// Runs until `shutdown` is cancelled. Polls the wakeword-enabled
/// toggle each loop iteration (mtime-cached by [`WakewordState`]'s
/// caller) so `wakeword-enable`/`wakeword-disable` take effect without
/// restarting this process.
pub async fn run(config: Config, mut detector: Box<dyn WakeDetector>, shutdown: CancellationToken) {
    info!(models = ?detector.model_names(), "wake trigger coordinator starting");

    let frame_bytes = (16_000usize * config.wake_frame_ms as usize / 1000) * 2;
    let preroll_cap_bytes = (16_000usize * config.wake_preroll_ms as usize / 1000) * 2;
    let restart_threshold = empty_frame_restart_threshold(config.wake_frame_ms);

    let mut preroll = PrerollBuffer::new(preroll_cap_bytes);
    let mut streaks: HashMap<String, u32> = HashMap::new();
    let mut cooldown_until: Option<Instant> = None;
    let mut last_skip_log: Option<Instant> = None;
    let mut empty_frame_count = 0u32;

    let mut stream = FfmpegPcmStream::new(config.audio_backend.clone(), config.audio_source.clone(), 16_000, config.wake_frame_ms);
    let mut stream_started = false;

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        if !WakewordState::load_or_default(&config.wakeword_state_path(), config.wakeword_enabled_default)
            .map(|s| s.enabled)
            .unwrap_or(config.wakeword_enabled_default)
        {
            if stream_started {
                stream.stop().await;
                stream_started = false;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                _ = shutdown.cancelled() => break,
            }
            continue;
        }

        if !stream_started {
            if let Err(e) = stream.start().await {
                warn!(error = %e, "wake stream failed to start; retrying shortly");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            stream_started = true;
            empty_frame_count = 0;
        }

        let frame = match stream.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "wake stream read failed; restarting stream");
                stream.stop().await;
                stream_started = false;
                continue;
            }
        };

        if frame.is_empty() {
            empty_frame_count += 1;
            if empty_frame_count >= restart_threshold {
                warn!(frame_bytes, "wake stream produced no data; restarting");
                stream.stop().await;
                stream_started = false;
            }
            continue;
        }
        empty_frame_count = 0;
        preroll.push(&frame);

        if is_manual_capture_active(&config) {
            if last_skip_log.map(|t| t.elapsed() >= SKIP_LOG_INTERVAL).unwrap_or(true) {
                debug!("manual capture active; skipping wake-word scoring");
                last_skip_log = Some(Instant::now());
            }
            streaks.clear();
            continue;
        }

        if let Some(until) = cooldown_until {
            if Instant::now() < until {
                continue;
            }
            cooldown_until = None;
        }

        let samples = bytes_to_i16(&frame);
        let scores = match detector.score_frame(&samples) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "wake detector scoring failed");
                continue;
            }
        };

        let mut triggered_model = None;
        for score in &scores {
            let streak = streaks.entry(score.model_name.clone()).or_insert(0);
            if score.score >= config.wake_threshold as f32 {
                *streak += 1;
                if *streak >= config.wake_min_consecutive {
                    triggered_model = Some(score.model_name.clone());
                }
            } else {
                *streak = 0;
            }
        }

        let Some(model_name) = triggered_model else { continue };
        streaks.clear();
        info!(model = %model_name, "wake word triggered");

        if config.wake_chime_enabled {
            play_wake_chime(&config.wake_chime_file, config.wake_chime_volume);
        }

        if let Err(e) = std::fs::write(config.wake_preroll_path(), preroll.snapshot()) {
            warn!(error = %e, "failed to persist wake pre-roll buffer");
        }

        stream.stop().await;
        stream_started = false;

        let rc = fire_wake_trigger(&config).await;
        let reason = classify_wake_trigger_result(rc);
        let outcome = apply_wake_trigger_result(rc);
        info!(rc, reason, "wake trigger result");
        if !outcome.reason_is_ok {
            cooldown_until = Some(Instant::now() + Duration::from_millis(outcome.rearm_ms));
        } else {
            cooldown_until = Some(Instant::now() + config.wake_cooldown);
        }
    }

    if stream_started {
        stream.stop().await;
    }
    info!("wake trigger coordinator stopped");
}

/// Issue `wake-start` to the daemon with a short connect timeout, a
/// single retry, and no auto-start -- a dropped trigger costs nothing
/// but reissuing on the next detection. Returns a classification-ready
/// rc: `1` for anything that kept the request from completing
/// (daemon not running, timed out, protocol error).
async fn fire_wake_trigger(config: &Config) -> i32 {
    let client = match DaemonClient::connect_limited(config.socket_path(), Duration::from_millis(200), 1).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "could not reach daemon for wake trigger");
            return 1;
        }
    };
    match client.send("wake-start", false, config.wake_daemon_response_timeout).await {
        Ok(resp) => resp.rc,
        Err(e) => {
            warn!(error = %e, "wake-start request failed");
            1
        }
    }
}

fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_threshold_has_a_floor() {
        assert_eq!(empty_frame_restart_threshold(500), 8);
        assert_eq!(empty_frame_restart_threshold(20), 100);
    }

    #[test]
    fn preroll_buffer_caps_at_configured_size() {
        let mut buf = PrerollBuffer::new(4);
        buf.push(&[1, 2, 3]);
        buf.push(&[4, 5, 6]);
        assert_eq!(buf.snapshot(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn bytes_to_i16_round_trips() {
        let samples = bytes_to_i16(&30_000i16.to_le_bytes());
        assert_eq!(samples, vec![30_000]);
    }
}
