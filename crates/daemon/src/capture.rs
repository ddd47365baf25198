// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Endpointed (VAD-driven) capture, used by `command-auto`, `dictate-auto`,
//! and `wake-start`. Streams PCM frames from a [`PcmStream`], updates a
//! [`vh_core::EndpointVad`] per frame, and stops on wall-clock timeout,
//! VAD-confirmed silence after speech, or cancellation. Grounded on
//! `voice_hotkey/orchestrator.py::run_endpointed_command_session`.

use std::io::Cursor;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::info;
use vh_core::error::VhError;
use vh_core::vad::EndpointVad;

use crate::execution::CancelFlag;

pub const CANCELLED_EXIT_CODE: i32 = vh_core::wake::CANCELLED_EXIT_CODE;
pub const NO_SPEECH_EXIT_CODE: i32 = vh_core::wake::NO_SPEECH_EXIT_CODE;

/// Parameters controlling one capture session.
#[derive(Debug, Clone)]
pub struct CaptureParams {
    pub frame_ms: u32,
    pub rms_threshold: i64,
    pub min_speech_ms: u32,
    pub end_silence_ms: u32,
    pub sample_rate_hz: u32,
    pub session_max: Duration,
    /// If > 0, abort with [`CaptureOutcome::NoSpeech`] when no speech has
    /// started after this much elapsed wall-clock time.
    pub start_speech_timeout: Duration,
    /// Bound on how long a single frame read may block before the
    /// cancellation/session-max checks are re-evaluated.
    pub frame_read_timeout: Duration,
}

#[derive(Debug)]
pub enum CaptureOutcome {
    /// Speech was captured; `wav` is a 16kHz mono 16-bit WAV buffer.
    Captured { wav: Vec<u8> },
    NoSpeech,
    Cancelled,
}

/// Runs one endpointed capture loop against `stream`, optionally seeded
/// with pre-roll PCM bytes (wake-word callers merge in the ring buffer
/// captured before the trigger fired; `had_preroll_speech` short-circuits
/// the no-speech outcome even if the live stream itself stayed silent).
pub async fn run_endpointed_capture(
    stream: &mut dyn vh_core_pcm::PcmStreamLike,
    params: &CaptureParams,
    cancel: &CancelFlag,
    preroll: Option<Vec<u8>>,
    had_preroll_speech: bool,
) -> Result<CaptureOutcome, VhError> {
    let mut vad = EndpointVad::new(params.frame_ms, params.rms_threshold, params.min_speech_ms, params.end_silence_ms);
    let mut audio = preroll.unwrap_or_default();

    stream.start().await?;
    let started_at = Instant::now();

    let outcome = loop {
        if cancel.load(std::sync::atomic::Ordering::SeqCst) {
            break CaptureOutcome::Cancelled;
        }
        if started_at.elapsed() >= params.session_max {
            info!(max_secs = params.session_max.as_secs(), "endpointed capture hit session max");
            break if vad.has_started() || had_preroll_speech { finish(audio) } else { CaptureOutcome::NoSpeech };
        }
        if !vad.has_started()
            && !had_preroll_speech
            && params.start_speech_timeout > Duration::ZERO
            && started_at.elapsed() >= params.start_speech_timeout
        {
            break CaptureOutcome::NoSpeech;
        }

        let frame = match timeout(params.frame_read_timeout, stream.read_frame()).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                stream.stop().await;
                return Err(e);
            }
            Err(_) => continue, // read timed out; re-check cancel/session-max above
        };
        if frame.is_empty() {
            break if vad.has_started() || had_preroll_speech { finish(audio) } else { CaptureOutcome::NoSpeech };
        }

        audio.extend_from_slice(&frame);
        let update = vad.update(&frame);
        if update.has_started && update.endpoint {
            break finish(audio);
        }
    };

    stream.stop().await;
    Ok(outcome)
}

fn finish(audio: Vec<u8>) -> CaptureOutcome {
    CaptureOutcome::Captured { wav: encode_wav(&audio, 16_000) }
}

/// Wraps raw s16le mono PCM in a WAV container for handoff to
/// `Transcriber`. Grounded on `orchestrator.py::_write_wav`.
#[allow(clippy::expect_used)]
pub fn encode_wav(pcm: &[u8], sample_rate_hz: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buf, spec).expect("wav spec is valid");
        for chunk in pcm.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            writer.write_sample(sample).expect("in-memory wav write cannot fail");
        }
        writer.finalize().expect("in-memory wav finalize cannot fail");
    }
    buf.into_inner()
}

/// Thin re-export boundary so `capture.rs` depends on the `PcmStream`
/// trait without importing the whole `adapters` module path at every
/// call site.
pub mod vh_core_pcm {
    pub use crate::adapters::pcm_stream::PcmStream as PcmStreamLike;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::pcm_stream::fake::FakePcmStream;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn silence_frame(bytes: usize) -> Vec<u8> {
        vec![0u8; bytes]
    }

    fn loud_frame(bytes: usize) -> Vec<u8> {
        let mut v = Vec::with_capacity(bytes);
        while v.len() < bytes {
            v.extend_from_slice(&30_000i16.to_le_bytes());
        }
        v
    }

    fn params() -> CaptureParams {
        CaptureParams {
            frame_ms: 20,
            rms_threshold: 500,
            min_speech_ms: 40,
            end_silence_ms: 60,
            sample_rate_hz: 16_000,
            session_max: Duration::from_secs(5),
            start_speech_timeout: Duration::from_millis(500),
            frame_read_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn all_silence_times_out_to_no_speech() {
        let frame_bytes = 640;
        let frames = vec![silence_frame(frame_bytes); 40];
        let mut stream = FakePcmStream::new(frames, frame_bytes);
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let outcome = run_endpointed_capture(&mut stream, &params(), &cancel, None, false).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::NoSpeech));
    }

    #[tokio::test]
    async fn speech_then_silence_endpoints_with_audio() {
        let frame_bytes = 640;
        let mut frames = vec![loud_frame(frame_bytes); 4];
        frames.extend(vec![silence_frame(frame_bytes); 6]);
        let mut stream = FakePcmStream::new(frames, frame_bytes);
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let outcome = run_endpointed_capture(&mut stream, &params(), &cancel, None, false).await.unwrap();
        match outcome {
            CaptureOutcome::Captured { wav } => assert!(!wav.is_empty()),
            other => panic!("expected captured audio, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_flag_stops_capture_promptly() {
        let frame_bytes = 640;
        let frames = vec![loud_frame(frame_bytes); 100];
        let mut stream = FakePcmStream::new(frames, frame_bytes);
        let cancel: CancelFlag = Arc::new(AtomicBool::new(true));
        let outcome = run_endpointed_capture(&mut stream, &params(), &cancel, None, false).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::Cancelled));
    }

    #[tokio::test]
    async fn preroll_speech_flag_prevents_no_speech_on_empty_stream() {
        let frame_bytes = 640;
        let frames = vec![silence_frame(frame_bytes); 2];
        let mut stream = FakePcmStream::new(frames, frame_bytes);
        let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
        let outcome =
            run_endpointed_capture(&mut stream, &params(), &cancel, Some(loud_frame(frame_bytes)), true).await.unwrap();
        assert!(matches!(outcome, CaptureOutcome::Captured { .. }));
    }
}
