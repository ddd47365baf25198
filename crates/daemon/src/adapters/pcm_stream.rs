// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw PCM capture boundary. Grounded on
//! `voice_hotkey/audio_stream.py::FFmpegPCMStream`: spawn `ffmpeg`
//! reading from a configured backend/source and writing signed 16-bit
//! little-endian mono PCM to stdout, then read fixed-size frames off
//! the pipe.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use vh_core::error::VhError;

#[async_trait]
pub trait PcmStream: Send + Sync + 'static {
    async fn start(&mut self) -> Result<(), VhError>;
    async fn read_frame(&mut self) -> Result<Vec<u8>, VhError>;
    async fn stop(&mut self);
    fn frame_bytes(&self) -> usize;
}

/// Captures mono PCM via an `ffmpeg` subprocess reading from
/// `audio_backend`/`audio_source` (e.g. `pulse`/`default`,
/// `alsa`/`hw:0`), matching the original's `-f s16le -` pipeline.
pub struct FfmpegPcmStream {
    audio_backend: String,
    audio_source: String,
    sample_rate_hz: u32,
    frame_ms: u32,
    frame_bytes: usize,
    child: Option<Child>,
}

impl FfmpegPcmStream {
    pub fn new(audio_backend: impl Into<String>, audio_source: impl Into<String>, sample_rate_hz: u32, frame_ms: u32) -> Self {
        let frame_bytes = (sample_rate_hz as usize * frame_ms as usize / 1000) * 2;
        Self {
            audio_backend: audio_backend.into(),
            audio_source: audio_source.into(),
            sample_rate_hz,
            frame_ms,
            frame_bytes,
            child: None,
        }
    }
}

#[async_trait]
impl PcmStream for FfmpegPcmStream {
    async fn start(&mut self) -> Result<(), VhError> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-f", &self.audio_backend])
            .args(["-i", &self.audio_source])
            .args(["-ac", "1"])
            .args(["-ar", &self.sample_rate_hz.to_string()])
            .args(["-f", "s16le", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VhError::TransientExternal(format!("failed to spawn ffmpeg: {e}")))?;
        self.child = Some(child);
        debug!(backend = %self.audio_backend, source = %self.audio_source, "ffmpeg pcm stream started");
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>, VhError> {
        let frame_bytes = self.frame_bytes;
        let Some(child) = self.child.as_mut() else {
            return Ok(Vec::new());
        };
        let Some(stdout) = child.stdout.as_mut() else {
            return Ok(Vec::new());
        };
        let mut buf = vec![0u8; frame_bytes];
        let mut filled = 0;
        while filled < frame_bytes {
            let n = stdout
                .read(&mut buf[filled..])
                .map_err(|e| VhError::TransientExternal(format!("ffmpeg stdout read failed: {e}")))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let _ = child.kill();
        let child_id = child.id();
        let join = tokio::task::spawn_blocking(move || child.wait());
        match tokio::time::timeout(Duration::from_millis(1500), join).await {
            Ok(Ok(Ok(_))) => {}
            _ => debug!(pid = child_id, "ffmpeg stream process did not exit cleanly within timeout"),
        }
    }

    fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    pub struct FakePcmStream {
        frames: VecDeque<Vec<u8>>,
        frame_bytes: usize,
        started: bool,
    }

    impl FakePcmStream {
        pub fn new(frames: Vec<Vec<u8>>, frame_bytes: usize) -> Self {
            Self { frames: frames.into(), frame_bytes, started: false }
        }
    }

    #[async_trait]
    impl PcmStream for FakePcmStream {
        async fn start(&mut self) -> Result<(), VhError> {
            self.started = true;
            Ok(())
        }

        async fn read_frame(&mut self) -> Result<Vec<u8>, VhError> {
            Ok(self.frames.pop_front().unwrap_or_default())
        }

        async fn stop(&mut self) {
            self.started = false;
        }

        fn frame_bytes(&self) -> usize {
            self.frame_bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_bytes_matches_sample_rate_and_frame_ms() {
        let stream = FfmpegPcmStream::new("pulse", "default", 16_000, 20);
        // 16000 Hz * 20ms / 1000 * 2 bytes/sample = 640 bytes.
        assert_eq!(stream.frame_bytes(), 640);
    }
}