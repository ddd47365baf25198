// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Speech-to-text boundary. The concrete engine (faster-whisper, a
//! whisper.cpp server, ...) is explicitly out of scope; this trait is
//! the interface the rest of the daemon is written against. Grounded on
//! `voice_hotkey/stt.py`'s model selection and warm-up shape, without
//! depending on any particular backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};
use vh_core::error::VhError;

/// Transcribes a captured WAV file to text for a given language and
/// model name. `warm` is called once at daemon startup (fire-and-forget,
/// failures are logged but non-fatal) so the first real request doesn't
/// pay a cold model-load cost.
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    async fn transcribe(&self, wav_path: &Path, language_tag: &str, model_name: &str) -> Result<String, VhError>;

    async fn warm(&self, _model_name: &str) -> Result<(), VhError> {
        Ok(())
    }
}

/// Shells out to an external transcription command (`VOICE_TRANSCRIBE_CMD`,
/// one process per call) and reads the transcript off its stdout. The
/// actual speech model (faster-whisper, whisper.cpp, ...) lives entirely
/// behind that command, matching `stt.py`'s model selection and warm-up
/// shape without this daemon ever loading a model itself. Invoked as
/// `<cmd> <wav_path> --language <tag> --model <model_name>`.
pub struct ShellTranscriber {
    command: String,
    timeout: Duration,
}

impl ShellTranscriber {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self { command: command.into(), timeout }
    }
}

#[async_trait]
impl Transcriber for ShellTranscriber {
    async fn transcribe(&self, wav_path: &Path, language_tag: &str, model_name: &str) -> Result<String, VhError> {
        let run = tokio::process::Command::new(&self.command)
            .arg(wav_path)
            .args(["--language", language_tag])
            .args(["--model", model_name])
            .output();
        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(VhError::TransientExternal(format!("failed to spawn {}: {e}", self.command))),
            Err(_) => return Err(VhError::TransientExternal(format!("{} timed out", self.command))),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(rc = output.status.code(), %stderr, "transcriber command exited non-zero");
            return Err(VhError::TransientExternal(format!("{} exited non-zero", self.command)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn warm(&self, model_name: &str) -> Result<(), VhError> {
        let run = tokio::process::Command::new(&self.command).args(["--warm", "--model", model_name]).output();
        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                warn!(rc = output.status.code(), "transcriber warm-up exited non-zero");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "transcriber warm-up failed to spawn");
                Ok(())
            }
            Err(_) => {
                error!("transcriber warm-up timed out");
                Ok(())
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    pub struct TranscribeCall {
        pub wav_path: std::path::PathBuf,
        pub language_tag: String,
        pub model_name: String,
    }

    pub struct FakeTranscriber {
        calls: Mutex<Vec<TranscribeCall>>,
        response: Mutex<Result<String, String>>,
    }

    impl FakeTranscriber {
        pub fn new(response: impl Into<String>) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), response: Mutex::new(Ok(response.into())) })
        }

        pub fn failing(message: impl Into<String>) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), response: Mutex::new(Err(message.into())) })
        }

        pub fn calls(&self) -> Vec<TranscribeCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, wav_path: &Path, language_tag: &str, model_name: &str) -> Result<String, VhError> {
            self.calls.lock().push(TranscribeCall {
                wav_path: wav_path.to_path_buf(),
                language_tag: language_tag.to_string(),
                model_name: model_name.to_string(),
            });
            match &*self.response.lock() {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(VhError::TransientExternal(message.clone())),
            }
        }
    }
}