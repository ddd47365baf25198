// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wake-word scoring boundary. The concrete engine (openWakeWord and
//! whatever ONNX/TFLite models a user drops into the model directory)
//! is explicitly out of scope for this crate's core logic; this trait
//! is the interface the coordinator loop is written against, matching
//! the out-of-scope-collaborator shape `vh_daemon::adapters::Transcriber`
//! uses for the speech engine. Grounded on `voice_hotkey/wakeword.py`'s
//! model discovery (`.onnx` preferred, `.tflite` warned) and per-model
//! streak tracking.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no wake-word models found under {0}")]
    NoModels(PathBuf),
    #[error("failed to load model {0}: {1}")]
    LoadFailed(PathBuf, String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// One model's score for the most recently scored frame.
#[derive(Debug, Clone)]
pub struct ModelScore {
    pub model_name: String,
    pub score: f32,
}

/// Scores incoming 16kHz mono PCM frames against one or more loaded
/// wake-word models. A detector owns its own frame buffering, since
/// model input windows (openWakeWord's melspectrogram pipeline, a raw
/// ONNX classifier, ...) need not line up with the capture frame size.
pub trait WakeDetector: Send {
    fn model_names(&self) -> &[String];
    fn score_frame(&mut self, frame: &[i16]) -> Result<Vec<ModelScore>, DetectorError>;
}

/// Discover model files under `dir`: `.onnx` files are usable, `.tflite`
/// files are logged as present-but-unsupported (no pure-Rust TFLite
/// runtime is in this workspace's dependency stack), matching
/// `wakeword.py::_discover_models`'s preference order.
pub fn discover_model_paths(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut onnx = Vec::new();
    let mut tflite_count = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("onnx") => onnx.push(path),
            Some("tflite") => tflite_count += 1,
            _ => {}
        }
    }
    if tflite_count > 0 {
        warn!(count = tflite_count, dir = ?dir, "found .tflite wake-word models; only .onnx is supported here");
    }
    onnx
}

#[cfg(feature = "onnx")]
pub mod onnx_detector {
    use super::*;
    use ndarray::Array2;
    use ort::session::builder::SessionBuilder;
    use ort::session::Session;
    use ort::value::Value;

    struct LoadedModel {
        name: String,
        session: Session,
        input_name: String,
        output_name: String,
        window: usize,
        buffer: Vec<f32>,
    }

    /// One ONNX session per discovered model file, each scored
    /// independently against its own sliding window of samples.
    /// Grounded on `dictum-core/src/vad/silero.rs::SileroVad` -- the
    /// `ort::session::Session` construction and input/output tensor
    /// name resolution are reused verbatim; the LSTM/GRU recurrent
    /// state handling has no counterpart here since a wake-word
    /// classifier head is treated as stateless between windows.
    pub struct OnnxWakeDetector {
        names: Vec<String>,
        models: Vec<LoadedModel>,
    }

    impl OnnxWakeDetector {
        pub fn load(model_paths: &[PathBuf], window_samples: usize) -> Result<Self, DetectorError> {
            if model_paths.is_empty() {
                return Err(DetectorError::NoModels(PathBuf::from(".")));
            }
            let mut models = Vec::with_capacity(model_paths.len());
            let mut names = Vec::with_capacity(model_paths.len());
            for path in model_paths {
                let session = SessionBuilder::new()
                    .map_err(|e| DetectorError::LoadFailed(path.clone(), e.to_string()))?
                    .commit_from_file(path)
                    .map_err(|e| DetectorError::LoadFailed(path.clone(), e.to_string()))?;

                let input_names: Vec<String> = session.inputs().iter().map(|o| o.name().to_string()).collect();
                let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
                let input_name = resolve_name(&input_names, &["input", "audio", "x"])
                    .or_else(|| input_names.first().cloned())
                    .ok_or_else(|| DetectorError::LoadFailed(path.clone(), "model has no inputs".to_string()))?;
                let output_name = resolve_name(&output_names, &["output", "score", "prob"])
                    .or_else(|| output_names.first().cloned())
                    .ok_or_else(|| DetectorError::LoadFailed(path.clone(), "model has no outputs".to_string()))?;

                let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("model").to_string();
                names.push(name.clone());
                models.push(LoadedModel {
                    name,
                    session,
                    input_name,
                    output_name,
                    window: window_samples,
                    buffer: Vec::new(),
                });
            }
            Ok(Self { names, models })
        }
    }

    fn resolve_name(candidates: &[String], preferred: &[&str]) -> Option<String> {
        preferred.iter().find_map(|needle| candidates.iter().find(|n| n.eq_ignore_ascii_case(needle)).cloned())
    }

    impl WakeDetector for OnnxWakeDetector {
        fn model_names(&self) -> &[String] {
            &self.names
        }

        fn score_frame(&mut self, frame: &[i16]) -> Result<Vec<ModelScore>, DetectorError> {
            let samples: Vec<f32> = frame.iter().map(|s| *s as f32 / i16::MAX as f32).collect();
            let mut scores = Vec::with_capacity(self.models.len());
            for model in &mut self.models {
                model.buffer.extend_from_slice(&samples);
                if model.buffer.len() < model.window {
                    continue;
                }
                let window: Vec<f32> = model.buffer[model.buffer.len() - model.window..].to_vec();
                model.buffer.clear();

                let input_arr = Array2::<f32>::from_shape_vec((1, model.window), window)
                    .map_err(|e| DetectorError::Inference(e.to_string()))?;
                let input_val =
                    Value::from_array(input_arr).map_err(|e: ort::Error| DetectorError::Inference(e.to_string()))?;
                let outputs = model
                    .session
                    .run(vec![(model.input_name.clone(), input_val.into())])
                    .map_err(|e| DetectorError::Inference(e.to_string()))?;
                let output = outputs.get(model.output_name.as_str()).unwrap_or(&outputs[0]);
                let (_, data) =
                    output.try_extract_tensor::<f32>().map_err(|e| DetectorError::Inference(e.to_string()))?;
                scores.push(ModelScore { model_name: model.name.clone(), score: data.first().copied().unwrap_or(0.0) });
            }
            Ok(scores)
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx_detector::OnnxWakeDetector;

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;

    /// Scripted detector for tests: returns one queued score set per
    /// call, repeating the last entry once the script is exhausted.
    pub struct FakeWakeDetector {
        names: Vec<String>,
        script: Vec<Vec<ModelScore>>,
        cursor: usize,
    }

    impl FakeWakeDetector {
        pub fn new(model_name: &str, script: Vec<f32>) -> Self {
            let entries = script
                .into_iter()
                .map(|score| vec![ModelScore { model_name: model_name.to_string(), score }])
                .collect();
            Self { names: vec![model_name.to_string()], script: entries, cursor: 0 }
        }
    }

    impl WakeDetector for FakeWakeDetector {
        fn model_names(&self) -> &[String] {
            &self.names
        }

        fn score_frame(&mut self, _frame: &[i16]) -> Result<Vec<ModelScore>, DetectorError> {
            if self.script.is_empty() {
                return Ok(Vec::new());
            }
            let idx = self.cursor.min(self.script.len() - 1);
            self.cursor += 1;
            Ok(self.script[idx].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeWakeDetector;
    use super::*;

    #[test]
    fn fake_detector_replays_script_then_holds_last() {
        let mut detector = FakeWakeDetector::new("hey-computer", vec![0.1, 0.9, 0.9]);
        assert_eq!(detector.score_frame(&[]).unwrap()[0].score, 0.1);
        assert_eq!(detector.score_frame(&[]).unwrap()[0].score, 0.9);
        assert_eq!(detector.score_frame(&[]).unwrap()[0].score, 0.9);
        assert_eq!(detector.score_frame(&[]).unwrap()[0].score, 0.9);
    }

    #[test]
    fn discover_prefers_onnx_and_warns_on_tflite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hey-computer.onnx"), b"stub").unwrap();
        std::fs::write(dir.path().join("legacy.tflite"), b"stub").unwrap();
        let found = discover_model_paths(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].extension().unwrap(), "onnx");
    }
}
