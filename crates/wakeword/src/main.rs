// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! voice-hotkey-wakeword: the standalone wake trigger coordinator.
//! Runs continuously alongside the daemon, scoring microphone audio
//! against the configured wake-word model(s) and issuing `wake-start`
//! over the daemon's socket on a confirmed trigger. Entirely optional
//! -- the daemon and CLI work without it -- matching the original's
//! wake-word listener being a separate long-running script from the
//! core `voice-hotkey.py` daemon.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod chime;
mod coordinator;
mod detector;
mod manual_capture;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vh_core::config::Config;

use crate::detector::{discover_model_paths, WakeDetector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let model_paths = discover_model_paths(&config.wakeword_model_dir);

    let detector: Box<dyn WakeDetector> = match build_detector(&config, &model_paths) {
        Ok(detector) => detector,
        Err(e) => {
            error!(error = %e, dir = ?config.wakeword_model_dir, "no usable wake-word model; exiting");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let shutdown_for_run = shutdown.clone();
    let run_task = tokio::spawn(coordinator::run(config, detector, shutdown_for_run));

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
    shutdown.cancel();
    if let Err(e) = run_task.await {
        warn!(error = %e, "coordinator task join failed");
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_detector(
    _config: &Config,
    model_paths: &[std::path::PathBuf],
) -> Result<Box<dyn WakeDetector>, detector::DetectorError> {
    const WINDOW_SAMPLES: usize = 1280; // 80ms at 16kHz
    let onnx = detector::OnnxWakeDetector::load(model_paths, WINDOW_SAMPLES)?;
    Ok(Box::new(onnx))
}

#[cfg(not(feature = "onnx"))]
fn build_detector(
    _config: &Config,
    model_paths: &[std::path::PathBuf],
) -> Result<Box<dyn WakeDetector>, detector::DetectorError> {
    if model_paths.is_empty() {
        return Err(detector::DetectorError::NoModels(_config.wakeword_model_dir.clone()));
    }
    Err(detector::DetectorError::LoadFailed(
        model_paths[0].clone(),
        "built without the `onnx` feature; rebuild with --features onnx to load real models".to_string(),
    ))
}
