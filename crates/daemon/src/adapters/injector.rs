// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text injection into the focused application. Grounded on
//! `voice_hotkey/integrations.py::{inject_text_into_focused_input,
//! _inject_text_via_clipboard}`: try a direct `wtype` keystroke
//! injection, falling back to a clipboard-paste path (`wl-copy` +
//! `hyprctl dispatch sendshortcut`) when `wtype` is unavailable or
//! fails.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, warn};
use vh_core::error::VhError;

#[async_trait]
pub trait Injector: Send + Sync + 'static {
    async fn inject(&self, text: &str) -> Result<bool, VhError>;
}

/// Injects text per `VOICE_DICTATION_INJECTOR` (`wtype` by default),
/// falling back to a clipboard-and-paste-shortcut path.
pub struct ShellInjector {
    injector: String,
}

impl ShellInjector {
    pub fn new(injector: impl Into<String>) -> Self {
        Self { injector: injector.into() }
    }

    async fn inject_via_wtype(&self, text: &str) -> bool {
        let timeout_secs = (text.len() / 80 + 2).clamp(3, 20) as u64;
        let run = Command::new("wtype").arg(text).output();
        match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
            Ok(Ok(output)) if output.status.success() => true,
            Ok(Ok(output)) => {
                error!(rc = output.status.code(), "wtype injection failed");
                false
            }
            Ok(Err(e)) => {
                error!(error = %e, "wtype injection failed to spawn");
                false
            }
            Err(_) => {
                error!(timeout_secs, "wtype injection timed out");
                false
            }
        }
    }

    async fn inject_via_clipboard(&self, text: &str) -> bool {
        let mut copy = match Command::new("wl-copy").stdin(Stdio::piped()).stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(error = %e, "cannot inject text: wl-copy not found");
                return false;
            }
        };
        if let Some(stdin) = copy.stdin.as_mut() {
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                error!(error = %e, "clipboard write failed");
                return false;
            }
        }
        match tokio::time::timeout(Duration::from_secs(2), copy.wait()).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => {
                error!(rc = status.code(), "clipboard write failed");
                return false;
            }
            _ => {
                error!("clipboard write failed or timed out");
                return false;
            }
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        const PASTE_ATTEMPTS: [[&str; 4]; 3] = [
            ["hyprctl", "dispatch", "sendshortcut", "CTRL SHIFT,V,"],
            ["hyprctl", "dispatch", "sendshortcut", "SHIFT,Insert,"],
            ["hyprctl", "dispatch", "sendshortcut", "CTRL,V,"],
        ];
        for attempt in PASTE_ATTEMPTS {
            let run = Command::new(attempt[0]).args(&attempt[1..]).output();
            match tokio::time::timeout(Duration::from_secs(3), run).await {
                Ok(Ok(output)) if output.status.success() => {
                    debug!(cmd = ?attempt, "paste shortcut dispatched");
                    return true;
                }
                Ok(Ok(output)) => warn!(cmd = ?attempt, rc = output.status.code(), "paste attempt failed"),
                _ => warn!(cmd = ?attempt, "paste attempt failed or timed out"),
            }
        }
        false
    }
}

#[async_trait]
impl Injector for ShellInjector {
    async fn inject(&self, text: &str) -> Result<bool, VhError> {
        if self.injector == "wtype" {
            if which_exists("wtype") {
                if self.inject_via_wtype(text).await {
                    return Ok(true);
                }
            } else {
                warn!("wtype not found; falling back to clipboard paste path");
            }
        }
        Ok(self.inject_via_clipboard(text).await)
    }
}

fn which_exists(bin: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

/// Discards text instead of injecting it; used when no injector is
/// configured or for environments with no focused-window concept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInjector;

#[async_trait]
impl Injector for NoopInjector {
    async fn inject(&self, text: &str) -> Result<bool, VhError> {
        debug!(len = text.len(), "noop injector discarding text");
        Ok(true)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    pub struct FakeInjector {
        calls: Mutex<Vec<String>>,
        succeed: bool,
    }

    impl FakeInjector {
        pub fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self { calls: Mutex::new(Vec::new()), succeed })
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Injector for FakeInjector {
        async fn inject(&self, text: &str) -> Result<bool, VhError> {
            self.calls.lock().push(text.to_string());
            Ok(self.succeed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_injector_always_reports_success() {
        let injector = NoopInjector;
        assert!(injector.inject("hello world").await.unwrap());
    }
}