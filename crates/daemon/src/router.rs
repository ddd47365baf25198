// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches every recognized action to either a direct (inline)
//! handler or the execution queue, per spec §4.2's admission policy:
//! hold-start halves, wakeword toggles, and status queries are direct;
//! wake-start, command-auto/dictate-auto, and the post-release halves
//! of `{command,dictate}-stop` are queued. Grounded on
//! `voice_hotkey/app.py::handle_input` (the single dispatch function in
//! the original) and `runtime/job_queue.py`'s admission split.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vh_core::config::Config;
use vh_core::error::VhError;
use vh_core::hold::HoldKind;
use vh_core::protocol::{Request, Response};
use vh_core::state_machine::RuntimeStateMachine;
use vh_core::wake::{WakeSessionMarker, WakewordState};

use crate::adapters::{DynNotify, Injector, PcmStream, Transcriber};
use crate::capture::{run_endpointed_capture, CaptureOutcome, CaptureParams};
use crate::execution::{CancelFlag, ExecutionQueue};
use crate::session::{HoldSessionManager, StopOutcome};
use crate::status::build_status;

/// Everything a queued or direct handler needs, bundled so `Router`
/// doesn't grow an ever-longer constructor argument list.
pub struct Router {
    config: Arc<Config>,
    state_machine: Arc<RuntimeStateMachine>,
    queue: Arc<ExecutionQueue>,
    command_session: Arc<HoldSessionManager>,
    dictate_session: Arc<HoldSessionManager>,
    transcriber: Arc<dyn Transcriber>,
    injector: Arc<dyn Injector>,
    notify: Arc<dyn DynNotify>,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        state_machine: Arc<RuntimeStateMachine>,
        queue: Arc<ExecutionQueue>,
        command_session: Arc<HoldSessionManager>,
        dictate_session: Arc<HoldSessionManager>,
        transcriber: Arc<dyn Transcriber>,
        injector: Arc<dyn Injector>,
        notify: Arc<dyn DynNotify>,
        runtime: Handle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            state_machine,
            queue,
            command_session,
            dictate_session,
            transcriber,
            injector,
            notify,
            runtime,
            shutdown,
        }
    }

    pub async fn handle(&self, req: Request, cancel: CancellationToken) -> Response {
        match req.action.as_str() {
            "ping" => Response::ok(),
            "shutdown" => {
                info!("shutdown requested over the connection server");
                self.shutdown.cancel();
                Response::ok()
            }
            "runtime-status" | "runtime-status-json" => self.handle_status().await,
            "dictate-language" | "language-toggle" => self.handle_language_toggle().await,
            "wakeword-enable" => self.handle_wakeword_set(true).await,
            "wakeword-disable" => self.handle_wakeword_set(false).await,
            "wakeword-toggle" => self.handle_wakeword_toggle().await,
            "wakeword-status" => self.handle_wakeword_status().await,
            "command-start" => self.handle_hold_start(HoldKind::Command).await,
            "dictate-start" => self.handle_hold_start(HoldKind::Dictate).await,
            "command-stop" => self.handle_hold_stop(HoldKind::Command, cancel).await,
            "dictate-stop" => self.handle_hold_stop(HoldKind::Dictate, cancel).await,
            "command-auto" => self.handle_auto_capture(AutoKind::Command, cancel).await,
            "dictate-auto" => self.handle_auto_capture(AutoKind::Dictate, cancel).await,
            "wake-start" => self.handle_auto_capture(AutoKind::Wake, cancel).await,
            other => {
                warn!(action = other, "router received an action with no handler");
                Response::rc(1)
            }
        }
    }

    async fn handle_status(&self) -> Response {
        let language_tag = self.current_language().unwrap_or_else(|_| self.config.default_language.clone());
        let wakeword_enabled = self.wakeword_enabled().unwrap_or(self.config.wakeword_enabled_default);
        let snapshot = build_status(self.state_machine.get_state(), self.queue.snapshot(), wakeword_enabled, language_tag);
        Response::status(0, snapshot)
    }

    fn current_language(&self) -> Result<String, VhError> {
        vh_core::hold::read_language_tag(&self.config.language_path(), &self.config.default_language)
    }

    async fn handle_language_toggle(&self) -> Response {
        let current = self.current_language().unwrap_or_else(|_| self.config.default_language.clone());
        let next =
            if current == self.config.default_language { self.config.secondary_language.clone() } else { self.config.default_language.clone() };
        match vh_core::hold::write_language_tag(&self.config.language_path(), &next) {
            Ok(()) => {
                let _ = self.notify.notify("voice-hotkey", &format!("dictation language: {next}")).await;
                Response::ok()
            }
            Err(e) => {
                warn!(error = %e, "failed to persist language toggle");
                Response::rc(1)
            }
        }
    }

    fn wakeword_enabled(&self) -> Result<bool, VhError> {
        Ok(WakewordState::load_or_default(&self.config.wakeword_state_path(), self.config.wakeword_enabled_default)?.enabled)
    }

    async fn handle_wakeword_set(&self, enabled: bool) -> Response {
        let state = WakewordState { enabled };
        match state.save(&self.config.wakeword_state_path()) {
            Ok(()) => {
                let label = if enabled { "enabled" } else { "disabled" };
                let _ = self.notify.notify("voice-hotkey", &format!("wake word {label}")).await;
                Response::ok()
            }
            Err(e) => {
                warn!(error = %e, "failed to persist wakeword toggle");
                Response::rc(1)
            }
        }
    }

    async fn handle_wakeword_toggle(&self) -> Response {
        let enabled = self.wakeword_enabled().unwrap_or(self.config.wakeword_enabled_default);
        self.handle_wakeword_set(!enabled).await
    }

    /// Reports the wakeword toggle as the response rc itself (0 enabled,
    /// 1 disabled) so shell-script callers (waybar modules, status bars)
    /// can branch on exit code without parsing JSON, matching the
    /// boolean-as-exit-code convention the rest of this wire protocol
    /// already uses for no-speech/cancelled/busy.
    async fn handle_wakeword_status(&self) -> Response {
        if self.wakeword_enabled().unwrap_or(self.config.wakeword_enabled_default) {
            Response::ok()
        } else {
            Response::rc(1)
        }
    }

    fn session_for(&self, kind: HoldKind) -> &Arc<HoldSessionManager> {
        match kind {
            HoldKind::Command => &self.command_session,
            HoldKind::Dictate => &self.dictate_session,
        }
    }

    async fn handle_hold_start(&self, kind: HoldKind) -> Response {
        let action = kind.start_action();
        let transition = self.state_machine.transition(action);
        if !transition.allowed {
            warn!(?kind, reason = transition.reason, "hold start refused by state machine");
            return Response::rc(1);
        }

        let language_tag = self.current_language().unwrap_or_else(|_| self.config.default_language.clone());
        let session = Arc::clone(self.session_for(kind));
        let start_result = tokio::task::spawn_blocking(move || session.start(&language_tag)).await;

        match start_result {
            Ok(Ok(())) => {
                let _ = self.notify.notify("voice-hotkey", &format!("{action} capture started")).await;
                Response::ok()
            }
            Ok(Err(e)) => {
                warn!(?kind, error = %e, "hold start failed");
                self.state_machine.transition(&format!("{}-start-failed", kind_prefix(kind)));
                let _ = self.notify.notify("voice-hotkey", &format!("{action} failed to start")).await;
                Response::rc(1)
            }
            Err(join_err) => {
                warn!(?kind, error = %join_err, "hold start task panicked");
                self.state_machine.transition(&format!("{}-start-failed", kind_prefix(kind)));
                Response::rc(1)
            }
        }
    }

    async fn handle_hold_stop(&self, kind: HoldKind, _client_cancel: CancellationToken) -> Response {
        let long_job_name = match kind {
            HoldKind::Command => "command-auto",
            HoldKind::Dictate => "dictate-auto",
        };
        let cancelled_wake = self.queue.cancel_by_name("wake-start");
        let cancelled_auto = self.queue.cancel_by_name(long_job_name);
        let cancelled_any = cancelled_wake || cancelled_auto;
        let has_session = self.session_for(kind).has_active_descriptor();
        if cancelled_any && !has_session {
            info!(?kind, "stop cancelled an in-flight auto-capture with no hold session to unwind");
            return Response::ok();
        }

        let action = kind.stop_action();
        let transition = self.state_machine.transition(action);
        if !transition.allowed {
            warn!(?kind, reason = transition.reason, "hold stop refused by state machine");
            return Response::rc(1);
        }

        let session = Arc::clone(self.session_for(kind));
        let transcriber = Arc::clone(&self.transcriber);
        let injector = Arc::clone(&self.injector);
        let runtime = self.runtime.clone();
        let model_name = "default".to_string(); // concrete model selection is the Transcriber's own concern
        let log_max = self.config.log_command_output_max;

        let job_name = action.to_string();
        let job: crate::execution::JobFn = Box::new(move |cancel_flag: &CancelFlag| {
            run_hold_stop_body(&session, kind, &transcriber, &injector, &runtime, &model_name, log_max, cancel_flag)
        });
        let Some(rx) = self.queue.submit(job_name, job) else {
            warn!(?kind, "execution queue full; refusing hold stop");
            self.state_machine.transition(&format!("{}-stop-complete", kind_prefix(kind)));
            return Response::rc(1);
        };

        let outcome = rx.await.unwrap_or(vh_core::queue::JobOutcome::Failed);
        self.state_machine.transition(&format!("{}-stop-complete", kind_prefix(kind)));
        match outcome {
            vh_core::queue::JobOutcome::Completed { rc } => Response::rc(rc),
            vh_core::queue::JobOutcome::Cancelled => Response::rc(vh_core::wake::CANCELLED_EXIT_CODE),
            vh_core::queue::JobOutcome::Failed => Response::rc(1),
        }
    }

    async fn handle_auto_capture(&self, kind: AutoKind, _client_cancel: CancellationToken) -> Response {
        let action = kind.action_name();
        let transition_action = kind.transition_action();
        let transition = self.state_machine.transition(transition_action);
        if !transition.allowed {
            warn!(?kind, reason = transition.reason, "auto capture refused by state machine");
            return Response::rc(1);
        }

        let config = Arc::clone(&self.config);
        let transcriber = Arc::clone(&self.transcriber);
        let injector = Arc::clone(&self.injector);
        let runtime = self.runtime.clone();
        let language_tag = self.current_language().unwrap_or_else(|_| self.config.default_language.clone());
        let kind_for_job = kind;

        if kind == AutoKind::Wake {
            let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
            if let Err(e) = WakeSessionMarker::write(&self.config.wake_session_state_path(), now_ms) {
                warn!(error = %e, "failed to write wake session marker");
            }
        }

        let job: crate::execution::JobFn = Box::new(move |cancel_flag: &CancelFlag| {
            run_auto_capture_body(&config, kind_for_job, &transcriber, &injector, &runtime, &language_tag, cancel_flag)
        });
        let Some(rx) = self.queue.submit(action, job) else {
            warn!(?kind, "execution queue full; refusing auto capture");
            let _ = self.notify.notify("voice-hotkey", &format!("{action} busy, try again shortly")).await;
            // Never started running: force straight back to Idle, the
            // same force-clear path a failed hold-start uses.
            self.state_machine.transition(kind.failed_action());
            if kind == AutoKind::Wake {
                WakeSessionMarker::clear(&self.config.wake_session_state_path());
            }
            return Response::rc(1);
        };

        let outcome = rx.await.unwrap_or(vh_core::queue::JobOutcome::Failed);
        let rc = match outcome {
            vh_core::queue::JobOutcome::Completed { rc } => rc,
            vh_core::queue::JobOutcome::Cancelled => vh_core::wake::CANCELLED_EXIT_CODE,
            vh_core::queue::JobOutcome::Failed => 1,
        };
        self.complete_auto_transition(kind, rc == 0);
        if kind == AutoKind::Wake {
            WakeSessionMarker::clear(&self.config.wake_session_state_path());
        }
        Response::rc(rc)
    }

    /// `Wake` has a direct `wake-complete`/`wake-failed` path out of
    /// `WakeSession`. `Command`/`Dictate` have no `*-auto-complete`
    /// action in the table; they reuse the hold path's two-step
    /// `*-stop` (CommandHold/DictateHold -> Transcribing) then
    /// `*-stop-complete` (-> Idle), run back-to-back since the capture
    /// (the thing `*-stop` would otherwise wait on) has already
    /// finished by the time this runs.
    fn complete_auto_transition(&self, kind: AutoKind, succeeded: bool) {
        match kind {
            AutoKind::Wake => {
                let action = if succeeded { kind.complete_action() } else { kind.failed_action() };
                self.state_machine.transition(action);
            }
            AutoKind::Command | AutoKind::Dictate => {
                self.state_machine.transition(kind.stop_action());
                self.state_machine.transition(kind.complete_action());
            }
        }
    }
}

fn kind_prefix(kind: HoldKind) -> &'static str {
    match kind {
        HoldKind::Command => "command",
        HoldKind::Dictate => "dictate",
    }
}

/// The three endpointed-capture driven actions: each ends at the same
/// `WakeSession`/`Transcribing`-equivalent state machine transitions,
/// differing only in which state they occupy while running and what
/// happens to the resulting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoKind {
    Command,
    Dictate,
    Wake,
}

impl AutoKind {
    fn action_name(self) -> &'static str {
        match self {
            AutoKind::Command => "command-auto",
            AutoKind::Dictate => "dictate-auto",
            AutoKind::Wake => "wake-start",
        }
    }

    fn transition_action(self) -> &'static str {
        match self {
            AutoKind::Command => "command-start",
            AutoKind::Dictate => "dictate-start",
            AutoKind::Wake => "wake-start",
        }
    }

    /// Only meaningful for `Command`/`Dictate`: the intermediate
    /// `*Hold -> Transcribing` step `complete_auto_transition` replays
    /// before `complete_action`.
    fn stop_action(self) -> &'static str {
        match self {
            AutoKind::Command => "command-stop",
            AutoKind::Dictate => "dictate-stop",
            AutoKind::Wake => "wake-complete",
        }
    }

    fn complete_action(self) -> &'static str {
        match self {
            AutoKind::Command => "command-stop-complete",
            AutoKind::Dictate => "dictate-stop-complete",
            AutoKind::Wake => "wake-complete",
        }
    }

    fn failed_action(self) -> &'static str {
        match self {
            AutoKind::Command => "command-start-failed",
            AutoKind::Dictate => "dictate-start-failed",
            AutoKind::Wake => "wake-failed",
        }
    }

    fn is_dictation(self) -> bool {
        matches!(self, AutoKind::Dictate)
    }
}

/// Runs on the execution worker thread: the press-and-hold stop
/// sequence (signal escalation + wait-for-audio already happened inside
/// `HoldSessionManager::stop`), then bridges into async transcription
/// and routing via `Handle::block_on`.
#[allow(clippy::too_many_arguments)]
fn run_hold_stop_body(
    session: &HoldSessionManager,
    kind: HoldKind,
    transcriber: &Arc<dyn Transcriber>,
    injector: &Arc<dyn Injector>,
    runtime: &Handle,
    model_name: &str,
    log_max: usize,
    cancel_flag: &CancelFlag,
) -> i32 {
    if cancel_flag.load(Ordering::SeqCst) {
        return vh_core::wake::CANCELLED_EXIT_CODE;
    }
    match session.stop() {
        StopOutcome::NoActiveSession => 0,
        StopOutcome::InvalidState => 1,
        StopOutcome::NoSpeech => 0,
        StopOutcome::Captured { wav_path, tmpdir, language_tag } => {
            let rc = runtime.block_on(async {
                transcribe_and_route(
                    kind.into(),
                    &wav_path,
                    &language_tag,
                    model_name,
                    transcriber,
                    injector,
                    log_max,
                )
                .await
            });
            session.cleanup_tmpdir(&tmpdir);
            rc
        }
    }
}

/// Runs on the execution worker thread: an endpointed VAD capture (with
/// wake pre-roll merge for `AutoKind::Wake`), then the same
/// transcribe-and-route bridge the hold-stop path uses.
fn run_auto_capture_body(
    config: &Config,
    kind: AutoKind,
    transcriber: &Arc<dyn Transcriber>,
    injector: &Arc<dyn Injector>,
    runtime: &Handle,
    language_tag: &str,
    cancel_flag: &CancelFlag,
) -> i32 {
    runtime.block_on(async {
        let mut stream = crate::adapters::FfmpegPcmStream::new(
            config.audio_backend.clone(),
            config.audio_source.clone(),
            16_000,
            config.vad_frame_ms,
        );
        let (session_max, start_speech_timeout) = match kind {
            AutoKind::Command => (Duration::from_secs(config.audio_seconds), config.start_speech_timeout),
            AutoKind::Dictate => (Duration::from_secs(config.dictate_seconds), config.start_speech_timeout),
            AutoKind::Wake => (Duration::from_secs(config.wake_session_max_seconds), config.wake_start_speech_timeout),
        };
        let params = CaptureParams {
            frame_ms: config.vad_frame_ms,
            rms_threshold: config.vad_rms_threshold,
            min_speech_ms: config.vad_min_speech_ms,
            end_silence_ms: config.vad_end_silence_ms,
            sample_rate_hz: 16_000,
            session_max,
            start_speech_timeout,
            frame_read_timeout: Duration::from_millis((config.vad_frame_ms as u64) * 4),
        };

        let (preroll, had_preroll_speech) = if kind == AutoKind::Wake {
            load_fresh_preroll(config)
        } else {
            (None, false)
        };

        let outcome = run_endpointed_capture(&mut stream, &params, cancel_flag, preroll, had_preroll_speech).await;
        match outcome {
            Ok(CaptureOutcome::Cancelled) => vh_core::wake::CANCELLED_EXIT_CODE,
            Ok(CaptureOutcome::NoSpeech) => vh_core::wake::NO_SPEECH_EXIT_CODE,
            Ok(CaptureOutcome::Captured { wav }) => {
                let wav_path = match persist_wav_to_tmp(&wav) {
                    Ok(path) => path,
                    Err(_) => return 1,
                };
                let rc = transcribe_and_route(
                    kind,
                    &wav_path,
                    language_tag,
                    "default",
                    transcriber,
                    injector,
                    config.log_command_output_max,
                )
                .await;
                let _ = std::fs::remove_file(&wav_path);
                rc
            }
            Err(e) => {
                warn!(?kind, error = %e, "endpointed capture failed");
                1
            }
        }
    })
}

fn load_fresh_preroll(config: &Config) -> (Option<Vec<u8>>, bool) {
    let path = config.wake_preroll_path();
    let Ok(bytes) = std::fs::read(&path) else { return (None, false) };
    if bytes.is_empty() {
        return (None, false);
    }
    // Freshness is judged by mtime rather than an embedded timestamp --
    // the wake coordinator overwrites this file immediately before each
    // trigger, so its mtime is the trigger time.
    let fresh = std::fs::metadata(&path)
        .and_then(|m| m.modified())
        .map(|modified| modified.elapsed().map(|age| age <= Duration::from_secs(2)).unwrap_or(false))
        .unwrap_or(false);
    if !fresh {
        return (None, false);
    }
    (Some(bytes), true)
}

fn persist_wav_to_tmp(wav: &[u8]) -> std::io::Result<PathBuf> {
    let (_dir, path) = crate::paths::new_session_dir("voice-hotkey-auto")?;
    std::fs::write(&path, wav)?;
    Ok(path)
}

async fn transcribe_and_route(
    kind: AutoKind,
    wav_path: &std::path::Path,
    language_tag: &str,
    model_name: &str,
    transcriber: &Arc<dyn Transcriber>,
    injector: &Arc<dyn Injector>,
    log_max: usize,
) -> i32 {
    let text = match transcriber.transcribe(wav_path, language_tag, model_name).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => return vh_core::wake::NO_SPEECH_EXIT_CODE,
        Err(e) => {
            warn!(error = %e, "transcription failed");
            return 1;
        }
    };

    if kind.is_dictation() {
        match injector.inject(text.trim()).await {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                warn!(error = %e, "text injection failed");
                1
            }
        }
    } else {
        route_command_text(&text, log_max).await
    }
}

const COMMAND_EXEC_TIMEOUT: Duration = Duration::from_secs(5);

/// Matches transcribed text against the command table and executes it.
/// Grounded on `app.py::run_command`'s match-then-exec shape; output is
/// captured and truncated to `log_max` bytes for logging, never shown
/// to the user. Bounded by [`COMMAND_EXEC_TIMEOUT`] like every other
/// subprocess call in this daemon, so a hung `hyprctl`/`pamixer` can't
/// wedge the single execution worker.
async fn route_command_text(text: &str, log_max: usize) -> i32 {
    let normalized = vh_core::matcher::normalize(text);
    let Some(matched) = vh_core::matcher::match_command(&normalized) else {
        warn!(text = %normalized, "no command matched");
        return 1;
    };
    let Some((program, args)) = matched.argv.split_first() else {
        return 1;
    };
    let run = tokio::process::Command::new(program).args(args).output();
    match tokio::time::timeout(COMMAND_EXEC_TIMEOUT, run).await {
        Ok(Ok(output)) => {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            combined.truncate(log_max);
            info!(label = %matched.label, rc = output.status.code(), "matched command executed");
            if output.status.success() {
                0
            } else {
                1
            }
        }
        Ok(Err(e)) => {
            warn!(label = %matched.label, error = %e, "matched command failed to spawn");
            1
        }
        Err(_) => {
            warn!(label = %matched.label, "matched command timed out");
            1
        }
    }
}

impl From<HoldKind> for AutoKind {
    fn from(kind: HoldKind) -> Self {
        match kind {
            HoldKind::Command => AutoKind::Command,
            HoldKind::Dictate => AutoKind::Dictate,
        }
    }
}
