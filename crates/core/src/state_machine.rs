// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime state machine: exactly one daemon-wide state, guarded by a
//! single lock, transitioned by named actions. Grounded on
//! `voice_hotkey/runtime/state_machine.py`.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The five daemon-wide states. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    Idle,
    CommandHold,
    DictateHold,
    WakeSession,
    Transcribing,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeState::Idle => "idle",
            RuntimeState::CommandHold => "command_hold",
            RuntimeState::DictateHold => "dictate_hold",
            RuntimeState::WakeSession => "wake_session",
            RuntimeState::Transcribing => "transcribing",
        };
        f.write_str(s)
    }
}

/// Outcome of a single `transition` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    pub allowed: bool,
    pub action: String,
    pub previous_state: RuntimeState,
    pub next_state: RuntimeState,
    pub reason: Option<&'static str>,
}

/// A single daemon-wide state guarded by a lock, transitioned by action
/// name. Cheap to clone (wraps an `Arc` internally via the caller holding
/// a shared reference) -- callers are expected to hold one instance
/// behind an `Arc` themselves, matching the queue and session managers.
pub struct RuntimeStateMachine {
    state: Mutex<RuntimeState>,
}

impl Default for RuntimeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeStateMachine {
    pub fn new() -> Self {
        Self { state: Mutex::new(RuntimeState::Idle) }
    }

    pub fn get_state(&self) -> RuntimeState {
        *self.state.lock()
    }

    /// Attempt `action`; on success the internal state advances and is
    /// reflected in the returned result's `next_state`. On refusal the
    /// state is left unchanged and `next_state == previous_state`.
    pub fn transition(&self, action: &str) -> TransitionResult {
        let mut state = self.state.lock();
        let previous = *state;
        let (allowed, next_state, reason) = resolve_transition(previous, action);
        if allowed {
            *state = next_state;
        }
        TransitionResult {
            allowed,
            action: action.to_string(),
            previous_state: previous,
            next_state: if allowed { next_state } else { previous },
            reason,
        }
    }
}

fn resolve_transition(
    state: RuntimeState,
    action: &str,
) -> (bool, RuntimeState, Option<&'static str>) {
    use RuntimeState::*;

    match action {
        "command-start" => match state {
            Idle | CommandHold => (true, CommandHold, None),
            _ => (false, state, Some("runtime_busy")),
        },
        "command-stop" => match state {
            CommandHold => (true, Transcribing, None),
            Idle => (true, Idle, None),
            _ => (false, state, Some("invalid_transition")),
        },
        "command-stop-complete" | "command-start-failed" => {
            if state == Transcribing || action == "command-start-failed" {
                (true, Idle, None)
            } else {
                (false, state, Some("invalid_transition"))
            }
        }
        "dictate-start" => match state {
            Idle | DictateHold => (true, DictateHold, None),
            _ => (false, state, Some("runtime_busy")),
        },
        "dictate-stop" => match state {
            DictateHold => (true, Transcribing, None),
            Idle => (true, Idle, None),
            _ => (false, state, Some("invalid_transition")),
        },
        "dictate-stop-complete" | "dictate-start-failed" => {
            if state == Transcribing || action == "dictate-start-failed" {
                (true, Idle, None)
            } else {
                (false, state, Some("invalid_transition"))
            }
        }
        "wake-start" => match state {
            Idle => (true, WakeSession, None),
            _ => (false, state, Some("runtime_busy")),
        },
        "wake-complete" | "wake-failed" => match state {
            WakeSession => (true, Idle, None),
            _ => (false, state, Some("invalid_transition")),
        },
        _ => (false, state, Some("unknown_action")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        idle_command_start = { RuntimeState::Idle, "command-start", true, RuntimeState::CommandHold },
        hold_command_start_reentrant = { RuntimeState::CommandHold, "command-start", true, RuntimeState::CommandHold },
        busy_command_start = { RuntimeState::DictateHold, "command-start", false, RuntimeState::DictateHold },
        command_stop_to_transcribing = { RuntimeState::CommandHold, "command-stop", true, RuntimeState::Transcribing },
        idle_command_stop_noop = { RuntimeState::Idle, "command-stop", true, RuntimeState::Idle },
        transcribing_stop_complete = { RuntimeState::Transcribing, "command-stop-complete", true, RuntimeState::Idle },
        idle_wake_start = { RuntimeState::Idle, "wake-start", true, RuntimeState::WakeSession },
        wake_busy = { RuntimeState::CommandHold, "wake-start", false, RuntimeState::CommandHold },
        wake_complete = { RuntimeState::WakeSession, "wake-complete", true, RuntimeState::Idle },
        unknown_action = { RuntimeState::Idle, "not-a-real-action", false, RuntimeState::Idle },
    )]
    fn transition_table(
        start: RuntimeState,
        action: &str,
        expect_allowed: bool,
        expect_next: RuntimeState,
    ) {
        let machine = RuntimeStateMachine::new();
        // Force the machine into `start` via the same transition rules
        // it already defines, so the test never reaches into private
        // fields.
        match start {
            RuntimeState::Idle => {}
            RuntimeState::CommandHold => {
                machine.transition("command-start");
            }
            RuntimeState::DictateHold => {
                machine.transition("dictate-start");
            }
            RuntimeState::WakeSession => {
                machine.transition("wake-start");
            }
            RuntimeState::Transcribing => {
                machine.transition("command-start");
                machine.transition("command-stop");
            }
        }
        assert_eq!(machine.get_state(), start);

        let result = machine.transition(action);
        assert_eq!(result.allowed, expect_allowed);
        assert_eq!(result.next_state, expect_next);
        assert_eq!(machine.get_state(), expect_next);
    }

    #[test]
    fn start_failed_forces_idle_from_any_state() {
        let machine = RuntimeStateMachine::new();
        machine.transition("command-start");
        let result = machine.transition("command-start-failed");
        assert!(result.allowed);
        assert_eq!(machine.get_state(), RuntimeState::Idle);
    }

    #[test]
    fn refused_transition_leaves_state_untouched() {
        let machine = RuntimeStateMachine::new();
        machine.transition("dictate-start");
        let result = machine.transition("command-start");
        assert!(!result.allowed);
        assert_eq!(result.reason, Some("runtime_busy"));
        assert_eq!(machine.get_state(), RuntimeState::DictateHold);
    }
}