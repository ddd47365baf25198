// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared types for the voice-hotkey daemon: runtime state machine, hold
//! session and queue data models, endpoint VAD, wire protocol DTOs, and
//! the small amount of ambient plumbing (clock, config, errors) every
//! other crate in the workspace depends on.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod hold;
pub mod matcher;
pub mod protocol;
pub mod queue;
pub mod state_machine;
pub mod vad;
pub mod wake;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::{ClientError, DaemonClient};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::Config;
pub use error::VhError;
pub use hold::{HoldKind, HoldSessionState};
pub use matcher::{match_command, normalize, MatchedCommand};
pub use protocol::{Request, Response};
pub use queue::{JobOutcome, QueueSnapshot, QueuedJobInfo};
pub use state_machine::{RuntimeState, RuntimeStateMachine, TransitionResult};
pub use vad::EndpointVad;
pub use wake::{WakePrerollFile, WakeTriggerOutcome, WakewordState};