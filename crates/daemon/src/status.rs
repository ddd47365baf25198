// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the `runtime-status`/`runtime-status-json` payload from the
//! live state machine, queue, wakeword toggle, and language tag.

use vh_core::protocol::StatusSnapshot;
use vh_core::queue::QueueSnapshot;
use vh_core::state_machine::RuntimeState;

pub fn build_status(
    state: RuntimeState,
    queue: QueueSnapshot,
    wakeword_enabled: bool,
    language_tag: String,
) -> StatusSnapshot {
    StatusSnapshot { state, queue, wakeword_enabled, language_tag }
}
