//! Behavioral specifications for the voice-hotkey daemon/CLI pair.
//!
//! Black-box: spawns the real `voice-hotkeyd`/`voice-hotkey` binaries
//! against an isolated state directory and a `lavfi` virtual audio
//! device, and checks exit codes, injected text, and daemon log
//! content. Named after the end-to-end scenarios in spec.md §8.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/dictation_hold.rs"]
mod dictation_hold;
#[path = "specs/queue_full.rs"]
mod queue_full;
#[path = "specs/cancellation.rs"]
mod cancellation;
#[path = "specs/path_traversal.rs"]
mod path_traversal;
