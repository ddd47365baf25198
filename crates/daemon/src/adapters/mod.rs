// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter traits for the daemon's external collaborators: desktop
//! notifications, speech transcription, raw PCM capture, and text
//! injection into the focused application. Each follows the teacher's
//! `oj_adapters::notify` shape -- an async trait, one production impl,
//! and a `Fake*` test double gated by `test-support`/`cfg(test)`.

pub mod injector;
pub mod notify;
pub mod pcm_stream;
pub mod transcriber;

pub use injector::{Injector, NoopInjector, ShellInjector};
pub use notify::{DesktopNotifyAdapter, DynNotify, NotifyAdapter};
pub use pcm_stream::{FfmpegPcmStream, PcmStream};
pub use transcriber::{ShellTranscriber, Transcriber};