// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol: a single newline-terminated request per connection,
//! accepted either as a JSON object (`{"input":"<action>"}`) or a bare
//! token (`<action>`), answered with either a JSON line or a bare
//! integer line. Adapted from the teacher's tagged-enum request style
//! (`oj_daemon::protocol::request::Request`) and read/write-with-timeout
//! connection idiom, replacing the teacher's 4-byte length-prefixed
//! framing with the line framing this system's socket protocol uses.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::queue::QueueSnapshot;
use crate::state_machine::RuntimeState;

/// A decoded client request: one action token, however it arrived on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub action: String,
    /// The request arrived as a JSON object, so the daemon should reply
    /// in kind even for actions that would otherwise get a bare integer
    /// reply.
    pub wants_json: bool,
}

#[derive(Debug, Deserialize)]
struct JsonRequest {
    input: String,
}

/// Status snapshot embedded in `runtime-status-json` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: RuntimeState,
    pub queue: QueueSnapshot,
    pub wakeword_enabled: bool,
    pub language_tag: String,
}

/// A daemon response: an rc and, for status queries, a status payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub rc: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSnapshot>,
}

impl Response {
    pub fn ok() -> Self {
        Self { rc: 0, status: None }
    }

    pub fn rc(rc: i32) -> Self {
        Self { rc, status: None }
    }

    pub fn status(rc: i32, status: StatusSnapshot) -> Self {
        Self { rc, status: Some(status) }
    }

    /// Serialize per the request's form: JSON requests always get a
    /// JSON line; bare-token requests get a bare integer line unless a
    /// status payload is attached (which cannot be represented as a
    /// bare integer and is always JSON).
    pub fn encode(&self, wants_json: bool) -> String {
        if wants_json || self.status.is_some() {
            serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"rc\":{}}}", self.rc))
        } else {
            self.rc.to_string()
        }
    }
}

/// Errors decoding a request line.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("request exceeds maximum size of {0} bytes")]
    TooLarge(usize),
    #[error("empty request")]
    Empty,
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("malformed response: {0}")]
    BadResponse(String),
}

/// Legacy aliases that normalize onto a canonical action name, matching
/// the original CLI's tolerance for older invocation names. `text` and
/// bare `dictate` both name a one-shot endpointed dictation capture
/// (`run_dictation` in the original single-file script), distinct from
/// the press-and-hold `dictate-stop` action.
fn normalize_alias(token: &str) -> &str {
    match token {
        "text" | "dictate" => "dictate-auto",
        "voice" => "command-auto",
        "status" => "runtime-status",
        "status-json" => "runtime-status-json",
        other => other,
    }
}

/// The full set of actions this daemon accepts, the union of the state
/// machine's actions plus the direct (non-queued) actions: status
/// queries, shutdown, wakeword toggles, and the supplemented language
/// toggle.
pub fn known_actions() -> HashSet<&'static str> {
    [
        "command-start",
        "command-stop",
        "command-auto",
        "dictate-start",
        "dictate-stop",
        "dictate-auto",
        "dictate-language",
        "language-toggle",
        "wake-start",
        "wakeword-enable",
        "wakeword-disable",
        "wakeword-toggle",
        "wakeword-status",
        "runtime-status",
        "runtime-status-json",
        "shutdown",
        "ping",
    ]
    .into_iter()
    .collect()
}

/// Decode one request line (without its trailing newline). Accepts
/// either `{"input":"<action>"}` or a bare `<action>` token, normalizes
/// legacy aliases, and rejects unknown actions outright so a malformed
/// client fails fast instead of queuing garbage.
pub fn decode_request(line: &str, max_bytes: usize) -> Result<Request, DecodeError> {
    if line.len() > max_bytes {
        return Err(DecodeError::TooLarge(max_bytes));
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }

    let (raw_action, wants_json) = if trimmed.starts_with('{') {
        let parsed: JsonRequest = serde_json::from_str(trimmed)?;
        (parsed.input, true)
    } else {
        (trimmed.to_string(), false)
    };

    let action = normalize_alias(raw_action.trim()).to_string();
    if !known_actions().contains(action.as_str()) {
        return Err(DecodeError::UnknownAction(action));
    }
    Ok(Request { action, wants_json })
}

/// Decode one response line as either a bare integer rc or a JSON
/// [`Response`] object, the inverse of [`Response::encode`]. Used by
/// every client of the daemon (the CLI, the wake listener) to read the
/// single line the connection server writes back.
pub fn decode_response(line: &str) -> Result<Response, DecodeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Empty);
    }
    if trimmed.starts_with('{') {
        Ok(serde_json::from_str(trimmed)?)
    } else {
        trimmed
            .parse::<i32>()
            .map(Response::rc)
            .map_err(|_| DecodeError::BadResponse(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bare_token() {
        let req = decode_request("command-start", 8192).unwrap();
        assert_eq!(req.action, "command-start");
        assert!(!req.wants_json);
    }

    #[test]
    fn decodes_json_object() {
        let req = decode_request(r#"{"input":"dictate-start"}"#, 8192).unwrap();
        assert_eq!(req.action, "dictate-start");
        assert!(req.wants_json);
    }

    #[test]
    fn normalizes_legacy_alias() {
        let req = decode_request("text", 8192).unwrap();
        assert_eq!(req.action, "dictate-auto");
        let req = decode_request("dictate", 8192).unwrap();
        assert_eq!(req.action, "dictate-auto");
    }

    #[test]
    fn rejects_oversized_request() {
        let line = "a".repeat(20);
        let err = decode_request(&line, 10).unwrap_err();
        assert!(matches!(err, DecodeError::TooLarge(10)));
    }

    #[test]
    fn rejects_unknown_action() {
        let err = decode_request("not-a-real-action", 8192).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownAction(_)));
    }

    #[test]
    fn response_encode_matches_request_form() {
        let resp = Response::ok();
        assert_eq!(resp.encode(false), "0");
        assert_eq!(resp.encode(true), "{\"rc\":0}");
    }

    #[test]
    fn decodes_bare_and_json_responses() {
        assert_eq!(decode_response("0").unwrap().rc, 0);
        assert_eq!(decode_response("1").unwrap().rc, 1);
        assert_eq!(decode_response("{\"rc\":2}").unwrap().rc, 2);
        assert!(matches!(decode_response("not-a-number"), Err(DecodeError::BadResponse(_))));
    }

    #[test]
    fn status_responses_are_always_json() {
        let status = StatusSnapshot {
            state: RuntimeState::Idle,
            queue: QueueSnapshot {
                pending: 0,
                running_job_id: None,
                running_job_name: None,
                running_age_ms: None,
                worker_alive: true,
                worker_restarts: 0,
            },
            wakeword_enabled: false,
            language_tag: "en".to_string(),
        };
        let resp = Response::status(0, status);
        assert!(resp.encode(false).starts_with('{'));
    }
}