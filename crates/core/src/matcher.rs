// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Voice-command matching: normalize transcribed text, match it against
//! a small rule table of known commands, falling back to a looser
//! keyword-based match. Grounded on `voice_hotkey/commands.py`, kept
//! deliberately simple and data-driven so new commands are a one-line
//! addition rather than new control flow.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// A single matchable command: the pattern that must fully match the
/// normalized text, the argv to execute, and a human-readable label
/// used in logs and notifications.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub pattern: &'static str,
    pub argv: &'static [&'static str],
    pub label: &'static str,
}

static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        pattern: r"^((workspace )?(one|1))$",
        argv: &["hyprctl", "dispatch", "workspace", "1"],
        label: "Workspace 1",
    },
    CommandSpec {
        pattern: r"^((workspace )?(two|2))$",
        argv: &["hyprctl", "dispatch", "workspace", "2"],
        label: "Workspace 2",
    },
    CommandSpec { pattern: r"^volume up$", argv: &["pamixer", "-i", "5"], label: "Volume up" },
    CommandSpec { pattern: r"^volume down$", argv: &["pamixer", "-d", "5"], label: "Volume down" },
    CommandSpec {
        pattern: r"^lock( screen)?$",
        argv: &["loginctl", "lock-session"],
        label: "Lock screen",
    },
];

#[allow(clippy::expect_used)]
static COMPILED: LazyLock<Vec<Regex>> =
    LazyLock::new(|| COMMANDS.iter().map(|c| Regex::new(c.pattern).expect("static command pattern is valid")).collect());

#[allow(clippy::unwrap_used)]
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9 ]+").unwrap());
#[allow(clippy::unwrap_used)]
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
#[allow(clippy::unwrap_used)]
static LEADING_FILLER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(and|please|hey)\s+").unwrap());

/// Lowercase, strip punctuation, collapse whitespace, and drop a single
/// leading filler word so "hey, volume up" and "volume up" match alike.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = NON_ALNUM.replace_all(&lower, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    LEADING_FILLER.replace(&collapsed, "").into_owned()
}

/// A matched command: the argv to execute and its display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedCommand {
    pub argv: Vec<String>,
    pub label: String,
}

fn matched(argv: &[&str], label: &str) -> MatchedCommand {
    MatchedCommand { argv: argv.iter().map(|s| s.to_string()).collect(), label: label.to_string() }
}

/// Looser keyword-set match for phrasing the rule table doesn't cover
/// exactly, e.g. extra words or different ordering.
pub fn fuzzy_allowlist_match(clean_text: &str) -> Option<MatchedCommand> {
    let words: HashSet<&str> = clean_text.split(' ').filter(|w| !w.is_empty()).collect();
    let compact: String = clean_text.chars().filter(|c| !c.is_whitespace()).collect();

    let workspace_words: HashSet<&str> = ["workspace"].into_iter().collect();
    let one_words: HashSet<&str> = ["1", "one"].into_iter().collect();
    let two_words: HashSet<&str> = ["2", "two"].into_iter().collect();
    let volume_words: HashSet<&str> = ["volume"].into_iter().collect();
    let up_words: HashSet<&str> = ["up", "louder"].into_iter().collect();
    let down_words: HashSet<&str> = ["down", "lower"].into_iter().collect();
    let lock_words: HashSet<&str> = ["lock"].into_iter().collect();
    let screen_words: HashSet<&str> = ["screen"].into_iter().collect();

    if !(workspace_words & &words).is_empty() && !(one_words & &words).is_empty() {
        return Some(matched(&["hyprctl", "dispatch", "workspace", "1"], "Workspace 1"));
    }
    if !(workspace_words & &words).is_empty() && !(two_words & &words).is_empty() {
        return Some(matched(&["hyprctl", "dispatch", "workspace", "2"], "Workspace 2"));
    }
    if compact.contains("loud") || compact.contains("louder") {
        return Some(matched(&["pamixer", "-i", "5"], "Volume up"));
    }
    if compact.contains("quiet") || compact.contains("lower") {
        return Some(matched(&["pamixer", "-d", "5"], "Volume down"));
    }
    if !(volume_words & &words).is_empty() && !(up_words & &words).is_empty() {
        return Some(matched(&["pamixer", "-i", "5"], "Volume up"));
    }
    if !(volume_words & &words).is_empty() && !(down_words & &words).is_empty() {
        return Some(matched(&["pamixer", "-d", "5"], "Volume down"));
    }
    if !(lock_words & &words).is_empty() && (!(screen_words & &words).is_empty() || words.contains("lock")) {
        return Some(matched(&["loginctl", "lock-session"], "Lock screen"));
    }

    None
}

/// Match already-normalized text against the rule table, falling back
/// to [`fuzzy_allowlist_match`] when nothing matches exactly.
pub fn match_command(clean_text: &str) -> Option<MatchedCommand> {
    for (spec, regex) in COMMANDS.iter().zip(COMPILED.iter()) {
        if regex.is_match(clean_text) {
            return Some(matched(spec.argv, spec.label));
        }
    }
    fuzzy_allowlist_match(clean_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_punctuation_and_filler() {
        assert_eq!(normalize("Hey, Volume Up!"), "volume up");
        assert_eq!(normalize("  please   lock   screen "), "lock screen");
    }

    #[test]
    fn matches_exact_rule_table_entries() {
        let m = match_command("workspace one").unwrap();
        assert_eq!(m.argv, vec!["hyprctl", "dispatch", "workspace", "1"]);
        assert_eq!(m.label, "Workspace 1");
    }

    #[test]
    fn falls_back_to_fuzzy_match() {
        let m = match_command("can you go louder please").unwrap();
        assert_eq!(m.label, "Volume up");
    }

    #[test]
    fn unmatched_text_returns_none() {
        assert!(match_command("what time is it").is_none());
    }

    #[test]
    fn lock_requires_lock_word_not_just_screen() {
        assert!(match_command("screen").is_none());
        assert!(match_command("lock").is_some());
    }
}
