//! Test helpers for the end-to-end behavioral specs in spec.md §8.
//!
//! Spawns the real `voice-hotkeyd` daemon and `voice-hotkey` CLI
//! binaries against an isolated state directory, with `ffmpeg`'s
//! `lavfi` virtual device standing in for a microphone (silence via
//! `anullsrc`, a detectable tone via `sine`) and small PATH-local stub
//! scripts standing in for the transcriber and text injector -- both
//! named as out-of-scope collaborators by spec.md, so stubbing them is
//! the correct boundary for these tests, not a shortcut around it.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

fn daemon_binary() -> PathBuf {
    binary_path("voice-hotkeyd")
}

fn cli_binary() -> PathBuf {
    binary_path("voice-hotkey")
}

/// Audio source understood by `ffmpeg -f lavfi -i <source>`: unbroken
/// silence. Enough to satisfy the "has any audio" check a hold-stop
/// makes without depending on a real microphone.
pub const SILENCE_SOURCE: &str = "anullsrc=r=16000:cl=mono";

/// A steady tone loud enough to cross the default VAD RMS threshold
/// immediately, used where a test needs the endpointer to believe
/// speech has started.
pub const TONE_SOURCE: &str = "sine=frequency=440:sample_rate=16000";

fn write_stub_script(path: &Path, body: &str) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    file.write_all(body.as_bytes()).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o700);
    std::fs::set_permissions(path, perms).unwrap();
}

/// An isolated daemon/CLI harness: its own state dir, its own PATH-local
/// transcriber and text-injector stubs, torn down (daemon shut down) on
/// drop.
pub struct Harness {
    state_dir: tempfile::TempDir,
    stub_dir: tempfile::TempDir,
    inject_log: PathBuf,
    audio_source: String,
    extra_env: Vec<(String, String)>,
}

impl Harness {
    /// `audio_source` is passed verbatim as `ffmpeg -f lavfi -i <source>`.
    pub fn new(audio_source: &str) -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let stub_dir = tempfile::tempdir().unwrap();
        let inject_log = stub_dir.path().join("injected.txt");

        write_stub_script(
            &stub_dir.path().join("voice-hotkey-transcribe"),
            r#"
if [ "$1" = "--warm" ]; then
    exit 0
fi
echo "hello world"
"#,
        );
        write_stub_script(
            &stub_dir.path().join("wtype"),
            &format!(r#"printf '%s' "$1" > "{}""#, inject_log.display()),
        );

        Self { state_dir, stub_dir, inject_log, audio_source: audio_source.to_string(), extra_env: Vec::new() }
    }

    /// Adds/overrides an environment variable for every command this
    /// harness builds from here on.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.push((key.to_string(), value.to_string()));
        self
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    fn base_path(&self) -> String {
        let existing = std::env::var("PATH").unwrap_or_default();
        format!("{}:{existing}", self.stub_dir.path().display())
    }

    fn apply_env(&self, cmd: &mut Command) {
        cmd.env("VOICE_STATE_DIR", self.state_dir.path());
        cmd.env("VOICE_AUDIO_BACKEND", "lavfi");
        cmd.env("VOICE_AUDIO_SOURCE", &self.audio_source);
        cmd.env("VOICE_TRANSCRIBE_CMD", self.stub_dir.path().join("voice-hotkey-transcribe"));
        cmd.env("VOICE_HOTKEYD_BIN", daemon_binary());
        cmd.env("PATH", self.base_path());
        cmd.env_remove("VOICE_WAKEWORD_ENABLED");
        for (key, value) in &self.extra_env {
            cmd.env(key, value);
        }
    }

    /// Runs `voice-hotkey <action>`, auto-starting the daemon on first
    /// use, and returns the completed process (rc is the exit code).
    pub fn run(&self, action: &str) -> Output {
        let mut cmd = Command::new(cli_binary());
        cmd.arg(action);
        self.apply_env(&mut cmd);
        cmd.output().expect("voice-hotkey should run")
    }

    pub fn run_json(&self, action: &str) -> Output {
        let mut cmd = Command::new(cli_binary());
        cmd.args([action, "--json"]);
        self.apply_env(&mut cmd);
        cmd.output().expect("voice-hotkey should run")
    }

    /// Spawns `voice-hotkey <action>` without waiting for it, for tests
    /// that need two actions in flight at once (a long `command-auto`
    /// racing a `command-stop`, a queue-full probe during a blocking
    /// first request).
    pub fn spawn(&self, action: &str) -> std::process::Child {
        let mut cmd = Command::new(cli_binary());
        cmd.arg(action);
        self.apply_env(&mut cmd);
        cmd.spawn().expect("voice-hotkey should spawn")
    }

    pub fn injected_text(&self) -> Option<String> {
        std::fs::read_to_string(&self.inject_log).ok()
    }

    pub fn daemon_log(&self) -> String {
        std::fs::read_to_string(self.state_dir.path().join("voice-hotkey.log")).unwrap_or_default()
    }

    pub fn dictate_state_path(&self) -> PathBuf {
        self.state_dir.path().join("voice-hotkey-dictate.json")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut cmd = Command::new(cli_binary());
        cmd.arg("shutdown");
        self.apply_env(&mut cmd);
        cmd.stdout(std::process::Stdio::null()).stderr(std::process::Stdio::null());
        let _ = cmd.status();
    }
}

pub fn rc_of(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

/// Poll `condition` until it's true or `timeout` elapses.
pub fn wait_for<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}
