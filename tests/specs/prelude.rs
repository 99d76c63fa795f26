//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use th_adapters::{Multiplexer, NativePtyAdapter, TmuxMultiplexer};
use th_core::{SessionEvent, SystemClock, UuidIdGen};
use th_engine::{
    EngineConfig, EventBus, HistoryRecorder, Persistence, RegistryDeps, SessionRegistry,
    Subscription,
};

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>
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

/// The `thd` binary, if it has been built
pub fn thd_binary() -> Option<PathBuf> {
    let path = binary_path("thd");
    if path.exists() {
        Some(path)
    } else {
        eprintln!("skipping: thd binary not built (run `cargo build --workspace`)");
        None
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

/// Async flavor of [`wait_for`]
pub async fn wait_until<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
    false
}

/// Next event matching `pred`, skipping others
pub async fn next_matching<F>(events: &mut Subscription, mut pred: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_millis(SPEC_WAIT_MAX_MS), async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

// =============================================================================
// Daemon
// =============================================================================

/// A `thd` process with an isolated state directory.
pub struct Daemon {
    state_dir: tempfile::TempDir,
    child: Option<Child>,
}

impl Daemon {
    pub fn new() -> Self {
        Self {
            state_dir: tempfile::tempdir().unwrap(),
            child: None,
        }
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_path().join("daemon.pid")
    }

    /// Command for `thd` in this state directory; plain sessions so tests
    /// never touch the user's tmux server
    pub fn command(&self, thd: &Path) -> Command {
        let mut cmd = Command::new(thd);
        cmd.env("TH_STATE_DIR", self.state_path())
            .env("TH_PERSISTENCE", "false")
            .env("RUST_LOG", "debug")
            .stdin(Stdio::null());
        cmd
    }

    /// Start the daemon in the background and wait for its PID file
    pub fn start(&mut self, thd: &Path) {
        let child = self
            .command(thd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        self.child = Some(child);
        let pid_path = self.pid_path();
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || {
                std::fs::read_to_string(&pid_path).is_ok_and(|s| !s.trim().is_empty())
            }),
            "daemon did not write its pid; log:\n{}",
            self.log()
        );
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Send SIGTERM and wait for exit; returns whether it exited cleanly
    pub fn stop(&mut self) -> bool {
        let Some(mut child) = self.child.take() else {
            return false;
        };
        let sent = Command::new("kill")
            .args(["-TERM", &child.id().to_string()])
            .status()
            .is_ok_and(|s| s.success());
        if !sent {
            let _ = child.kill();
        }
        let mut status = None;
        wait_for(SPEC_WAIT_MAX_MS, || {
            status = child.try_wait().ok().flatten();
            status.is_some()
        });
        match status {
            Some(status) => status.success(),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                false
            }
        }
    }

    /// Read the daemon log file contents (for debugging test failures)
    pub fn log(&self) -> String {
        let log_path = self.state_path().join("daemon.log");
        std::fs::read_to_string(&log_path).unwrap_or_else(|_| "(no daemon log)".to_string())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

pub type LiveRegistry = SessionRegistry<NativePtyAdapter, TmuxMultiplexer>;

/// Engine config tuned so idle detection settles quickly
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig {
        idle_timer: Duration::from_millis(100),
        idle_threshold: Duration::from_millis(200),
        tick_interval: Duration::from_millis(50),
        ..EngineConfig::default()
    };
    // A prompt ending in `>` would read as waiting for input
    config.default_env.push(("PS1".to_string(), "$ ".to_string()));
    config
}

/// A registry running sessions in real pseudo-terminals
pub fn registry(config: EngineConfig, backend: Persistence<TmuxMultiplexer>) -> LiveRegistry {
    SessionRegistry::new(
        config,
        RegistryDeps {
            pty: NativePtyAdapter::new(),
            backend,
            clock: SystemClock,
            ids: UuidIdGen,
            history: HistoryRecorder::disabled(),
            bus: EventBus::default(),
        },
    )
}

/// A tmux multiplexer if tmux is installed and answers
pub async fn tmux() -> Option<TmuxMultiplexer> {
    let mux = TmuxMultiplexer::new();
    match mux.probe().await {
        Ok(_) => Some(mux),
        Err(e) => {
            eprintln!("skipping: tmux unavailable ({e})");
            None
        }
    }
}
