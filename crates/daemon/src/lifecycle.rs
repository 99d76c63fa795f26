// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use th_adapters::{
    Multiplexer, NativePtyAdapter, PtyAdapter, TmuxMultiplexer, TracedMultiplexer,
};
use th_core::{SystemClock, UuidIdGen};
use th_daemon::JsonlHistory;
use th_engine::{
    spawn_ticker, EngineConfig, EventBus, HistoryError, HistoryRecorder,
    HistoryStore, Persistence, RecoveryReport, RegistryDeps, SessionRegistry,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::event_log::spawn_event_log;

/// Daemon on the production adapters (multiplexer wrapped with tracing)
pub type Daemon = DaemonState<NativePtyAdapter, TracedMultiplexer<TmuxMultiplexer>>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/th)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the JSON-lines session history
    pub history_path: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Paths live under `~/.local/state/th/` (or `$XDG_STATE_HOME/th/`);
    /// engine knobs come from `TH_*` variables.
    pub fn load() -> Result<Self, LifecycleError> {
        let mut config = Self::in_dir(crate::env::state_dir()?);
        config.engine = EngineConfig::from_env();
        Ok(config)
    }

    /// Default engine settings with every path under `state_dir`
    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            history_path: state_dir.join("history.jsonl"),
            engine: EngineConfig::default(),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state during operation
pub struct DaemonState<P, M> {
    pub config: Config,
    #[allow(dead_code)]
    lock: DaemonLock,
    pub registry: SessionRegistry<P, M>,
    /// What startup recovery found
    pub recovery: RecoveryReport,
    recorder: HistoryRecorder,
    history_worker: JoinHandle<()>,
    ticker: JoinHandle<()>,
    event_log: JoinHandle<()>,
}

/// Exclusive hold on the daemon's PID file
pub struct DaemonLock {
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    file: File,
}

/// Take the single-instance lock and write our PID.
///
/// Runs before anything else touches the state directory, so a refused
/// second daemon leaves the running one's files alone.
pub fn acquire_lock(config: &Config) -> Result<DaemonLock, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Opening without truncation keeps a running daemon's PID intact until
    // we actually hold the lock.
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(DaemonLock { file })
}

/// Start the daemon with the production adapters
pub async fn startup(config: &Config, lock: DaemonLock) -> Result<Daemon, LifecycleError> {
    let mux = TracedMultiplexer::new(TmuxMultiplexer::with_timeout(config.engine.mux_timeout));
    startup_with(config, lock, NativePtyAdapter::new(), mux).await
}

/// Start the daemon on the given adapters while holding `lock`.
///
/// On failure the PID file is removed; the lock is released when `lock` drops.
pub async fn startup_with<P, M>(
    config: &Config,
    lock: DaemonLock,
    pty: P,
    mux: M,
) -> Result<DaemonState<P, M>, LifecycleError>
where
    P: PtyAdapter,
    M: Multiplexer,
{
    match startup_inner(config, lock, pty, mux).await {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

async fn startup_inner<P, M>(
    config: &Config,
    lock: DaemonLock,
    pty: P,
    mux: M,
) -> Result<DaemonState<P, M>, LifecycleError>
where
    P: PtyAdapter,
    M: Multiplexer,
{
    // 1. Open history and find what the previous run left open
    let history = Arc::new(JsonlHistory::open(&config.history_path)?);
    let active = history.active_sessions().await?;
    let (recorder, history_worker) = HistoryRecorder::spawn(history);

    // 2. Pick the persistence backend; an absent multiplexer is not fatal
    let backend = Persistence::probe(mux, config.engine.persistence).await;

    // 3. Wire the registry
    let bus = EventBus::default();
    let event_log = spawn_event_log(bus.subscribe());
    let registry = SessionRegistry::new(
        config.engine.clone(),
        RegistryDeps {
            pty,
            backend,
            clock: SystemClock,
            ids: UuidIdGen,
            history: recorder.clone(),
            bus,
        },
    );

    // 4. Reconcile surviving multiplexer sessions
    let recovery = match registry.recover(active).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "recovery failed, starting with no sessions");
            RecoveryReport::default()
        }
    };

    // 5. Idle checks
    let ticker = spawn_ticker(registry.clone());

    info!(
        persistent = registry.is_persistent(),
        restored = recovery.restored.len(),
        "daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        lock,
        registry,
        recovery,
        recorder,
        history_worker,
        ticker,
        event_log,
    })
}

impl<P, M> DaemonState<P, M>
where
    P: PtyAdapter,
    M: Multiplexer,
{
    /// Shutdown the daemon gracefully.
    ///
    /// Multiplexer-backed sessions are only detached so the next start can
    /// recover them; plain sessions die with the daemon.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop idle checks, then release every session
        self.ticker.abort();
        self.registry.shutdown().await;

        // 2. Drain pending history writes
        self.recorder.flush().await;
        drop(self.recorder);
        drop(self.registry);
        self.history_worker.abort();
        self.event_log.abort();

        // 3. Remove PID file; the lock itself is released when `lock` drops
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
