// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon log file: rotation, startup marker and the tracing subscriber.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::lifecycle::{Config, LifecycleError};

/// Size at which the log is rotated on startup
pub const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated files kept: `daemon.log.1` (newest) to `daemon.log.3`
const MAX_ROTATIONS: usize = 3;

/// Startup marker prefix written to the log before anything else.
/// Full format: "--- thd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- thd: starting (pid: ";

/// Rotate `log` if it has grown past [`MAX_LOG_SIZE`], dropping the oldest.
pub fn rotate_log_if_needed(log: &Path) {
    let Ok(meta) = std::fs::metadata(log) else {
        return;
    };
    if meta.len() <= MAX_LOG_SIZE {
        return;
    }
    for n in (1..MAX_ROTATIONS).rev() {
        let from = rotated(log, n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated(log, n + 1));
        }
    }
    if let Err(e) = std::fs::rename(log, rotated(log, 1)) {
        eprintln!("warning: failed to rotate {}: {}", log.display(), e);
    }
}

fn rotated(log: &Path, n: usize) -> PathBuf {
    let mut name = log.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Append the startup marker so a reader can find where this run begins
pub fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously; the tracing writer may not flush in time
pub fn write_startup_error(config: &Config, error: &LifecycleError) {
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

pub fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = config.log_path.parent().ok_or(LifecycleError::NoStateDir)?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(
        dir,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
