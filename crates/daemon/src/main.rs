// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Treehouse Daemon (thd)
//!
//! Background process that owns the terminal sessions of agent CLIs.
//!
//! Architecture:
//! - Session Registry: spawns processes, pumps their output, tracks state
//! - Ticker: periodic idle checks
//! - Event Log: bus subscriber mirroring session events into the log

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod event_log;
mod lifecycle;
mod logging;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::lifecycle::{Config, LifecycleError};
use crate::logging::{rotate_log_if_needed, setup_logging, write_startup_error, write_startup_marker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("thd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("thd {}", env!("CARGO_PKG_VERSION"));
                println!("Treehouse Daemon - keeps agent CLI sessions alive in pseudo-terminals");
                println!();
                println!("USAGE:");
                println!("    thd");
                println!();
                println!("Sessions run inside tmux when it is installed, so they survive");
                println!("a daemon restart. State lives under $TH_STATE_DIR");
                println!("(default ~/.local/state/th).");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: thd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    // Lock before touching the log: a refused daemon must not rotate or
    // write into the running daemon's files
    let lock = match lifecycle::acquire_lock(&config) {
        Ok(lock) => lock,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("thd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    rotate_log_if_needed(&config.log_path);
    // Written before tracing setup so a supervisor can find where this run starts
    let log_guard = match write_startup_marker(&config).and_then(|()| setup_logging(&config)) {
        Ok(guard) => guard,
        Err(e) => {
            let _ = std::fs::remove_file(&config.lock_path);
            return Err(e.into());
        }
    };

    info!("Starting user-level daemon");

    let daemon = match lifecycle::startup(&config, lock).await {
        Ok(daemon) => daemon,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        sessions = daemon.registry.len(),
        restored = daemon.recovery.restored.len(),
        "Daemon ready"
    );

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    daemon.shutdown().await?;
    drop(log_guard);
    Ok(())
}
