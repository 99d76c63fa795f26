// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence backend selection.
//!
//! Sessions run either as plain PTY processes that die with the engine, or
//! inside named multiplexer sessions that survive it. The choice is made
//! once at startup; the registry only asks which one is active.

use crate::error::EngineError;
use th_adapters::Multiplexer;

#[derive(Clone, Debug)]
pub enum Persistence<M> {
    /// Processes are children of the engine
    Plain,
    /// Processes live in multiplexer sessions
    Multiplexer(M),
}

impl<M: Multiplexer> Persistence<M> {
    /// Pick the multiplexer when enabled and its binary answers.
    ///
    /// An unavailable multiplexer downgrades to [`Persistence::Plain`];
    /// startup never fails on it.
    pub async fn probe(mux: M, enabled: bool) -> Self {
        if !enabled {
            tracing::info!("multiplexer persistence disabled");
            return Persistence::Plain;
        }
        match mux.probe().await {
            Ok(version) => {
                tracing::info!(version = %version, "sessions will persist in the multiplexer");
                Persistence::Multiplexer(mux)
            }
            Err(e) => {
                let err = EngineError::from(e);
                tracing::warn!(error = %err, kind = err.kind(), "continuing without persistence");
                Persistence::Plain
            }
        }
    }
}

impl<M> Persistence<M> {
    pub fn is_persistent(&self) -> bool {
        matches!(self, Persistence::Multiplexer(_))
    }

    pub fn multiplexer(&self) -> Option<&M> {
        match self {
            Persistence::Multiplexer(mux) => Some(mux),
            Persistence::Plain => None,
        }
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
