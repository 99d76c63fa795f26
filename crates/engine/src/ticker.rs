// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic wall-clock idle check

use crate::registry::SessionRegistry;
use th_adapters::{Multiplexer, PtyAdapter};
use th_core::{Clock, IdGen};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawn a task that ticks every session's detector at the configured interval.
///
/// A slow tick is not caught up; the next one simply runs on schedule.
pub fn spawn_ticker<P, M, C, I>(registry: SessionRegistry<P, M, C, I>) -> JoinHandle<()>
where
    P: PtyAdapter,
    M: Multiplexer,
    C: Clock,
    I: IdGen,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(registry.config().tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            registry.tick();
        }
    })
}

#[cfg(test)]
#[path = "ticker_tests.rs"]
mod tests;
