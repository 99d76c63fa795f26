// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::Persistence;
use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::history::HistoryRecorder;
use crate::registry::RegistryDeps;
use std::time::Duration;
use th_adapters::{FakeMultiplexer, FakePtyAdapter};
use th_core::{FakeClock, OwnerKey, SequentialIdGen, SessionEvent, SessionState, TerminalSize};

#[tokio::test(start_paused = true)]
async fn ticker_moves_silent_sessions_to_idle() {
    let pty = FakePtyAdapter::new();
    let clock = FakeClock::new();
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let config = EngineConfig {
        tick_interval: Duration::from_millis(100),
        ..EngineConfig::default()
    };
    let registry: SessionRegistry<FakePtyAdapter, FakeMultiplexer, FakeClock, SequentialIdGen> =
        SessionRegistry::new(
            config,
            RegistryDeps {
                pty: pty.clone(),
                backend: Persistence::Plain,
                clock: clock.clone(),
                ids: SequentialIdGen::default(),
                history: HistoryRecorder::disabled(),
                bus,
            },
        );
    let dir = tempfile::tempdir().unwrap();
    registry
        .create(OwnerKey::user("alice"), dir.path(), "sh", TerminalSize::default())
        .await
        .unwrap();

    let ticker = spawn_ticker(registry.clone());
    clock.advance(Duration::from_secs(5));

    let state = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if let Some(SessionEvent::StateChanged { state, .. }) = events.recv().await {
                return state;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(state, SessionState::Idle);
    ticker.abort();
}
