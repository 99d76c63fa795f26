// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry tests

mod create;
mod detection;
mod lifecycle;
mod persistence;

use super::*;
use crate::history::{FakeHistory, HistoryCall};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use th_adapters::{FakeMultiplexer, FakePtyAdapter, MuxCall, PtyCall};
use th_core::{FakeClock, SequentialIdGen, SessionState};

type TestRegistry = SessionRegistry<FakePtyAdapter, FakeMultiplexer, FakeClock, SequentialIdGen>;

/// Test context holding the registry and its fakes
struct TestContext {
    registry: TestRegistry,
    pty: FakePtyAdapter,
    mux: FakeMultiplexer,
    clock: FakeClock,
    history: FakeHistory,
    recorder: HistoryRecorder,
    events: Subscription,
    dir: TempDir,
}

fn setup() -> TestContext {
    setup_with(EngineConfig::default(), false)
}

fn setup_persistent() -> TestContext {
    setup_with(EngineConfig::default(), true)
}

fn setup_with(config: EngineConfig, persistent: bool) -> TestContext {
    let pty = FakePtyAdapter::new();
    let mux = FakeMultiplexer::new();
    let clock = FakeClock::new();
    let history = FakeHistory::new();
    let (recorder, _worker) = HistoryRecorder::spawn(Arc::new(history.clone()));
    let bus = EventBus::default();
    let events = bus.subscribe();

    let backend = if persistent {
        Persistence::Multiplexer(mux.clone())
    } else {
        Persistence::Plain
    };
    let registry = SessionRegistry::new(
        config,
        RegistryDeps {
            pty: pty.clone(),
            backend,
            clock: clock.clone(),
            ids: SequentialIdGen::new("s"),
            history: recorder.clone(),
            bus,
        },
    );

    TestContext {
        registry,
        pty,
        mux,
        clock,
        history,
        recorder,
        events,
        dir: tempfile::tempdir().unwrap(),
    }
}

impl TestContext {
    fn cwd(&self) -> &Path {
        self.dir.path()
    }

    /// Create a plain shell session for `user`
    async fn create(&self, user: &str) -> SessionInfo {
        self.registry
            .create(OwnerKey::user(user), self.cwd(), "sh", TerminalSize::default())
            .await
            .unwrap()
    }

    fn pid(&self, id: &SessionId) -> u32 {
        self.registry.get(id).unwrap().pid.unwrap()
    }

    async fn emit(&self, id: &SessionId, bytes: &[u8]) {
        assert!(self.pty.emit(self.pid(id), bytes.to_vec()).await);
        settle().await;
    }

    /// Next event on the bus, failing the test if none arrives
    async fn next_event(&mut self) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("bus closed")
    }

    /// Skip events until one matches
    async fn wait_for(&mut self, pred: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        loop {
            let event = self.next_event().await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Everything published so far
    fn drain(&mut self) -> Vec<SessionEvent> {
        std::iter::from_fn(|| self.events.try_recv()).collect()
    }

    fn drain_names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(SessionEvent::name).collect()
    }

    async fn history_calls(&self) -> Vec<HistoryCall> {
        self.recorder.flush().await;
        self.history.calls()
    }
}

/// Let spawned pumps and timers run until they block
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn state_changes(events: &[SessionEvent]) -> Vec<SessionState> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}
