//! Session specs on real pseudo-terminals
//!
//! Drive the registry against `sh` in a PTY without a multiplexer.

use crate::prelude::*;
use th_core::{OwnerKey, SessionEvent, SessionState, TerminalSize};
use th_engine::{spawn_ticker, EngineConfig, EngineError, Persistence};

fn buffer_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

#[tokio::test]
async fn shell_output_reaches_buffer_and_bus() {
    let work = tempfile::tempdir().unwrap();
    let registry = registry(EngineConfig::default(), Persistence::Plain);
    let mut events = registry.subscribe();

    let info = registry
        .create(OwnerKey::user("alice"), work.path(), "sh", TerminalSize::default())
        .await
        .unwrap();
    assert!(!info.persistent);
    assert!(info.pid.is_some());

    registry.write(&info.id, b"echo treehouse-$((40+2))\n").await.unwrap();

    let id = info.id.clone();
    let mut seen = Vec::new();
    next_matching(&mut events, |event| {
        if let SessionEvent::Data { id: from, bytes } = event {
            if *from == id {
                seen.extend_from_slice(bytes);
            }
        }
        buffer_text(&seen).contains("treehouse-42")
    })
    .await;

    let buffer = registry.get_buffer(&info.id).await.unwrap();
    assert!(buffer_text(&buffer).contains("treehouse-42"));
    registry.destroy(&info.id).await;
}

#[tokio::test]
async fn shell_exit_publishes_code_then_destroys() {
    let work = tempfile::tempdir().unwrap();
    let registry = registry(EngineConfig::default(), Persistence::Plain);
    let mut events = registry.subscribe();

    let info = registry
        .create(OwnerKey::user("alice"), work.path(), "sh", TerminalSize::default())
        .await
        .unwrap();
    registry.write(&info.id, b"exit 7\n").await.unwrap();

    let exit = next_matching(&mut events, |e| matches!(e, SessionEvent::Exit { .. })).await;
    assert_eq!(
        exit,
        SessionEvent::Exit {
            id: info.id.clone(),
            code: Some(7)
        }
    );
    next_matching(&mut events, |e| matches!(e, SessionEvent::Destroyed { .. })).await;

    assert!(registry.get(&info.id).is_none());
    let err = registry.write(&info.id, b"echo\n").await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn silent_shell_settles_to_idle() {
    let work = tempfile::tempdir().unwrap();
    let registry = registry(fast_config(), Persistence::Plain);
    let ticker = spawn_ticker(registry.clone());

    let info = registry
        .create(OwnerKey::user("alice"), work.path(), "sh", TerminalSize::default())
        .await
        .unwrap();
    registry.write(&info.id, b"echo working\n").await.unwrap();

    let id = info.id.clone();
    assert!(
        wait_until(SPEC_WAIT_MAX_MS, || {
            registry
                .get(&id)
                .is_some_and(|s| s.state == SessionState::Idle && s.buffered_bytes > 0)
        })
        .await,
        "session did not settle: {:?}",
        registry.get(&id)
    );

    ticker.abort();
    registry.destroy(&info.id).await;
}

#[tokio::test]
async fn resize_reaches_the_process() {
    let work = tempfile::tempdir().unwrap();
    let registry = registry(EngineConfig::default(), Persistence::Plain);
    let mut events = registry.subscribe();

    let info = registry
        .create(OwnerKey::user("alice"), work.path(), "sh", TerminalSize::new(80, 24))
        .await
        .unwrap();
    registry.resize(&info.id, 132, 43).await.unwrap();
    assert_eq!(registry.get(&info.id).unwrap().size, TerminalSize::new(132, 43));

    registry.write(&info.id, b"stty size\n").await.unwrap();
    let id = info.id.clone();
    let mut seen = Vec::new();
    next_matching(&mut events, |event| {
        if let SessionEvent::Data { id: from, bytes } = event {
            if *from == id {
                seen.extend_from_slice(bytes);
            }
        }
        buffer_text(&seen).contains("43 132")
    })
    .await;
    registry.destroy(&info.id).await;
}

#[tokio::test]
async fn plain_shutdown_ends_every_session() {
    let work = tempfile::tempdir().unwrap();
    let registry = registry(EngineConfig::default(), Persistence::Plain);

    for user in ["alice", "bob"] {
        registry
            .create(OwnerKey::user(user), work.path(), "sh", TerminalSize::default())
            .await
            .unwrap();
    }
    assert_eq!(registry.len(), 2);

    registry.shutdown().await;
    assert!(registry.is_empty());
}
