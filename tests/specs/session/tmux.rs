//! Session persistence specs on a real tmux server
//!
//! Skipped when tmux is not installed. Each spec uses its own session name
//! prefix and removes its sessions when done.

use crate::prelude::*;
use serial_test::serial;
use th_adapters::{Multiplexer, TmuxMultiplexer};
use th_core::{OwnerKey, SessionEvent, TerminalSize};
use th_engine::{EngineConfig, EngineError, Persistence, SessionRecord};

fn config(prefix: &str) -> EngineConfig {
    EngineConfig {
        mux_prefix: prefix.to_string(),
        ..fast_config()
    }
}

fn unique_prefix(test: &str) -> String {
    format!("th-spec-{}-{}-", test, std::process::id())
}

/// Kill every tmux session under `prefix`
async fn cleanup(mux: &TmuxMultiplexer, prefix: &str) {
    for session in mux.list_all(prefix).await.unwrap_or_default() {
        let _ = mux.kill(&session.name).await;
    }
}

#[tokio::test]
#[serial(tmux)]
async fn sessions_survive_an_engine_restart() {
    let Some(mux) = tmux().await else { return };
    let prefix = unique_prefix("restart");
    let work = tempfile::tempdir().unwrap();

    let first = registry(config(&prefix), Persistence::Multiplexer(mux.clone()));
    let info = first
        .create(OwnerKey::worktree("alice", work.path()), work.path(), "sh", TerminalSize::default())
        .await
        .unwrap();
    assert!(info.persistent);
    first.write(&info.id, b"MARK=kept-$((1+1))\n").await.unwrap();
    first.shutdown().await;

    let name = info.id.mux_name(&prefix);
    assert!(mux.exists(&name).await.unwrap(), "tmux session should outlive the engine");

    let second = registry(config(&prefix), Persistence::Multiplexer(mux.clone()));
    let report = second
        .recover(vec![SessionRecord {
            id: info.id.clone(),
            owner: info.owner.clone(),
            dir: info.cwd.clone(),
            command: info.command.clone(),
            created_at_ms: info.created_at_ms,
        }])
        .await
        .unwrap();
    assert_eq!(report.restored, vec![info.id.clone()]);
    assert!(!second.get(&info.id).unwrap().attached);

    let mut events = second.subscribe();
    second.write(&info.id, b"echo $MARK\n").await.unwrap();
    assert!(second.get(&info.id).unwrap().attached);

    let id = info.id.clone();
    let mut seen = Vec::new();
    next_matching(&mut events, |event| {
        if let SessionEvent::Data { id: from, bytes } = event {
            if *from == id {
                seen.extend_from_slice(bytes);
            }
        }
        String::from_utf8_lossy(&seen).contains("kept-2")
    })
    .await;

    second.destroy(&info.id).await;
    assert!(!mux.exists(&name).await.unwrap());
    cleanup(&mux, &prefix).await;
}

#[tokio::test]
#[serial(tmux)]
async fn killed_tmux_session_fails_reattach() {
    let Some(mux) = tmux().await else { return };
    let prefix = unique_prefix("vanish");
    let work = tempfile::tempdir().unwrap();

    let engine = registry(config(&prefix), Persistence::Multiplexer(mux.clone()));
    let info = engine
        .create(OwnerKey::user("alice"), work.path(), "sh", TerminalSize::default())
        .await
        .unwrap();
    engine.shutdown().await;

    mux.kill(&info.id.mux_name(&prefix)).await.unwrap();
    let err = engine.reattach(&info.id, TerminalSize::default()).await.unwrap_err();
    assert!(matches!(err, EngineError::ReattachFailed { .. }), "got {err:?}");
    assert!(engine.get(&info.id).is_none());
    cleanup(&mux, &prefix).await;
}

#[tokio::test]
#[serial(tmux)]
async fn orphaned_tmux_sessions_are_reported_not_killed() {
    let Some(mux) = tmux().await else { return };
    let prefix = unique_prefix("orphan");
    let work = tempfile::tempdir().unwrap();

    let engine = registry(config(&prefix), Persistence::Multiplexer(mux.clone()));
    let info = engine
        .create(OwnerKey::user("alice"), work.path(), "sh", TerminalSize::default())
        .await
        .unwrap();
    engine.shutdown().await;

    let fresh = registry(config(&prefix), Persistence::Multiplexer(mux.clone()));
    let report = fresh.recover(Vec::new()).await.unwrap();
    let name = info.id.mux_name(&prefix);
    assert_eq!(report.orphaned, vec![name.clone()]);
    assert!(fresh.is_empty());
    assert!(mux.exists(&name).await.unwrap());
    cleanup(&mux, &prefix).await;
}
