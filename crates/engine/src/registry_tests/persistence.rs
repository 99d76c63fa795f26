// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use th_adapters::PtyError;

fn record(id: &str, user: &str, dir: &Path) -> SessionRecord {
    SessionRecord {
        id: SessionId::new(id),
        owner: OwnerKey::user(user),
        dir: dir.to_path_buf(),
        command: "claude".to_string(),
        created_at_ms: 1_600_000_000_000,
    }
}

/// Create a session, then end its local attachment while the
/// multiplexer session keeps running
async fn detached_session(ctx: &mut TestContext) -> SessionInfo {
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);
    assert!(ctx.pty.exit(pid, Some(0)).await);
    settle().await;
    ctx.drain();
    info
}

#[tokio::test(start_paused = true)]
async fn create_starts_a_detached_multiplexer_session_then_attaches() {
    let ctx = setup_persistent();
    let info = ctx.create("alice").await;

    assert!(info.persistent);
    assert!(info.attached);
    let calls = ctx.mux.calls();
    assert!(matches!(
        &calls[..],
        [MuxCall::CreateDetached { name, command_line, .. }, MuxCall::Attach { name: attached }]
            if name == "th-s1" && command_line == "sh" && attached == "th-s1"
    ));
    assert_eq!(ctx.mux.session_names(), vec!["th-s1"]);

    let PtyCall::Spawn { request } = &ctx.pty.calls()[0] else {
        panic!("expected spawn");
    };
    assert_eq!(request.program, "tmux");
    assert!(request.args.contains(&"=th-s1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn multiplexer_create_failure_is_a_spawn_failure() {
    let ctx = setup_persistent();
    ctx.mux.fail_next_create("duplicate session: th-s1");

    let err = ctx
        .registry
        .create(OwnerKey::user("alice"), ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "spawn_failed");
    assert_eq!(ctx.pty.spawn_count(), 0);
    assert!(ctx.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_attach_kills_the_new_multiplexer_session() {
    let ctx = setup_persistent();
    ctx.pty
        .fail_next_spawn(PtyError::SpawnFailed("no ptys left".to_string()));

    let err = ctx
        .registry
        .create(OwnerKey::user("alice"), ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "spawn_failed");
    assert!(ctx.mux.calls().contains(&MuxCall::Kill {
        name: "th-s1".to_string()
    }));
    assert!(ctx.mux.session_names().is_empty());
    assert!(ctx.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn attachment_ending_keeps_a_live_multiplexer_session() {
    let mut ctx = setup_persistent();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);
    ctx.drain();

    assert!(ctx.pty.exit(pid, Some(0)).await);
    settle().await;

    let after = ctx.registry.get(&info.id).unwrap();
    assert!(!after.attached);
    assert_eq!(after.pid, None);
    assert!(ctx.drain().is_empty());
    assert_eq!(ctx.mux.session_names(), vec!["th-s1"]);
}

#[tokio::test(start_paused = true)]
async fn attachment_ending_cancels_the_pending_idle_timer() {
    let mut ctx = setup_persistent();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"Reading files... (esc to interrupt)\r\n")
        .await;
    let pid = ctx.pid(&info.id);
    ctx.drain();

    assert!(ctx.pty.exit(pid, Some(0)).await);
    settle().await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(state_changes(&ctx.drain()).is_empty());
    assert_eq!(ctx.registry.get(&info.id).unwrap().state, SessionState::Busy);
}

#[tokio::test(start_paused = true)]
async fn write_reattaches_and_restores_the_pane() {
    let mut ctx = setup_persistent();
    let info = detached_session(&mut ctx).await;
    ctx.mux.set_pane("th-s1", "line one\nline two");

    ctx.registry.write(&info.id, b"ls\n").await.unwrap();

    assert_eq!(ctx.pty.spawn_count(), 2);
    let pid = ctx.pty.last_pid().unwrap();
    assert_eq!(ctx.pid(&info.id), pid);
    assert_eq!(ctx.pty.process(pid).unwrap().written, b"ls\n");
    assert!(ctx.mux.calls().contains(&MuxCall::Capture {
        name: "th-s1".to_string(),
        max_lines: 2000,
    }));
    assert_eq!(
        ctx.registry.get_buffer(&info.id).await.unwrap(),
        b"line one\nline two"
    );
}

#[tokio::test(start_paused = true)]
async fn reattach_keeps_only_the_last_status_line() {
    let mut ctx = setup_persistent();
    let info = detached_session(&mut ctx).await;
    ctx.mux.set_pane(
        "th-s1",
        "a\n[th-s1] 0:sh* \"host\" 14:32 05-Mar-26\nb\n[th-s1] 0:sh* \"host\" 14:33 05-Mar-26",
    );

    let after = ctx
        .registry
        .reattach(&info.id, TerminalSize::default())
        .await
        .unwrap();

    assert!(after.attached);
    assert_eq!(
        String::from_utf8(ctx.registry.get_buffer(&info.id).await.unwrap()).unwrap(),
        "a\nb\n[th-s1] 0:sh* \"host\" 14:33 05-Mar-26"
    );
}

#[tokio::test(start_paused = true)]
async fn output_after_reattach_flows_again() {
    let mut ctx = setup_persistent();
    let info = detached_session(&mut ctx).await;
    ctx.registry
        .reattach(&info.id, TerminalSize::default())
        .await
        .unwrap();
    ctx.drain();

    ctx.emit(&info.id, b"back\r\n").await;

    assert_eq!(ctx.drain_names(), vec!["session:data"]);
}

#[tokio::test(start_paused = true)]
async fn reattaching_an_attached_session_is_a_no_op() {
    let ctx = setup_persistent();
    let info = ctx.create("alice").await;

    let again = ctx
        .registry
        .reattach(&info.id, TerminalSize::default())
        .await
        .unwrap();

    assert_eq!(again.pid, info.pid);
    assert_eq!(ctx.pty.spawn_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn resize_while_detached_reattaches_at_the_new_size() {
    let mut ctx = setup_persistent();
    let info = detached_session(&mut ctx).await;

    ctx.registry.resize(&info.id, 90, 30).await.unwrap();

    let calls = ctx.pty.calls();
    let Some(PtyCall::Spawn { request }) = calls
        .iter()
        .rev()
        .find(|c| matches!(c, PtyCall::Spawn { .. }))
    else {
        panic!("expected a second spawn");
    };
    assert_eq!(request.size, TerminalSize::new(90, 30));
    assert_eq!(
        ctx.registry.get(&info.id).unwrap().size,
        TerminalSize::new(90, 30)
    );
}

#[tokio::test(start_paused = true)]
async fn vanished_multiplexer_session_fails_reattach_and_is_destroyed() {
    let mut ctx = setup_persistent();
    let info = detached_session(&mut ctx).await;
    ctx.mux.end_session("th-s1");

    let err = ctx
        .registry
        .reattach(&info.id, TerminalSize::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ReattachFailed { ref id, .. } if *id == info.id));
    assert!(ctx.registry.get(&info.id).is_none());
    assert_eq!(ctx.drain_names(), vec!["session:destroyed"]);
}

#[tokio::test(start_paused = true)]
async fn write_to_a_vanished_session_reports_a_dead_session() {
    let mut ctx = setup_persistent();
    let info = detached_session(&mut ctx).await;
    ctx.mux.end_session("th-s1");

    let err = ctx.registry.write(&info.id, b"x").await.unwrap_err();

    assert!(matches!(err, EngineError::WriteToDeadSession(ref id) if *id == info.id));
    assert!(ctx.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn multiplexer_session_ending_destroys_the_session() {
    let mut ctx = setup_persistent();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);
    ctx.drain();

    ctx.mux.end_session("th-s1");
    assert!(ctx.pty.exit(pid, Some(1)).await);
    settle().await;

    assert_eq!(
        ctx.drain_names(),
        vec!["session:exit", "session:destroyed"]
    );
    assert!(ctx.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn destroy_kills_the_multiplexer_session() {
    let ctx = setup_persistent();
    let info = ctx.create("alice").await;

    ctx.registry.destroy(&info.id).await;

    assert!(ctx.mux.calls().contains(&MuxCall::Kill {
        name: "th-s1".to_string()
    }));
    assert!(ctx.mux.session_names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_detaches_but_keeps_multiplexer_sessions() {
    let mut ctx = setup_persistent();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);
    ctx.drain();

    ctx.registry.shutdown().await;
    settle().await;

    assert!(ctx.drain().is_empty());
    assert!(ctx.pty.calls().contains(&PtyCall::Kill { pid }));
    assert_eq!(ctx.mux.session_names(), vec!["th-s1"]);
    assert!(!ctx.registry.get(&info.id).unwrap().attached);
}

#[tokio::test(start_paused = true)]
async fn recover_restores_known_sessions_and_reports_the_rest() {
    let mut ctx = setup_persistent();
    let dir = ctx.cwd().to_path_buf();
    ctx.mux.add_session("th-old1", &dir, "restored pane");
    ctx.mux.add_session("th-stray", &dir, "");

    let report = ctx
        .registry
        .recover(vec![record("old1", "alice", &dir), record("gone1", "alice", &dir)])
        .await
        .unwrap();

    assert_eq!(
        report,
        RecoveryReport {
            restored: vec![SessionId::new("old1")],
            orphaned: vec!["th-stray".to_string()],
            closed: vec![SessionId::new("gone1")],
        }
    );

    let restored = ctx.registry.get(&SessionId::new("old1")).unwrap();
    assert!(restored.persistent);
    assert!(!restored.attached);
    assert_eq!(restored.owner, OwnerKey::user("alice"));
    assert_eq!(restored.created_at_ms, 1_600_000_000_000);
    assert_eq!(ctx.drain_names(), vec!["session:created"]);
    assert!(ctx.history_calls().await.contains(&HistoryCall::Close {
        id: SessionId::new("gone1"),
        exit_code: None,
    }));
    // Orphans are reported, never killed
    assert!(ctx.mux.session_names().contains(&"th-stray".to_string()));
}

#[tokio::test(start_paused = true)]
async fn restored_session_serves_its_buffer_from_the_multiplexer() {
    let ctx = setup_persistent();
    let dir = ctx.cwd().to_path_buf();
    ctx.mux.add_session("th-old1", &dir, "restored pane");
    ctx.registry
        .recover(vec![record("old1", "alice", &dir)])
        .await
        .unwrap();

    let buffer = ctx
        .registry
        .get_buffer(&SessionId::new("old1"))
        .await
        .unwrap();

    assert_eq!(buffer, b"restored pane");
    assert_eq!(ctx.pty.spawn_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn restored_sessions_count_against_the_quota() {
    let config = EngineConfig {
        max_sessions_per_owner: 1,
        ..EngineConfig::default()
    };
    let ctx = setup_with(config, true);
    let dir = ctx.cwd().to_path_buf();
    ctx.mux.add_session("th-old1", &dir, "");
    ctx.registry
        .recover(vec![record("old1", "alice", &dir)])
        .await
        .unwrap();

    let result = ctx
        .registry
        .create(OwnerKey::user("alice"), &dir, "sh", TerminalSize::default())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::SessionQuotaExceeded { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn recover_without_a_multiplexer_closes_everything() {
    let ctx = setup();
    let dir = ctx.cwd().to_path_buf();

    let report = ctx
        .registry
        .recover(vec![record("old1", "alice", &dir)])
        .await
        .unwrap();

    assert!(report.restored.is_empty());
    assert_eq!(report.closed, vec![SessionId::new("old1")]);
    assert!(ctx.registry.is_empty());
}
