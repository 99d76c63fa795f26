// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::history::LineKind;

#[tokio::test(start_paused = true)]
async fn output_is_buffered_and_published() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"hello\r\n").await;
    ctx.emit(&info.id, b"world\r\n").await;

    assert_eq!(
        ctx.registry.get_buffer(&info.id).await.unwrap(),
        b"hello\r\nworld\r\n"
    );
    let data: Vec<Vec<u8>> = ctx
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Data { bytes, .. } => Some(bytes),
            _ => None,
        })
        .collect();
    assert_eq!(data, vec![b"hello\r\n".to_vec(), b"world\r\n".to_vec()]);
    assert_eq!(ctx.registry.get(&info.id).unwrap().buffered_bytes, 14);
}

#[tokio::test(start_paused = true)]
async fn terminal_reports_are_stripped_before_delivery() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"ok\x1b[?1;2c\x1b[12;40R\r\n").await;

    let event = ctx
        .wait_for(|e| matches!(e, SessionEvent::Data { .. }))
        .await;
    assert_eq!(
        event,
        SessionEvent::Data {
            id: info.id.clone(),
            bytes: b"ok\r\n".to_vec(),
        }
    );
    assert_eq!(ctx.registry.get_buffer(&info.id).await.unwrap(), b"ok\r\n");
}

#[tokio::test(start_paused = true)]
async fn output_lines_are_recorded_without_escapes() {
    let ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"\x1b[32mbuild ok\x1b[0m\r\n").await;
    ctx.emit(&info.id, b"\x1b[?25l\r\n").await;

    let lines: Vec<(String, LineKind)> = ctx
        .history_calls()
        .await
        .into_iter()
        .filter_map(|c| match c {
            HistoryCall::Line { content, kind, .. } => Some((content, kind)),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![("build ok".to_string(), LineKind::Output)]);
}

#[tokio::test(start_paused = true)]
async fn write_reaches_the_process_and_history() {
    let ctx = setup();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);

    ctx.registry.write(&info.id, b"ls -la\n").await.unwrap();

    assert_eq!(ctx.pty.process(pid).unwrap().written, b"ls -la\n");
    assert!(ctx.history_calls().await.contains(&HistoryCall::Line {
        id: info.id.clone(),
        content: "ls -la\n".to_string(),
        kind: LineKind::Input,
    }));
}

#[tokio::test(start_paused = true)]
async fn write_counts_as_activity() {
    let ctx = setup();
    let info = ctx.create("alice").await;
    let before = ctx.registry.get(&info.id).unwrap().last_activity_at_ms;

    ctx.clock.advance(Duration::from_secs(60));
    ctx.registry.write(&info.id, b"hello\n").await.unwrap();

    let after = ctx.registry.get(&info.id).unwrap().last_activity_at_ms;
    assert_eq!(after, before + 60_000);
}

#[tokio::test(start_paused = true)]
async fn write_to_unknown_session_fails() {
    let ctx = setup();
    let err = ctx
        .registry
        .write(&SessionId::new("nope"), b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(ref id) if id.as_str() == "nope"));
}

#[tokio::test(start_paused = true)]
async fn resize_updates_the_process_and_snapshot() {
    let ctx = setup();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);

    ctx.registry.resize(&info.id, 80, 24).await.unwrap();

    let size = TerminalSize::new(80, 24);
    assert_eq!(ctx.registry.get(&info.id).unwrap().size, size);
    assert!(ctx.pty.calls().contains(&PtyCall::Resize { pid, size }));
    assert_eq!(ctx.pty.process(pid).unwrap().size, size);
}

#[tokio::test(start_paused = true)]
async fn process_exit_publishes_exit_then_destroyed() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);

    assert!(ctx.pty.exit(pid, Some(3)).await);
    settle().await;

    assert_eq!(
        ctx.drain(),
        vec![
            SessionEvent::Created {
                id: info.id.clone(),
                owner: info.owner.clone(),
                dir: info.cwd.clone(),
            },
            SessionEvent::Exit {
                id: info.id.clone(),
                code: Some(3),
            },
            SessionEvent::Destroyed {
                id: info.id.clone(),
            },
        ]
    );
    assert!(ctx.registry.get(&info.id).is_none());
    assert!(ctx.history_calls().await.contains(&HistoryCall::Close {
        id: info.id,
        exit_code: Some(3),
    }));
}

#[tokio::test(start_paused = true)]
async fn destroy_kills_the_process_without_an_exit_event() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);

    ctx.registry.destroy(&info.id).await;
    settle().await;

    assert!(ctx.pty.calls().contains(&PtyCall::Kill { pid }));
    assert!(!ctx.pty.process(pid).unwrap().alive);
    assert_eq!(
        ctx.drain_names(),
        vec!["session:created", "session:destroyed"]
    );
    assert!(ctx.registry.is_empty());
    assert!(ctx.history_calls().await.contains(&HistoryCall::Close {
        id: info.id,
        exit_code: None,
    }));
}

#[tokio::test(start_paused = true)]
async fn destroy_is_idempotent() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;

    ctx.registry.destroy(&info.id).await;
    ctx.registry.destroy(&info.id).await;
    ctx.registry.destroy(&SessionId::new("never-existed")).await;

    assert_eq!(
        ctx.drain_names(),
        vec!["session:created", "session:destroyed"]
    );
}

#[tokio::test(start_paused = true)]
async fn destroyed_session_receives_no_more_output() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    let pid = ctx.pid(&info.id);
    ctx.registry.destroy(&info.id).await;
    ctx.drain();

    assert!(!ctx.pty.emit(pid, b"late\r\n".to_vec()).await);
    settle().await;
    assert!(ctx.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn list_by_owner_filters_and_orders_oldest_first() {
    let ctx = setup();
    let worktree = OwnerKey::worktree("alice", "/repo/a");
    let a1 = ctx
        .registry
        .create(worktree.clone(), ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap();
    ctx.clock.advance(Duration::from_secs(1));
    let a2 = ctx.create("alice").await;
    ctx.clock.advance(Duration::from_secs(1));
    ctx.create("bob").await;

    let ids = |filter: &OwnerKey| -> Vec<SessionId> {
        ctx.registry
            .list_by_owner(filter)
            .into_iter()
            .map(|info| info.id)
            .collect()
    };
    assert_eq!(ids(&OwnerKey::user("alice")), vec![a1.id.clone(), a2.id]);
    assert_eq!(ids(&worktree), vec![a1.id]);
    assert!(ids(&OwnerKey::user("carol")).is_empty());
    assert_eq!(ctx.registry.list().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_destroys_plain_sessions() {
    let mut ctx = setup();
    let a = ctx.create("alice").await;
    let b = ctx.create("bob").await;
    ctx.drain();

    ctx.registry.shutdown().await;

    assert!(ctx.registry.is_empty());
    let destroyed: Vec<SessionId> = ctx
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::Destroyed { id } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(destroyed.len(), 2);
    assert!(destroyed.contains(&a.id) && destroyed.contains(&b.id));
}
