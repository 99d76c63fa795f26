// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use th_adapters::PtyError;

#[tokio::test(start_paused = true)]
async fn create_registers_a_busy_attached_session() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;

    assert_eq!(info.id, SessionId::new("s1"));
    assert_eq!(info.owner, OwnerKey::user("alice"));
    assert_eq!(info.cwd, ctx.cwd());
    assert_eq!(info.command, "sh");
    assert_eq!(info.state, SessionState::Busy);
    assert!(info.attached);
    assert!(!info.persistent);
    assert_eq!(info.pid, Some(1001));
    assert_eq!(info.size, TerminalSize::default());
    assert_eq!(info.created_at_ms, ctx.clock.epoch_ms());
    assert_eq!(ctx.registry.len(), 1);

    let event = ctx.next_event().await;
    assert_eq!(
        event,
        SessionEvent::Created {
            id: info.id.clone(),
            owner: OwnerKey::user("alice"),
            dir: ctx.cwd().to_path_buf(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn spawn_request_carries_command_and_default_env() {
    let ctx = setup();
    ctx.registry
        .create(
            OwnerKey::user("alice"),
            ctx.cwd(),
            "sh -c true",
            TerminalSize::new(100, 30),
        )
        .await
        .unwrap();

    let calls = ctx.pty.calls();
    let PtyCall::Spawn { request } = &calls[0] else {
        panic!("expected spawn, got {:?}", calls);
    };
    assert_eq!(request.program, "sh");
    assert_eq!(request.args, vec!["-c", "true"]);
    assert_eq!(request.cwd, ctx.cwd());
    assert_eq!(request.size, TerminalSize::new(100, 30));
    assert!(request
        .env
        .contains(&("TERM".to_string(), "xterm-256color".to_string())));
}

#[tokio::test(start_paused = true)]
async fn create_is_recorded_in_history() {
    let ctx = setup();
    let info = ctx.create("alice").await;

    let calls = ctx.history_calls().await;
    assert_eq!(
        calls,
        vec![HistoryCall::Create(SessionRecord {
            id: info.id,
            owner: OwnerKey::user("alice"),
            dir: ctx.cwd().to_path_buf(),
            command: "sh".to_string(),
            created_at_ms: info.created_at_ms,
        })]
    );
}

#[tokio::test(start_paused = true)]
async fn quota_is_enforced_per_user() {
    let config = EngineConfig {
        max_sessions_per_owner: 2,
        ..EngineConfig::default()
    };
    let ctx = setup_with(config, false);
    ctx.create("alice").await;
    ctx.create("alice").await;

    let err = ctx
        .registry
        .create(OwnerKey::user("alice"), ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::SessionQuotaExceeded { ref user, limit: 2 } if user == "alice"
    ));
    assert_eq!(ctx.pty.spawn_count(), 2);

    // Other users have their own allowance
    ctx.create("bob").await;
    assert_eq!(ctx.registry.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn quota_counts_worktree_sessions_against_the_user() {
    let config = EngineConfig {
        max_sessions_per_owner: 1,
        ..EngineConfig::default()
    };
    let ctx = setup_with(config, false);
    let owner = OwnerKey::worktree("alice", ctx.cwd());
    ctx.registry
        .create(owner, ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap();

    let result = ctx
        .registry
        .create(OwnerKey::user("alice"), ctx.cwd(), "sh", TerminalSize::default())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::SessionQuotaExceeded { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn destroy_frees_a_quota_slot() {
    let config = EngineConfig {
        max_sessions_per_owner: 1,
        ..EngineConfig::default()
    };
    let ctx = setup_with(config, false);
    let first = ctx.create("alice").await;
    ctx.registry.destroy(&first.id).await;

    let second = ctx.create("alice").await;
    assert_ne!(first.id, second.id);
}

#[tokio::test(start_paused = true)]
async fn worktree_owner_gets_its_existing_session_back() {
    let mut ctx = setup();
    let owner = OwnerKey::worktree("alice", "/repo/feature");

    let first = ctx
        .registry
        .create(owner.clone(), ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap();
    let second = ctx
        .registry
        .create(owner, ctx.cwd(), "sh -i", TerminalSize::default())
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.command, "sh");
    assert_eq!(ctx.pty.spawn_count(), 1);
    assert_eq!(ctx.drain_names(), vec!["session:created"]);
}

#[tokio::test(start_paused = true)]
async fn user_only_owner_gets_a_new_session_each_time() {
    let ctx = setup();
    let first = ctx.create("alice").await;
    let second = ctx.create("alice").await;

    assert_ne!(first.id, second.id);
    assert_eq!(ctx.pty.spawn_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn missing_directory_is_rejected_before_spawn() {
    let config = EngineConfig {
        max_sessions_per_owner: 1,
        ..EngineConfig::default()
    };
    let mut ctx = setup_with(config, false);
    let missing = ctx.cwd().join("missing");

    let err = ctx
        .registry
        .create(OwnerKey::user("alice"), &missing, "sh", TerminalSize::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::WorkingDirectoryInvalid { ref path, .. } if *path == missing));
    assert_eq!(ctx.pty.spawn_count(), 0);
    assert!(ctx.registry.is_empty());
    assert!(ctx.drain().is_empty());

    // The failed attempt did not consume the only slot
    ctx.create("alice").await;
}

#[tokio::test(start_paused = true)]
async fn unknown_executable_is_rejected_before_spawn() {
    let ctx = setup();
    let err = ctx
        .registry
        .create(
            OwnerKey::user("alice"),
            ctx.cwd(),
            "definitely-not-a-real-binary-th --flag",
            TerminalSize::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::ExecutableNotFound(ref name) if name == "definitely-not-a-real-binary-th"
    ));
    assert_eq!(ctx.pty.spawn_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn spawn_failure_leaves_nothing_behind() {
    let config = EngineConfig {
        max_sessions_per_owner: 1,
        ..EngineConfig::default()
    };
    let mut ctx = setup_with(config, false);
    ctx.pty
        .fail_next_spawn(PtyError::SpawnFailed("openpty: out of ptys".to_string()));

    let err = ctx
        .registry
        .create(OwnerKey::user("alice"), ctx.cwd(), "sh", TerminalSize::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "spawn_failed");
    assert!(ctx.registry.is_empty());
    assert!(ctx.drain().is_empty());
    assert!(ctx.history_calls().await.is_empty());
    ctx.create("alice").await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_creates_never_exceed_the_quota() {
    let config = EngineConfig {
        max_sessions_per_owner: 1,
        ..EngineConfig::default()
    };
    let ctx = setup_with(config, false);
    let owner = OwnerKey::user("alice");

    let (a, b) = tokio::join!(
        ctx.registry
            .create(owner.clone(), ctx.cwd(), "sh", TerminalSize::default()),
        ctx.registry
            .create(owner.clone(), ctx.cwd(), "sh", TerminalSize::default()),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert_eq!(ctx.registry.list_by_owner(&owner).len(), 1);
}
