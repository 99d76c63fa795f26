// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn request() -> SpawnRequest {
    SpawnRequest::new("claude", "/tmp", TerminalSize::default())
}

#[tokio::test]
async fn spawn_records_call_and_delivers_events() {
    let adapter = FakePtyAdapter::new();
    let (tx, mut rx) = mpsc::channel(8);
    let handle = adapter.spawn(request(), tx).unwrap();
    let pid = handle.pid().unwrap();

    assert!(adapter.emit(pid, "hello").await);
    assert!(adapter.exit(pid, Some(0)).await);

    assert_eq!(rx.recv().await, Some(PtyEvent::Data(b"hello".to_vec())));
    assert_eq!(rx.recv().await, Some(PtyEvent::Exit(Some(0))));
    assert_eq!(rx.recv().await, None);
    assert_eq!(adapter.spawn_count(), 1);
}

#[tokio::test]
async fn write_and_resize_are_recorded() {
    let adapter = FakePtyAdapter::new();
    let (tx, _rx) = mpsc::channel(8);
    let handle = adapter.spawn(request(), tx).unwrap();
    let pid = handle.pid().unwrap();

    handle.write(b"ls\r").unwrap();
    handle.resize(TerminalSize::new(100, 30)).unwrap();

    let process = adapter.process(pid).unwrap();
    assert_eq!(process.written, b"ls\r");
    assert_eq!(process.size, TerminalSize::new(100, 30));
}

#[tokio::test]
async fn kill_sends_exit_once() {
    let adapter = FakePtyAdapter::new();
    let (tx, mut rx) = mpsc::channel(8);
    let handle = adapter.spawn(request(), tx).unwrap();

    handle.kill();
    handle.kill();

    assert_eq!(rx.recv().await, Some(PtyEvent::Exit(None)));
    assert_eq!(rx.recv().await, None);
    assert!(handle.write(b"x").is_err());
}

#[test]
fn fail_next_spawn_applies_once() {
    let adapter = FakePtyAdapter::new();
    adapter.fail_next_spawn(PtyError::SpawnFailed("boom".to_string()));

    let (tx, _rx) = mpsc::channel(8);
    assert!(adapter.spawn(request(), tx.clone()).is_err());
    assert!(adapter.spawn(request(), tx).is_ok());
    assert_eq!(adapter.spawn_count(), 2);
}

#[test]
fn preconditions_reject_missing_directory() {
    let adapter = FakePtyAdapter::new().with_preconditions();
    let (tx, _rx) = mpsc::channel(8);
    let req = SpawnRequest::new("sh", "/nonexistent/dir", TerminalSize::default());
    assert!(matches!(
        adapter.spawn(req, tx),
        Err(PtyError::WorkingDirectoryInvalid { .. })
    ));
}
