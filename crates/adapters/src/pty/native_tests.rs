// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tempfile::TempDir;

/// Collect events until exit, with a generous ceiling.
async fn drain(mut rx: mpsc::Receiver<PtyEvent>) -> (Vec<u8>, Option<i32>) {
    let mut output = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(PtyEvent::Data(bytes))) => output.extend(bytes),
            Ok(Some(PtyEvent::Exit(code))) => return (output, code),
            Ok(None) => panic!("channel closed before exit"),
            Err(_) => panic!("timed out; output so far: {:?}", String::from_utf8_lossy(&output)),
        }
    }
}

fn sh(dir: &TempDir, script: &str) -> SpawnRequest {
    SpawnRequest::new("sh", dir.path(), TerminalSize::new(80, 24))
        .arg("-c")
        .arg(script)
}

#[tokio::test]
async fn spawn_streams_output_then_exit_code() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel(64);
    let _handle = NativePtyAdapter::new()
        .spawn(sh(&dir, "echo hello-pty; exit 3"), tx)
        .unwrap();

    let (output, code) = drain(rx).await;
    assert!(String::from_utf8_lossy(&output).contains("hello-pty"));
    assert_eq!(code, Some(3));
}

#[tokio::test]
async fn spawn_runs_in_working_directory() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel(64);
    let _handle = NativePtyAdapter::new().spawn(sh(&dir, "pwd"), tx).unwrap();

    let (output, _) = drain(rx).await;
    let expected = dir.path().canonicalize().unwrap();
    let name = expected.file_name().unwrap().to_string_lossy().to_string();
    assert!(String::from_utf8_lossy(&output).contains(&name));
}

#[tokio::test]
async fn write_reaches_the_process() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel(64);
    let handle = NativePtyAdapter::new()
        .spawn(sh(&dir, "read line; echo got:$line"), tx)
        .unwrap();

    handle.write(b"ping\n").unwrap();
    let (output, code) = drain(rx).await;
    assert!(String::from_utf8_lossy(&output).contains("got:ping"));
    assert_eq!(code, Some(0));
}

#[tokio::test]
async fn kill_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel(64);
    let handle = NativePtyAdapter::new().spawn(sh(&dir, "sleep 30"), tx).unwrap();
    assert!(handle.pid().is_some());

    handle.resize(TerminalSize::new(100, 30)).unwrap();
    handle.kill();
    let (_, code) = drain(rx).await;
    assert_ne!(code, Some(0));

    // Second kill on a dead process is swallowed
    handle.kill();
}

#[test]
fn spawn_fails_fast_on_bad_directory() {
    let (tx, _rx) = mpsc::channel(1);
    let req = SpawnRequest::new("sh", "/nonexistent/dir", TerminalSize::default());
    let result = NativePtyAdapter::new().spawn(req, tx);
    assert!(matches!(result, Err(PtyError::WorkingDirectoryInvalid { .. })));
}
