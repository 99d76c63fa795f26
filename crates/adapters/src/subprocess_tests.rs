// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn captures_stdout() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "printf 'tmux 3.4'"]);
    let output = run_with_timeout(cmd, MUX_TIMEOUT, "version").await.unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "tmux 3.4");
}

#[tokio::test]
async fn nonzero_exit_is_returned_not_raised() {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", "echo 'no server running' >&2; exit 1"]);
    let output = run_with_timeout(cmd, MUX_TIMEOUT, "list").await.unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no server running"));
}

#[tokio::test]
async fn missing_binary_names_the_operation() {
    let cmd = Command::new("/nonexistent/tmux");
    let err = run_with_timeout(cmd, MUX_TIMEOUT, "tmux -V").await.unwrap_err();
    assert!(err.starts_with("tmux -V failed:"), "got: {}", err);
}

#[tokio::test]
async fn timeout_elapsed() {
    let mut cmd = Command::new("sleep");
    cmd.arg("10");
    let err = run_with_timeout(cmd, Duration::from_millis(100), "slow capture")
        .await
        .unwrap_err();
    assert!(err.contains("timed out after 100ms"), "got: {}", err);
    assert!(err.contains("slow capture"), "got: {}", err);
}
