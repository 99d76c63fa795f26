// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

/// Random prefix for this test run to avoid conflicts with parallel test runs.
static TEST_PREFIX: LazyLock<String> = LazyLock::new(|| {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!("tht{:04x}-", nanos & 0xFFFF)
});

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_name(suffix: &str) -> String {
    let id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}{}-{}", *TEST_PREFIX, suffix, id)
}

fn tmux_available() -> bool {
    std::process::Command::new("tmux")
        .arg("-V")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! skip_if_no_tmux {
    () => {
        if !tmux_available() {
            eprintln!("tmux not available, skipping");
            return;
        }
    };
}

#[test]
fn parse_session_list_filters_prefix_and_converts_seconds() {
    let stdout = "th-a1\t1700000000\t1\nother\t1700000001\t0\nth-b2\t1700000002\t0\n";
    let sessions = parse_session_list(stdout, "th-");
    assert_eq!(
        sessions,
        vec![
            MuxSessionInfo {
                name: "th-a1".to_string(),
                created_at_ms: 1_700_000_000_000,
                attached: 1,
            },
            MuxSessionInfo {
                name: "th-b2".to_string(),
                created_at_ms: 1_700_000_002_000,
                attached: 0,
            },
        ]
    );
}

#[test]
fn parse_session_list_skips_malformed_lines() {
    let stdout = "th-a1\tnot-a-number\t0\nth-b2\n\nth-c3\t5\n";
    let sessions = parse_session_list(stdout, "th-");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].name, "th-c3");
    assert_eq!(sessions[0].attached, 0);
}

#[test]
fn attach_request_forces_other_clients_off() {
    let tmux = TmuxMultiplexer::new();
    let req = tmux.attach_request("th-abc", Path::new("/tmp"), TerminalSize::new(90, 30));
    assert_eq!(req.program, "tmux");
    assert_eq!(req.args, vec!["attach-session", "-d", "-t", "=th-abc"]);
    assert_eq!(req.size, TerminalSize::new(90, 30));
}

#[tokio::test]
#[serial(tmux)]
async fn probe_reports_version() {
    skip_if_no_tmux!();
    let version = TmuxMultiplexer::new().probe().await.unwrap();
    assert!(version.starts_with("tmux"), "got: {}", version);
}

#[tokio::test]
#[serial(tmux)]
async fn create_list_capture_kill() {
    skip_if_no_tmux!();
    let tmux = TmuxMultiplexer::new();
    let name = unique_name("life");

    tmux.create_detached(
        &name,
        Path::new("/tmp"),
        TerminalSize::new(80, 24),
        "sh -c 'echo marker-$TH_TEST_VAR; sleep 60'",
        &[("TH_TEST_VAR".to_string(), "xyz".to_string())],
    )
    .await
    .unwrap();
    assert!(tmux.exists(&name).await.unwrap());

    let listed = tmux.list_all(&TEST_PREFIX).await.unwrap();
    assert!(listed.iter().any(|s| s.name == name && s.created_at_ms > 0));

    // Give the command time to print
    tokio::time::sleep(Duration::from_millis(300)).await;
    let captured = tmux.capture_buffer(&name, 100).await.unwrap();
    assert!(captured.contains("marker-xyz"), "got: {:?}", captured);

    tmux.kill(&name).await.unwrap();
    assert!(!tmux.exists(&name).await.unwrap());
}

#[tokio::test]
#[serial(tmux)]
async fn kill_missing_session_is_ok() {
    skip_if_no_tmux!();
    let tmux = TmuxMultiplexer::new();
    tmux.kill(&unique_name("gone")).await.unwrap();
}

#[tokio::test]
#[serial(tmux)]
async fn exists_uses_exact_match() {
    skip_if_no_tmux!();
    let tmux = TmuxMultiplexer::new();
    let name = unique_name("exact");
    tmux.create_detached(&name, Path::new("/tmp"), TerminalSize::default(), "sleep 60", &[])
        .await
        .unwrap();

    let truncated = &name[..name.len() - 1];
    assert!(!tmux.exists(truncated).await.unwrap());

    tmux.kill(&name).await.unwrap();
}

#[tokio::test]
#[serial(tmux)]
async fn capture_uses_exact_match() {
    skip_if_no_tmux!();
    let tmux = TmuxMultiplexer::new();
    let name = unique_name("capexact");
    tmux.create_detached(
        &name,
        Path::new("/tmp"),
        TerminalSize::default(),
        "sh -c 'echo secret-of-longer; sleep 60'",
        &[],
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let truncated = &name[..name.len() - 1];
    let result = tmux.capture_buffer(truncated, 100).await;
    assert!(matches!(result, Err(MuxError::NotFound(_))), "got: {:?}", result);

    tmux.kill(&name).await.unwrap();
}

#[test]
fn pane_target_pins_the_session_name() {
    assert_eq!(exact_pane("th-1"), "=th-1:");
}

#[tokio::test]
#[serial(tmux)]
async fn capture_missing_session_is_not_found() {
    skip_if_no_tmux!();
    let tmux = TmuxMultiplexer::new();
    let result = tmux.capture_buffer(&unique_name("nothing"), 10).await;
    assert!(matches!(result, Err(MuxError::NotFound(_))));
}
