//! Daemon lifecycle specs
//!
//! Verify start, the single-instance lock, logging, and graceful stop.

use crate::prelude::*;

#[test]
fn daemon_writes_pid_and_startup_marker() {
    let Some(thd) = thd_binary() else { return };
    let mut daemon = Daemon::new();
    daemon.start(&thd);

    let pid = std::fs::read_to_string(daemon.pid_path()).unwrap();
    assert_eq!(pid.trim(), daemon.pid().unwrap().to_string());

    let marker = format!("--- thd: starting (pid: {}) ---", pid.trim());
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || daemon.log().contains("daemon started")),
        "log:\n{}",
        daemon.log()
    );
    assert!(daemon.log().contains(&marker), "log:\n{}", daemon.log());
    assert!(daemon.state_path().join("history.jsonl").exists());

    assert!(daemon.stop());
}

#[test]
fn second_daemon_reports_already_running() {
    let Some(thd) = thd_binary() else { return };
    let mut daemon = Daemon::new();
    daemon.start(&thd);
    let pid = daemon.pid().unwrap();

    let output = daemon.command(&thd).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("thd is already running"), "got: {stderr}");
    assert!(stderr.contains(&format!("pid: {pid}")), "got: {stderr}");

    // The running daemon keeps its PID file
    let on_disk = std::fs::read_to_string(daemon.pid_path()).unwrap();
    assert_eq!(on_disk.trim(), pid.to_string());

    assert!(daemon.stop());
}

#[test]
fn refused_daemon_leaves_the_running_log_alone() {
    let Some(thd) = thd_binary() else { return };
    let mut daemon = Daemon::new();
    daemon.start(&thd);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || daemon.log().contains("daemon started")));

    // Grow the live log past the rotation threshold
    let log_path = daemon.state_path().join("daemon.log");
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&log_path)
            .unwrap();
        file.write_all(&vec![b'.'; 11 * 1024 * 1024]).unwrap();
    }

    let output = daemon.command(&thd).output().unwrap();
    assert!(!output.status.success());

    assert!(!daemon.state_path().join("daemon.log.1").exists());
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches("--- thd: starting (pid: ").count(), 1);

    assert!(daemon.stop());
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Daemon shutdown complete"));
}

#[test]
fn sigterm_shuts_down_and_removes_pid_file() {
    let Some(thd) = thd_binary() else { return };
    let mut daemon = Daemon::new();
    daemon.start(&thd);

    assert!(daemon.stop(), "daemon did not exit cleanly; log:\n{}", daemon.log());
    assert!(!daemon.pid_path().exists());
    assert!(daemon.log().contains("Daemon shutdown complete"), "log:\n{}", daemon.log());
}

#[test]
fn daemon_restarts_after_clean_stop() {
    let Some(thd) = thd_binary() else { return };
    let mut daemon = Daemon::new();
    daemon.start(&thd);
    assert!(daemon.stop());

    daemon.start(&thd);
    assert!(daemon.stop());
    let starts = daemon.log().matches("--- thd: starting (pid: ").count();
    assert_eq!(starts, 2);
}
