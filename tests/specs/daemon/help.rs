//! Daemon help and version specs
//!
//! Verify thd --help, --version, and related flags work without
//! acquiring the daemon lock (no startup attempt).

use crate::prelude::*;

#[test]
fn thd_version_flags_print_the_version() {
    let Some(thd) = thd_binary() else { return };
    let daemon = Daemon::new();
    for flag in ["--version", "-v", "-V"] {
        let output = daemon.command(&thd).arg(flag).output().unwrap();
        assert!(output.status.success(), "{flag} failed");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.starts_with("thd 0.1.0"),
            "expected version for {flag}, got: {stdout}"
        );
    }
    assert!(!daemon.pid_path().exists(), "version must not start the daemon");
}

#[test]
fn thd_help_shows_usage() {
    let Some(thd) = thd_binary() else { return };
    let daemon = Daemon::new();
    let output = daemon.command(&thd).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE:"), "expected USAGE section, got: {stdout}");
    assert!(stdout.contains("--help"), "expected --help in output");
    assert!(stdout.contains("--version"), "expected --version in output");
    assert!(!daemon.pid_path().exists(), "help must not start the daemon");
}

#[test]
fn thd_rejects_unknown_arguments() {
    let Some(thd) = thd_binary() else { return };
    let daemon = Daemon::new();
    let output = daemon.command(&thd).arg("--bogus").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("unexpected argument '--bogus'"),
        "got: {stderr}"
    );
}
