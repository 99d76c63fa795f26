// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[yare::parameterized(
    bare        = { "claude", "claude", &[] },
    with_flags  = { "claude --continue", "claude", &["--continue"] },
    extra_space = { "  npm   run  dev ", "npm", &["run", "dev"] },
    empty       = { "", "", &[] },
)]
fn split_on_whitespace(line: &str, program: &str, args: &[&str]) {
    let (p, a) = split_command_line(line);
    assert_eq!(p, program);
    assert_eq!(a, args);
}

#[test]
fn from_command_line_keeps_cwd_and_size() {
    let req = SpawnRequest::from_command_line("git status -s", "/tmp", TerminalSize::new(80, 24));
    assert_eq!(req.program, "git");
    assert_eq!(req.args, vec!["status", "-s"]);
    assert_eq!(req.cwd, PathBuf::from("/tmp"));
    assert_eq!(req.size, TerminalSize::new(80, 24));
}

#[test]
fn verify_resolves_program_on_path() {
    let dir = TempDir::new().unwrap();
    let req = SpawnRequest::new("sh", dir.path(), TerminalSize::default());
    let resolved = req.verify().unwrap();
    assert!(resolved.is_absolute());
    assert!(resolved.ends_with("sh"));
}

#[test]
fn verify_rejects_missing_directory() {
    let req = SpawnRequest::new("sh", "/nonexistent/worktree", TerminalSize::default());
    assert!(matches!(
        req.verify(),
        Err(PtyError::WorkingDirectoryInvalid { .. })
    ));
}

#[test]
fn verify_rejects_file_as_directory() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain.txt");
    std::fs::write(&file, "x").unwrap();
    let req = SpawnRequest::new("sh", &file, TerminalSize::default());
    assert!(matches!(
        req.verify(),
        Err(PtyError::WorkingDirectoryInvalid { .. })
    ));
}

#[test]
fn verify_rejects_unknown_program() {
    let dir = TempDir::new().unwrap();
    let req = SpawnRequest::new("definitely-not-a-real-binary-xyz", dir.path(), TerminalSize::default());
    assert!(matches!(req.verify(), Err(PtyError::ExecutableNotFound(p)) if p == "definitely-not-a-real-binary-xyz"));
}

#[test]
fn verify_rejects_empty_command() {
    let dir = TempDir::new().unwrap();
    let req = SpawnRequest::from_command_line("   ", dir.path(), TerminalSize::default());
    assert!(matches!(req.verify(), Err(PtyError::ExecutableNotFound(_))));
}

#[test]
fn verify_honors_path_override_in_env() {
    let dir = TempDir::new().unwrap();
    let req = SpawnRequest::new("sh", dir.path(), TerminalSize::default())
        .env([("PATH".to_string(), dir.path().display().to_string())]);
    assert!(matches!(req.verify(), Err(PtyError::ExecutableNotFound(_))));
}
