// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    user_filter_selects_any_worktree = { OwnerKey::worktree("ana", "/w/a"), OwnerKey::user("ana"),             true },
    user_filter_selects_user_only    = { OwnerKey::user("ana"),             OwnerKey::user("ana"),             true },
    worktree_filter_exact            = { OwnerKey::worktree("ana", "/w/a"), OwnerKey::worktree("ana", "/w/a"), true },
    worktree_filter_other_worktree   = { OwnerKey::worktree("ana", "/w/b"), OwnerKey::worktree("ana", "/w/a"), false },
    worktree_filter_user_only_owner  = { OwnerKey::user("ana"),             OwnerKey::worktree("ana", "/w/a"), false },
    other_user                       = { OwnerKey::worktree("bo", "/w/a"),  OwnerKey::user("ana"),             false },
)]
fn matches(owner: OwnerKey, filter: OwnerKey, expected: bool) {
    assert_eq!(owner.matches(&filter), expected);
}

#[test]
fn display_includes_worktree_when_present() {
    assert_eq!(OwnerKey::user("ana").to_string(), "ana");
    assert_eq!(OwnerKey::worktree("ana", "/w/a").to_string(), "ana@/w/a");
}

#[test]
fn serde_omits_missing_worktree() {
    let json = serde_json::to_string(&OwnerKey::user("ana")).unwrap();
    assert_eq!(json, r#"{"user":"ana"}"#);
    let back: OwnerKey = serde_json::from_str(&json).unwrap();
    assert_eq!(back, OwnerKey::user("ana"));
}
