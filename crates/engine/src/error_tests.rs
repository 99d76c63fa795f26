// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    dir       = { EngineError::WorkingDirectoryInvalid { path: "/x".into(), reason: "gone".into() }, "working_directory_invalid" },
    exe       = { EngineError::ExecutableNotFound("claude".into()), "executable_not_found" },
    quota     = { EngineError::SessionQuotaExceeded { user: "ana".into(), limit: 20 }, "session_quota_exceeded" },
    not_found = { EngineError::SessionNotFound(SessionId::new("s1")), "session_not_found" },
    spawn     = { EngineError::SpawnFailed("openpty".into()), "spawn_failed" },
    mux       = { EngineError::MultiplexerUnavailable("tmux: not found".into()), "multiplexer_unavailable" },
    reattach  = { EngineError::ReattachFailed { id: SessionId::new("s1"), reason: "gone".into() }, "reattach_failed" },
    dead      = { EngineError::WriteToDeadSession(SessionId::new("s1")), "write_to_dead_session" },
)]
fn kinds_are_stable(error: EngineError, kind: &str) {
    assert_eq!(error.kind(), kind);
}

#[test]
fn pty_errors_keep_their_identity() {
    let err: EngineError = PtyError::WorkingDirectoryInvalid {
        path: "/missing".into(),
        reason: "not a directory".into(),
    }
    .into();
    assert_eq!(err.kind(), "working_directory_invalid");
    assert!(err.to_string().contains("/missing"));

    let err: EngineError = PtyError::ExecutableNotFound("claude".into()).into();
    assert_eq!(err.kind(), "executable_not_found");

    let err: EngineError = PtyError::SpawnFailed("openpty: EMFILE".into()).into();
    assert_eq!(err.kind(), "spawn_failed");
}

#[test]
fn mux_unavailable_maps_to_capability_error() {
    let err: EngineError = MuxError::Unavailable("tmux: not found".into()).into();
    assert_eq!(err.kind(), "multiplexer_unavailable");

    let err: EngineError = MuxError::SpawnFailed("duplicate session".into()).into();
    assert_eq!(err.kind(), "spawn_failed");
}

#[test]
fn quota_message_names_user_and_limit() {
    let err = EngineError::SessionQuotaExceeded {
        user: "ana".into(),
        limit: 20,
    };
    assert_eq!(err.to_string(), "session quota exceeded for ana (limit 20)");
}
