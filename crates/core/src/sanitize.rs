// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output sanitization for safe re-transmission to remote viewers.
//!
//! Terminal reports (device attributes, cursor position) are replies a real
//! terminal sends back to the program. When several consumers observe the
//! stream and echo parts of it back, those replies get looped or corrupted,
//! so they are removed before output goes anywhere else. Ordinary color and
//! cursor-movement sequences are left intact.

use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

const ESC: u8 = 0x1b;

/// Primary/secondary device-attribute responses and cursor-position reports.
// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static TERMINAL_REPORTS: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r"\x1b\[[?>]\d+(?:;\d+)*c|\x1b\[\d+;\d+R")
        .expect("constant regex pattern is valid")
});

/// CSI, OSC and two-byte escape sequences.
#[allow(clippy::expect_used)]
static ANSI_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[()][0-9A-Za-z]|\x1b[@-Z\\-_=>78]")
        .expect("constant regex pattern is valid")
});

/// True if the chunk carries device-attribute or cursor-position reports.
pub fn looks_problematic(chunk: &[u8]) -> bool {
    TERMINAL_REPORTS.is_match(chunk)
}

/// Remove terminal reports and bare unterminated escape characters.
pub fn sanitize(chunk: &[u8]) -> Cow<'_, [u8]> {
    match TERMINAL_REPORTS.replace_all(chunk, &b""[..]) {
        Cow::Borrowed(unchanged) => strip_bare_escapes(unchanged),
        Cow::Owned(stripped) => Cow::Owned(strip_bare_escapes(&stripped).into_owned()),
    }
}

/// Sanitize only when the chunk needs it; the common case borrows.
pub fn clean(chunk: &[u8]) -> Cow<'_, [u8]> {
    if looks_problematic(chunk) {
        sanitize(chunk)
    } else {
        Cow::Borrowed(chunk)
    }
}

/// An escape is bare when nothing follows it or another escape does.
fn strip_bare_escapes(bytes: &[u8]) -> Cow<'_, [u8]> {
    let is_bare =
        |i: usize| bytes[i] == ESC && !matches!(bytes.get(i + 1), Some(&next) if next != ESC);
    if !(0..bytes.len()).any(is_bare) {
        return Cow::Borrowed(bytes);
    }
    let kept = bytes
        .iter()
        .enumerate()
        .filter(|&(i, _)| !is_bare(i))
        .map(|(_, &b)| b)
        .collect();
    Cow::Owned(kept)
}

/// Plain text of a chunk: escape sequences removed, carriage returns folded
/// into line breaks.
pub fn strip_ansi(text: &str) -> String {
    ANSI_SEQUENCE
        .replace_all(text, "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(char::from(ESC), "")
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
