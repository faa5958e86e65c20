//! Out-of-core helper: look up a user's AMI secret from a `manager.conf`
//! file (`spec.md` §6 "Auxiliary helper").
//!
//! Purely local file I/O, no protocol involvement — this module doesn't
//! touch [`crate::session`] at all, the same way the original C library
//! kept its manager.conf sniffer as a free function outside `struct ami`.

use std::fs;
use std::io;
use std::path::Path;

/// Default location Asterisk installs use for the manager configuration.
pub const DEFAULT_PATH: &str = "/etc/asterisk/manager.conf";

/// Parse an INI-style `manager.conf` and return the `secret` (or legacy
/// `password`) configured for `username`'s section, if any.
///
/// `manager.conf` sections are bracketed usernames (`[admin]`), each with
/// `key = value` lines; `;` and `#` start a comment that runs to end of
/// line. Only the first matching section is consulted, matching Asterisk's
/// own first-match-wins config parsing.
pub fn lookup_secret(path: impl AsRef<Path>, username: &str) -> io::Result<Option<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(find_secret(&contents, username))
}

/// Convenience wrapper over [`lookup_secret`] using [`DEFAULT_PATH`].
pub fn lookup_secret_default(username: &str) -> io::Result<Option<String>> {
    lookup_secret(DEFAULT_PATH, username)
}

fn find_secret(contents: &str, username: &str) -> Option<String> {
    let mut in_target_section = false;
    for raw_line in contents.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(section) = section_name(line) {
            in_target_section = section.eq_ignore_ascii_case(username);
            continue;
        }
        if !in_target_section {
            continue;
        }
        if let Some((key, value)) = split_kv(line) {
            if key.eq_ignore_ascii_case("secret") || key.eq_ignore_ascii_case("password") {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn strip_comment(line: &str) -> &str {
    let cut = line
        .find(';')
        .into_iter()
        .chain(line.find('#'))
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

fn section_name(line: &str) -> Option<&str> {
    let line = line.strip_prefix('[')?;
    line.strip_suffix(']')
}

fn split_kv(line: &str) -> Option<(&str, &str)> {
    let idx = line.find('=')?;
    Some((line[..idx].trim(), line[idx + 1..].trim()))
}
