//! Error types for the AMI client.
//!
//! Follows the same split the rest of the crate uses for parsing errors:
//! a small hand-rolled enum for the hot internal path (`FrameError`), and
//! a richer session-facing enum (`AmiError`) that callers match on. Both
//! implement `std::error::Error` directly rather than pulling in a derive
//! macro crate, since neither needs more than a `Display` impl and a couple
//! of `From` conversions.

use std::fmt;
use std::io;

/// The crate's catch-all error alias for boundary functions that don't need
/// callers to match on a specific variant (mirrors the teacher's top-level
/// `Error`/`Result` aliases).
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias for the above.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by [`crate::frame`] while splitting the byte stream into
/// messages.
#[derive(Debug)]
pub enum FrameError {
    /// A line had no `:` separator and wasn't a blank terminator line.
    MalformedLine(String),
    /// A single message exceeded the parser's buffer capacity before a
    /// blank-line terminator was seen. Never silently truncated.
    MessageTooLarge { limit: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MalformedLine(line) => {
                write!(f, "malformed AMI line (no ':' separator): {:?}", line)
            }
            FrameError::MessageTooLarge { limit } => {
                write!(f, "AMI message exceeded buffer capacity of {limit} bytes")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Errors surfaced by the session engine (`spec.md` §7's taxonomy).
///
/// `Clone` is hand-rolled rather than derived because `io::Error` isn't
/// `Clone`; needed so a single fatal error can be fanned out to every
/// pending caller when the session tears down (`spec.md` §5 "Cancellation").
#[derive(Debug)]
pub enum AmiError {
    /// DNS/TCP connect failure, or the initial banner was missing or
    /// malformed.
    Connection(String),
    /// Malformed line, oversize message, or unexpected EOF mid-message.
    /// Fatal: the session is torn down and every pending caller fails.
    Protocol(String),
    /// The per-action wait expired before a response was assembled.
    Timeout,
    /// The session was disconnected (locally or remotely) while this call
    /// was outstanding.
    SessionClosed,
    /// Caller-level misuse: double shutdown, action on a disconnected
    /// session, invalid log level, etc. Never a panic.
    Usage(String),
    /// I/O error from the underlying socket that isn't otherwise
    /// classified above.
    Io(io::Error),
}

impl fmt::Display for AmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmiError::Connection(msg) => write!(f, "AMI connection error: {msg}"),
            AmiError::Protocol(msg) => write!(f, "AMI protocol error: {msg}"),
            AmiError::Timeout => write!(f, "AMI action timed out"),
            AmiError::SessionClosed => write!(f, "AMI session is closed"),
            AmiError::Usage(msg) => write!(f, "AMI usage error: {msg}"),
            AmiError::Io(err) => write!(f, "AMI I/O error: {err}"),
        }
    }
}

impl std::error::Error for AmiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmiError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AmiError {
    fn from(err: io::Error) -> Self {
        AmiError::Io(err)
    }
}

impl From<FrameError> for AmiError {
    fn from(err: FrameError) -> Self {
        AmiError::Protocol(err.to_string())
    }
}

impl Clone for AmiError {
    fn clone(&self) -> Self {
        match self {
            AmiError::Connection(s) => AmiError::Connection(s.clone()),
            AmiError::Protocol(s) => AmiError::Protocol(s.clone()),
            AmiError::Timeout => AmiError::Timeout,
            AmiError::SessionClosed => AmiError::SessionClosed,
            AmiError::Usage(s) => AmiError::Usage(s.clone()),
            AmiError::Io(e) => AmiError::Io(io::Error::new(e.kind(), e.to_string())),
        }
    }
}
