//! AMI wire framing (component C1 — "Frame Parser").
//!
//! AMI is a line-oriented protocol: a *message* is a run of `Key: Value\r\n`
//! lines closed by a blank `\r\n` line. [`MessageParser`] owns the read-side
//! buffer and turns a byte stream into a sequence of [`Message`]s, the same
//! way the teacher's `Connection` accumulates bytes in a `BytesMut` until a
//! complete frame can be parsed out of it.

use bytes::BytesMut;
use std::fmt;

use crate::error::FrameError;

/// Buffer capacity beyond which a still-incomplete message is treated as
/// fatal rather than silently truncated (`spec.md` §4.1).
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20; // 1 MiB

/// A single `Key: Value` pair.
///
/// Keys are matched case-insensitively (see [`Message::get`]) but both the
/// key and value retain their original casing for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: String,
    pub value: String,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered sequence of fields — one AMI message (one `Response:` head,
/// one `Event:`, or one continuation).
///
/// Order is preserved deliberately: some AMI messages repeat a key (e.g.
/// multi-line `Output:` fields on `Command` responses) and the positional
/// relationship between repeats matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub fields: Vec<Field>,
}

impl Message {
    pub(crate) fn new() -> Self {
        Message { fields: Vec::new() }
    }

    pub(crate) fn push(&mut self, key: String, value: String) {
        self.fields.push(Field { key, value });
    }

    /// Look up the first field matching `key`, case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key.eq_ignore_ascii_case(key))
            .map(|f| f.value.as_str())
    }

    /// All fields matching `key`, case-insensitively, in wire order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |f| f.key.eq_ignore_ascii_case(key))
            .map(|f| f.value.as_str())
    }

    /// Is this message a header with `Response: <...>`?
    pub fn is_response_head(&self) -> bool {
        self.get("Response").is_some()
    }

    /// Is this message an unsolicited/continuation `Event: <...>`?
    pub fn is_event(&self) -> bool {
        self.get("Event").is_some()
    }

    /// Parsed `ActionID`, if present and numeric.
    pub fn action_id(&self) -> Option<i64> {
        self.get("ActionID").and_then(|v| v.trim().parse().ok())
    }

    /// Structured debug dump — routes through `tracing` rather than stderr
    /// (the original C library's `ami_dump_event`/`ami_dump_response` wrote
    /// directly to a fd; this crate logs everything through one sink).
    pub fn dump(&self) {
        for field in &self.fields {
            tracing::debug!(key = %field.key, value = %field.value, "ami field");
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            writeln!(f, "{}: {}", field.key, field.value)?;
        }
        Ok(())
    }
}

/// Incrementally parses `Message`s out of a byte stream.
///
/// `feed` appends newly-read bytes and returns every message that became
/// complete as a result. Bytes belonging to a not-yet-complete message stay
/// buffered for the next call.
pub struct MessageParser {
    buffer: BytesMut,
    capacity: usize,
    current: Message,
}

impl MessageParser {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MessageParser {
            buffer: BytesMut::with_capacity(4096),
            capacity,
            current: Message::new(),
        }
    }

    /// Append `bytes` and drain as many complete messages as are now
    /// available. Partial trailing data is retained internally.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Message>, FrameError> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        while let Some(line) = self.take_line() {
            if line.is_empty() {
                // Blank line: message terminator.
                let finished = std::mem::replace(&mut self.current, Message::new());
                if !finished.fields.is_empty() {
                    messages.push(finished);
                }
                // An empty message (banner artifacts, stray CRLF) is
                // dropped rather than surfaced.
            } else {
                let (key, value) = split_field(&line)?;
                self.current.push(key, value);
            }
        }

        if self.buffer.len() > self.capacity {
            return Err(FrameError::MessageTooLarge {
                limit: self.capacity,
            });
        }

        Ok(messages)
    }

    /// Pull the next complete `\r\n`-terminated line out of the buffer, if
    /// one is present. Returns the line with the terminator stripped.
    fn take_line(&mut self) -> Option<String> {
        let haystack = &self.buffer[..];
        for i in 0..haystack.len().saturating_sub(1) {
            if haystack[i] == b'\r' && haystack[i + 1] == b'\n' {
                let mut line_bytes = self.buffer.split_to(i + 2);
                line_bytes.truncate(i);
                return Some(String::from_utf8_lossy(&line_bytes).into_owned());
            }
        }
        None
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `Key: Value` line at the first `:`, stripping exactly one
/// leading space from the value (`spec.md` §4.1).
fn split_field(line: &str) -> Result<(String, String), FrameError> {
    let idx = line
        .find(':')
        .ok_or_else(|| FrameError::MalformedLine(line.to_string()))?;
    let key = line[..idx].to_string();
    let mut value = &line[idx + 1..];
    if let Some(stripped) = value.strip_prefix(' ') {
        value = stripped;
    }
    Ok((key, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_message() {
        let mut parser = MessageParser::new();
        let msgs = parser
            .feed(b"Response: Success\r\nActionID: 1\r\nMessage: Authentication accepted\r\n\r\n")
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].get("response"), Some("Success"));
        assert_eq!(msgs[0].get("ActionID"), Some("1"));
        assert_eq!(msgs[0].action_id(), Some(1));
    }

    #[test]
    fn handles_partial_feeds() {
        let mut parser = MessageParser::new();
        assert!(parser.feed(b"Response: Suc").unwrap().is_empty());
        assert!(parser.feed(b"cess\r\nActionID: 2\r\n").unwrap().is_empty());
        let msgs = parser.feed(b"\r\n").unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].get("Response"), Some("Success"));
    }

    #[test]
    fn preserves_field_order_and_repeats() {
        let mut parser = MessageParser::new();
        let msgs = parser
            .feed(b"Response: Follows\r\nOutput: line one\r\nOutput: line two\r\n\r\n")
            .unwrap();
        let outputs: Vec<_> = msgs[0].get_all("Output").collect();
        assert_eq!(outputs, vec!["line one", "line two"]);
    }

    #[test]
    fn rejects_line_without_colon() {
        let mut parser = MessageParser::new();
        let err = parser.feed(b"NotAField\r\n\r\n").unwrap_err();
        assert!(matches!(err, FrameError::MalformedLine(_)));
    }

    #[test]
    fn oversize_message_is_fatal() {
        let mut parser = MessageParser::with_capacity(16);
        let big = vec![b'A'; 64];
        let mut line = b"Key: ".to_vec();
        line.extend_from_slice(&big);
        line.extend_from_slice(b"\r\n");
        let err = parser.feed(&line).unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { .. }));
    }

    #[test]
    fn strips_exactly_one_leading_space() {
        let (k, v) = split_field("Key:  two spaces").unwrap();
        assert_eq!(k, "Key");
        assert_eq!(v, " two spaces");
    }

    #[test]
    fn multiple_messages_in_one_feed() {
        let mut parser = MessageParser::new();
        let msgs = parser
            .feed(b"Event: Newchannel\r\nChannel: SIP/1\r\n\r\nEvent: Hangup\r\nChannel: SIP/1\r\n\r\n")
            .unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].get("Event"), Some("Newchannel"));
        assert_eq!(msgs[1].get("Event"), Some("Hangup"));
    }
}
