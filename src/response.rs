//! The assembled [`Response`] returned from [`crate::dispatcher`] (`spec.md` §3).

use crate::frame::Message;

/// A compound response assembled from one or more wire messages.
///
/// `messages[0]` is always the head (the `Response:` line and its
/// companions); `messages[1..]` are the follow-up event messages the server
/// emits as part of a multi-part response, in arrival order.
#[derive(Debug, Clone)]
pub struct Response {
    pub success: bool,
    pub action_id: i64,
    pub messages: Vec<Message>,
}

impl Response {
    /// Start a new in-progress response from its head message.
    pub(crate) fn new(action_id: i64, head: Message) -> Self {
        let success = is_success(&head);
        Response {
            success,
            action_id,
            messages: vec![head],
        }
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The head message (index 0), always present.
    pub fn head(&self) -> &Message {
        &self.messages[0]
    }

    /// Case-insensitive lookup in the head message — the common case for
    /// reading a single value out of a response (e.g. `Value` on a
    /// `Getvar` reply).
    pub fn keyvalue(&self, key: &str) -> Option<&str> {
        self.head().get(key)
    }

    /// Structured debug dump of every message in the response.
    pub fn dump(&self) {
        tracing::debug!(action_id = self.action_id, success = self.success, messages = self.messages.len(), "ami response");
        for message in &self.messages {
            message.dump();
        }
    }
}

/// `Response: Success` or `Response: Goodbye` mean success; `Error` or
/// anything else (including an absent `Response` field) means failure.
fn is_success(head: &Message) -> bool {
    matches!(head.get("Response"), Some(v) if v.eq_ignore_ascii_case("Success") || v.eq_ignore_ascii_case("Goodbye"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MessageParser;

    fn parse_one(input: &[u8]) -> Message {
        let mut parser = MessageParser::new();
        parser.feed(input).unwrap().remove(0)
    }

    #[test]
    fn success_and_goodbye_are_success() {
        let head = parse_one(b"Response: Success\r\nActionID: 1\r\n\r\n");
        assert!(Response::new(1, head).success);

        let head = parse_one(b"Response: Goodbye\r\nActionID: 1\r\n\r\n");
        assert!(Response::new(1, head).success);
    }

    #[test]
    fn error_and_missing_are_failure() {
        let head = parse_one(b"Response: Error\r\nMessage: nope\r\n\r\n");
        assert!(!Response::new(1, head).success);

        let head = parse_one(b"Event: Something\r\n\r\n");
        assert!(!Response::new(1, head).success);
    }

    #[test]
    fn keyvalue_reads_from_head() {
        let head = parse_one(b"Response: Success\r\nValue: 42\r\n\r\n");
        let resp = Response::new(1, head);
        assert_eq!(resp.keyvalue("value"), Some("42"));
    }

    #[test]
    fn messages_preserve_assembly_order() {
        let head = parse_one(b"Response: Success\r\nEventList: start\r\n\r\n");
        let mut resp = Response::new(7, head);
        resp.push(parse_one(b"Event: CoreShowChannel\r\nChannel: SIP/1\r\n\r\n"));
        resp.push(parse_one(b"Event: CoreShowChannel\r\nChannel: SIP/2\r\n\r\n"));
        resp.push(parse_one(
            b"Event: CoreShowChannelsComplete\r\nEventList: Complete\r\n\r\n",
        ));
        assert_eq!(resp.messages.len(), 4);
        assert_eq!(resp.messages[1].get("Channel"), Some("SIP/1"));
        assert_eq!(resp.messages[2].get("Channel"), Some("SIP/2"));
    }
}
