//! Reader task (component C2).
//!
//! One task owns the socket's read half for the life of the session,
//! mirroring the teacher's per-connection `Handler::run` loop — except
//! instead of serving one client's requests in turn, this loop pulls
//! messages off the wire forever and routes each one to whichever caller
//! (or event callback) it belongs to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::AmiReader;
use crate::dispatcher::Dispatcher;
use crate::error::AmiError;
use crate::frame::Message;
use crate::response::Response;
use crate::shutdown::Shutdown;

/// Invoked once per unsolicited event (`spec.md` §4.2).
pub type EventCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Invoked exactly once when the session ends for a reason other than a
/// local `disconnect()` call (`spec.md` §4.2 "Failure").
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct Reader {
    conn: AmiReader,
    dispatcher: Arc<Dispatcher>,
    in_progress: HashMap<i64, Response>,
    on_event: Option<EventCallback>,
    on_disconnect: Option<DisconnectCallback>,
    shutdown: Shutdown,
}

impl Reader {
    pub(crate) fn new(
        conn: AmiReader,
        dispatcher: Arc<Dispatcher>,
        on_event: Option<EventCallback>,
        on_disconnect: Option<DisconnectCallback>,
        shutdown: Shutdown,
    ) -> Self {
        Reader {
            conn,
            dispatcher,
            in_progress: HashMap::new(),
            on_event,
            on_disconnect,
            shutdown,
        }
    }

    /// Run until the connection ends, locally or otherwise. Consumes self;
    /// this is the body of the task spawned by [`crate::session::Session::connect`].
    pub(crate) async fn run(mut self) {
        let outcome = self.drive().await;

        let locally_closed = self.shutdown.is_shutdown();
        let fail = match &outcome {
            Ok(()) => AmiError::SessionClosed,
            Err(err) => err.clone(),
        };
        self.dispatcher.pending().fail_all(fail);

        if !locally_closed {
            if let Some(cb) = &self.on_disconnect {
                cb();
            }
        }

        if self.dispatcher.debug_level() > 0 {
            if let Err(err) = &outcome {
                tracing::warn!(error = %err, "ami reader task ended");
            } else {
                tracing::debug!("ami reader task ended (local shutdown)");
            }
        }
    }

    async fn drive(&mut self) -> Result<(), AmiError> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => return Ok(()),
                message = self.conn.read_message() => {
                    match message? {
                        None => return Err(AmiError::Connection("connection closed by peer".into())),
                        Some(message) => self.handle_message(message),
                    }
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        if let Some(action_id) = message.action_id() {
            if let Some(response) = self.in_progress.get_mut(&action_id) {
                let done = continuation_terminates(&message);
                response.push(message);
                if done {
                    let response = self.in_progress.remove(&action_id).unwrap();
                    self.dispatcher.pending().complete(action_id, Ok(response));
                }
                return;
            }

            if message.is_response_head() {
                // A legacy `Response: Follows` reply can carry its
                // `--END COMMAND--` sentinel in the head itself, with no
                // separate continuation message — complete immediately
                // rather than opening an entry nothing will ever close.
                if starts_multipart(&message) && !continuation_terminates(&message) {
                    self.in_progress
                        .insert(action_id, Response::new(action_id, message));
                } else {
                    self.complete_or_discard(action_id, message);
                }
                return;
            }

            if !self.dispatcher.pending().contains(action_id) {
                // Has an ActionID but matches nothing we're tracking and isn't
                // a response head — an unsolicited event that happens to carry
                // an identifier. Treat as an event (`spec.md` §4.2 scenario 4).
                self.emit_event(message);
                return;
            }
        }

        if message.is_event() {
            self.emit_event(message);
            return;
        }

        if self.dispatcher.debug_level() > 0 {
            tracing::warn!(message = %message, "unclassified ami message discarded");
        }
    }

    fn complete_or_discard(&self, action_id: i64, head: Message) {
        let response = Response::new(action_id, head);
        // `spec.md` §9: a late arrival for an id nobody is waiting on is
        // discarded, logged only at debug level >= 2.
        if !self.dispatcher.pending().contains(action_id) && self.dispatcher.debug_level() >= 2 {
            tracing::debug!(action_id, "late response for unknown/expired action discarded");
        }
        self.dispatcher.pending().complete(action_id, Ok(response));
    }

    fn emit_event(&self, message: Message) {
        if let Some(cb) = &self.on_event {
            cb(message);
        }
    }
}

/// Does this head message open a multi-part response (`EventList: start`) or
/// the legacy `Response: Follows` form? Both need continuation tracking.
fn starts_multipart(head: &Message) -> bool {
    matches!(head.get("EventList"), Some(v) if v.eq_ignore_ascii_case("start"))
        || matches!(head.get("Response"), Some(v) if v.eq_ignore_ascii_case("Follows"))
}

/// Does this continuation message close out an in-progress multi-part
/// response? Either an `EventList: Complete` event, or (legacy form) an
/// `Output` line equal to the `--END COMMAND--` sentinel.
fn continuation_terminates(message: &Message) -> bool {
    matches!(message.get("EventList"), Some(v) if v.eq_ignore_ascii_case("complete"))
        || message
            .get_all("Output")
            .any(|v| v.trim() == "--END COMMAND--")
}

