//! Action dispatcher (component C3).
//!
//! Mirrors the teacher's `buffer.rs`: callers don't talk to the socket
//! directly, they hand a request to a shared piece of state and await a
//! reply that arrives later from a different task. There, the "later" task
//! is the dedicated connection task and replies arrive over `oneshot`
//! channels keyed by request; here the "later" task is the reader (C2) and
//! replies are keyed by `ActionID` instead of one channel per connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::connection::{validate_param, AmiWriter};
use crate::error::AmiError;
use crate::response::Response;

/// Default per-action wait bound (`spec.md` §4.3: "typical default: 1
/// second wall-clock from send").
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) type PendingReply = Result<Response, AmiError>;

/// The shared table of outstanding actions, keyed by `ActionID`.
///
/// At most one slot exists per identifier (`spec.md` §3 invariant 2) — a
/// second `register` for the same id would be a bug in the dispatcher
/// itself, not a caller error, since identifiers are minted centrally.
pub(crate) struct PendingTable {
    slots: Mutex<HashMap<i64, oneshot::Sender<PendingReply>>>,
}

impl PendingTable {
    fn new() -> Self {
        PendingTable {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, action_id: i64) -> oneshot::Receiver<PendingReply> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().unwrap().insert(action_id, tx);
        rx
    }

    fn remove(&self, action_id: i64) {
        self.slots.lock().unwrap().remove(&action_id);
    }

    /// Reader-side: is this identifier one we're waiting on?
    pub(crate) fn contains(&self, action_id: i64) -> bool {
        self.slots.lock().unwrap().contains_key(&action_id)
    }

    /// Reader-side: deliver a completed response. If the slot is gone (the
    /// caller already timed out), the response is dropped; `spec.md` §9
    /// resolves this as "discard and log at debug level >= 2", which the
    /// reader does before calling this.
    pub(crate) fn complete(&self, action_id: i64, reply: PendingReply) {
        if let Some(tx) = self.slots.lock().unwrap().remove(&action_id) {
            let _ = tx.send(reply);
        }
    }

    /// Fatal teardown: wake every still-pending caller with a uniform
    /// failure so nobody hangs past shutdown (`spec.md` §5, §8 "Shutdown
    /// liveness").
    pub(crate) fn fail_all(&self, err: AmiError) {
        let mut slots = self.slots.lock().unwrap();
        for (_, tx) in slots.drain() {
            let _ = tx.send(Err(err.clone()));
        }
    }
}

/// Owns the monotonic `ActionID` counter, the pending table, the write
/// lock, and the session's verbosity cap. One instance per session, shared
/// (via `Arc`) between every caller of `action()`, the reader task, and the
/// `Session` handle itself — the one place common to all three, which is
/// why the debug level lives here rather than on `Session` alone.
pub(crate) struct Dispatcher {
    next_action_id: AtomicI64,
    pending: PendingTable,
    writer: tokio::sync::Mutex<AmiWriter>,
    pub(crate) timeout: Duration,
    debug_level: AtomicU8,
}

impl Dispatcher {
    pub(crate) fn new(writer: AmiWriter, timeout: Duration) -> Self {
        Dispatcher {
            next_action_id: AtomicI64::new(1),
            pending: PendingTable::new(),
            writer: tokio::sync::Mutex::new(writer),
            timeout,
            debug_level: AtomicU8::new(1),
        }
    }

    pub(crate) fn pending(&self) -> &PendingTable {
        &self.pending
    }

    /// Current verbosity cap, `0..=10` (`spec.md` §4.4). `0` silences the
    /// session's own log output; `reader.rs` and `action()` both consult
    /// this before emitting anything above the level it requires.
    pub(crate) fn debug_level(&self) -> u8 {
        self.debug_level.load(Ordering::Acquire)
    }

    /// Set the verbosity cap, returning the previous value.
    pub(crate) fn set_debug_level(&self, level: u8) -> u8 {
        self.debug_level.swap(level, Ordering::AcqRel)
    }

    /// Stamp, send, and await the correlated response for one action
    /// (`spec.md` §4.3).
    pub(crate) async fn action(
        &self,
        name: &str,
        params: &[(String, String)],
    ) -> Result<Response, AmiError> {
        for (key, value) in params {
            validate_param(key, value)?;
        }

        let action_id = self.next_action_id.fetch_add(1, Ordering::SeqCst);
        let rx = self.pending.register(action_id);

        {
            // Only one task writes to the socket at a time (invariant 4).
            let mut writer = self.writer.lock().await;
            if let Err(err) = writer.write_action(name, action_id, params).await {
                drop(writer);
                self.pending.remove(action_id);
                return Err(err);
            }
        }

        if self.debug_level() > 0 {
            tracing::debug!(action = name, action_id, "action sent");
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_canceled)) => Err(AmiError::SessionClosed),
            Err(_elapsed) => {
                self.pending.remove(action_id);
                if self.debug_level() > 0 {
                    tracing::warn!(action = name, action_id, "action timed out");
                }
                Err(AmiError::Timeout)
            }
        }
    }

    pub(crate) async fn shutdown_writer(&self) -> Result<(), AmiError> {
        self.writer.lock().await.shutdown().await
    }
}

/// Inspect a response's success flag; returns a failure indicator without
/// requiring the caller to inspect fields directly (`spec.md` §4.3
/// `action_response_result`).
pub fn action_response_result(response: &Response) -> bool {
    response.success
}
