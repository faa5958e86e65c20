//! Session lifecycle (component C4).
//!
//! `Session` is the crate's public handle, playing the role the teacher's
//! `Handler` plays inside `server.rs`: the thing that owns a connection's
//! state for its whole lifetime. Unlike `Handler`, which is driven entirely
//! by its own `run` loop, a `Session` is driven by its callers — `connect`
//! spawns the reader task (C2) and hands back a handle that `action` calls
//! (C3) and `disconnect`/`destroy` calls (C4) all share.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::connection;
use crate::dispatcher::Dispatcher;
use crate::error::AmiError;
use crate::reader::{DisconnectCallback, EventCallback, Reader};
use crate::response::Response;
use crate::shutdown::Shutdown;

/// Lifecycle stages from `spec.md` §4.4's state machine. `Destroyed` has no
/// matching C state — it's reached by dropping the `Session` value, but is
/// tracked here too so `destroy()` can reject a second call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Connected,
    Authenticated,
    Disconnecting,
    Disconnected,
    Destroyed,
}

struct Inner {
    dispatcher: Arc<Dispatcher>,
    state: std::sync::Mutex<State>,
    discard_on_failure: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    reader_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// A connected AMI session.
///
/// Cloning shares the same underlying connection — every clone calls
/// `action` through the same dispatcher and write lock (invariant 4 in
/// `spec.md` §3).
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Open a TCP connection, consume the banner, start the reader task,
    /// and return a connected (not yet authenticated) session (`spec.md`
    /// §4.4).
    ///
    /// `on_event` fires for every unsolicited event; `on_disconnect` fires
    /// exactly once if the session ends for any reason other than a local
    /// `disconnect()` call.
    pub async fn connect(
        config: SessionConfig,
        on_event: Option<EventCallback>,
        on_disconnect: Option<DisconnectCallback>,
    ) -> Result<Self, AmiError> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| AmiError::Connection(format!("connect to {addr} failed: {e}")))?;

        let (mut reader, writer) = connection::split(stream, config.buffer_capacity);

        let banner = tokio::time::timeout(config.banner_timeout, reader.read_banner())
            .await
            .map_err(|_| AmiError::Connection("timed out waiting for banner".into()))??;
        tracing::info!(banner = %banner, "ami banner received");

        let dispatcher = Arc::new(Dispatcher::new(writer, config.action_timeout));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let inner = Arc::new(Inner {
            dispatcher: Arc::clone(&dispatcher),
            state: std::sync::Mutex::new(State::Connected),
            discard_on_failure: AtomicBool::new(config.discard_on_failure),
            shutdown_tx,
            reader_task: std::sync::Mutex::new(None),
        });

        let reader_task = tokio::spawn(
            Reader::new(reader, dispatcher, on_event, on_disconnect, Shutdown::new(shutdown_rx)).run(),
        );
        *inner.reader_task.lock().unwrap() = Some(reader_task);

        Ok(Session { inner })
    }

    /// Issue one action and await its correlated response (`spec.md` §4.3).
    ///
    /// Returns `Ok(None)` when the discard-on-failure flag is set and the
    /// completed response had `success == false`.
    pub async fn action(
        &self,
        name: &str,
        params: &[(String, String)],
    ) -> Result<Option<Response>, AmiError> {
        self.require_state_at_least(State::Connected)?;
        let response = self.inner.dispatcher.action(name, params).await?;
        if !response.success && self.inner.discard_on_failure.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(Some(response))
    }

    /// `Login` action; must be the first action issued (`spec.md` §4.3).
    /// Advances the state machine to `Authenticated` on success.
    pub async fn login(&self, username: &str, secret: &str) -> Result<bool, AmiError> {
        let params = vec![
            ("Username".to_string(), username.to_string()),
            ("Secret".to_string(), secret.to_string()),
        ];
        let response = self.inner.dispatcher.action("Login", &params).await?;
        if response.success {
            *self.inner.state.lock().unwrap() = State::Authenticated;
        }
        Ok(response.success)
    }

    /// Explicit `Logoff` action. Also sent implicitly by `disconnect()`
    /// (`spec.md` §6).
    pub async fn logoff(&self) -> Result<bool, AmiError> {
        let response = self.inner.dispatcher.action("Logoff", &[]).await?;
        Ok(response.success)
    }

    /// `Getvar` action; returns the `Value` field of a successful response.
    pub async fn getvar(
        &self,
        channel: Option<&str>,
        variable: &str,
    ) -> Result<Option<String>, AmiError> {
        let mut params = vec![("Variable".to_string(), variable.to_string())];
        if let Some(channel) = channel {
            params.push(("Channel".to_string(), channel.to_string()));
        }
        let response = self.inner.dispatcher.action("Getvar", &params).await?;
        if !response.success {
            return Ok(None);
        }
        Ok(response.keyvalue("Value").map(str::to_string))
    }

    /// `Setvar` action.
    pub async fn setvar(
        &self,
        channel: Option<&str>,
        variable: &str,
        value: &str,
    ) -> Result<bool, AmiError> {
        let mut params = vec![
            ("Variable".to_string(), variable.to_string()),
            ("Value".to_string(), value.to_string()),
        ];
        if let Some(channel) = channel {
            params.push(("Channel".to_string(), channel.to_string()));
        }
        let response = self.inner.dispatcher.action("Setvar", &params).await?;
        Ok(response.success)
    }

    /// `Originate` action against a dialplan extension.
    pub async fn originate_exten(
        &self,
        channel: &str,
        context: &str,
        exten: &str,
        priority: u32,
        caller_id: Option<&str>,
    ) -> Result<bool, AmiError> {
        let mut params = vec![
            ("Channel".to_string(), channel.to_string()),
            ("Context".to_string(), context.to_string()),
            ("Exten".to_string(), exten.to_string()),
            ("Priority".to_string(), priority.to_string()),
        ];
        if let Some(caller_id) = caller_id {
            params.push(("CallerID".to_string(), caller_id.to_string()));
        }
        let response = self.inner.dispatcher.action("Originate", &params).await?;
        Ok(response.success)
    }

    /// `Redirect` action.
    pub async fn redirect(
        &self,
        channel: &str,
        context: &str,
        exten: &str,
        priority: u32,
    ) -> Result<bool, AmiError> {
        let params = vec![
            ("Channel".to_string(), channel.to_string()),
            ("Context".to_string(), context.to_string()),
            ("Exten".to_string(), exten.to_string()),
            ("Priority".to_string(), priority.to_string()),
        ];
        let response = self.inner.dispatcher.action("Redirect", &params).await?;
        Ok(response.success)
    }

    /// `Reload` action for a single module.
    pub async fn reload(&self, module: &str) -> Result<bool, AmiError> {
        let params = vec![("Module".to_string(), module.to_string())];
        let response = self.inner.dispatcher.action("Reload", &params).await?;
        Ok(response.success)
    }

    /// Toggle the discard-on-failure flag (`spec.md` §4.3).
    pub fn set_discard_on_failure(&self, flag: bool) {
        self.inner.discard_on_failure.store(flag, Ordering::Release);
    }

    /// Set the session's coarse debug verbosity, `0..=10` (`spec.md` §4.4).
    /// `0` silences the session's own `tracing` output (`reader.rs`,
    /// `dispatcher.rs`); `2` and above additionally logs late/unmatched
    /// responses (`spec.md` §9). Returns the previous level, or an error if
    /// `level` is out of range.
    pub fn set_debug_level(&self, level: u8) -> Result<u8, AmiError> {
        if level > 10 {
            return Err(AmiError::Usage(format!(
                "debug level {level} is outside [0, 10]"
            )));
        }
        Ok(self.inner.dispatcher.set_debug_level(level))
    }

    /// `spec.md`'s `set_debug(fd)` in the original fd-redirecting C sense
    /// doesn't translate directly — log destination is an application-level
    /// `tracing-subscriber` concern in idiomatic Rust. This toggles the
    /// coarse on/off gate instead: `false` drops the level to 0 (silence),
    /// `true` restores level 1 if the session was silenced.
    pub fn set_debug(&self, enabled: bool) {
        if !enabled {
            self.inner.dispatcher.set_debug_level(0);
        } else if self.inner.dispatcher.debug_level() == 0 {
            self.inner.dispatcher.set_debug_level(1);
        }
    }

    pub fn debug_level(&self) -> u8 {
        self.inner.dispatcher.debug_level()
    }

    pub fn state(&self) -> State {
        *self.inner.state.lock().unwrap()
    }

    /// Orderly shutdown: stop writing, let the reader drain, then signal it
    /// to stop. The disconnect callback does not fire for this path
    /// (`spec.md` §4.4).
    pub async fn disconnect(&self) -> Result<(), AmiError> {
        {
            let mut state = self.inner.state.lock().unwrap();
            if matches!(*state, State::Disconnected | State::Destroyed) {
                return Ok(()); // idempotent, per spec.md §8
            }
            if *state == State::Authenticated {
                drop(state);
                let _ = self.logoff().await;
                state = self.inner.state.lock().unwrap();
            }
            *state = State::Disconnecting;
        }

        let _ = self.inner.dispatcher.shutdown_writer().await;
        // Broadcasting before joining lets the reader observe shutdown even
        // if it's currently blocked on a read that will never complete.
        let _ = self.inner.shutdown_tx.send(());

        let task = self.inner.reader_task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        *self.inner.state.lock().unwrap() = State::Disconnected;
        Ok(())
    }

    /// Release session-owned resources. Must follow `disconnect` and must
    /// not be called while a caller is still blocked inside `action`
    /// (`spec.md` §4.4); enforced here by requiring `Disconnected` state.
    pub async fn destroy(&self) -> Result<(), AmiError> {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            State::Destroyed => return Ok(()), // idempotent
            State::Disconnected => {}
            _ => {
                return Err(AmiError::Usage(
                    "destroy() called before disconnect() completed".into(),
                ))
            }
        }
        *state = State::Destroyed;
        Ok(())
    }

    fn require_state_at_least(&self, minimum: State) -> Result<(), AmiError> {
        let state = *self.inner.state.lock().unwrap();
        let rank = |s: State| match s {
            State::Init => 0,
            State::Connected => 1,
            State::Authenticated => 2,
            State::Disconnecting => 3,
            State::Disconnected => 4,
            State::Destroyed => 5,
        };
        if rank(state) >= rank(minimum) && rank(state) < rank(State::Disconnecting) {
            Ok(())
        } else {
            Err(AmiError::SessionClosed)
        }
    }
}

