//! Session configuration.
//!
//! Grounded on the forwarder's `UplinkConfig`: a plain data struct carrying
//! everything a connection attempt needs, built up with a small fluent
//! builder rather than a constructor with a long positional argument list.

use std::time::Duration;

use crate::dispatcher::DEFAULT_ACTION_TIMEOUT;
use crate::frame::DEFAULT_BUFFER_CAPACITY;

/// The default AMI TCP port (`spec.md` §6).
pub const DEFAULT_PORT: u16 = 5038;

/// How long [`crate::session::Session::connect`] will wait for the
/// server's banner line before giving up (`spec.md` §4.4).
pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and session-wide tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hostname or IP of the Asterisk instance.
    pub host: String,
    /// TCP port, normally [`DEFAULT_PORT`].
    pub port: u16,
    /// Upper bound on waiting for the connect-time banner line.
    pub banner_timeout: Duration,
    /// Upper bound on waiting for any single action's response.
    pub action_timeout: Duration,
    /// Frame parser buffer capacity; a single message larger than this is
    /// treated as a fatal protocol error (`spec.md` §4.1).
    pub buffer_capacity: usize,
    /// Initial value of the discard-on-failure flag (`spec.md` §4.3).
    pub discard_on_failure: bool,
}

impl SessionConfig {
    /// Start building a config for `host:port`; everything else defaults to
    /// the values `spec.md` names as typical.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        SessionConfig {
            host: host.into(),
            port,
            banner_timeout: DEFAULT_BANNER_TIMEOUT,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            discard_on_failure: false,
        }
    }

    /// Convenience constructor for the default port.
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    pub fn banner_timeout(mut self, timeout: Duration) -> Self {
        self.banner_timeout = timeout;
        self
    }

    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn discard_on_failure(mut self, flag: bool) -> Self {
        self.discard_on_failure = flag;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_port_and_timeout() {
        let cfg = SessionConfig::with_default_port("pbx.example.net");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.action_timeout, DEFAULT_ACTION_TIMEOUT);
        assert!(!cfg.discard_on_failure);
    }

    #[test]
    fn builder_overrides_apply() {
        let cfg = SessionConfig::new("pbx.example.net", 5039)
            .action_timeout(Duration::from_millis(250))
            .discard_on_failure(true);
        assert_eq!(cfg.port, 5039);
        assert_eq!(cfg.action_timeout, Duration::from_millis(250));
        assert!(cfg.discard_on_failure);
    }
}
