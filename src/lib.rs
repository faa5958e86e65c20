//! An asynchronous client for the Asterisk Manager Interface (AMI).
//!
//! AMI is a line-oriented, text-based TCP protocol exposed by a running
//! Asterisk instance for out-of-band control and event monitoring. This
//! crate opens a persistent session, authenticates, issues *actions*
//! (request/response RPCs) while concurrently receiving unsolicited
//! *events*, and correlates asynchronous responses back to their
//! originating callers.
//!
//! # Layout
//!
//! - [`frame`]: splits the incoming byte stream into `Key: Value` messages.
//! - [`connection`]: owns the split TCP socket halves and the wire framing
//!   for outbound actions.
//! - [`dispatcher`]: stamps, sends, and correlates outbound actions.
//! - [`reader`]: the task that owns the socket's read half and classifies
//!   every incoming message.
//! - [`session`]: the public [`Session`] handle tying the above together,
//!   plus the canned action wrappers (`login`, `getvar`, `originate_exten`,
//!   …).
//! - [`manager_conf`]: a standalone helper for reading a password out of a
//!   `manager.conf` file; has no dependency on the rest of the crate.
//!
//! # Example
//!
//! ```no_run
//! use ami_client::{SessionConfig, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::with_default_port("127.0.0.1");
//! let session = Session::connect(config, None, None).await?;
//! session.login("admin", "secret").await?;
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub use config::SessionConfig;

mod connection;

mod dispatcher;
pub use dispatcher::action_response_result;

pub mod error;
pub use error::{AmiError, Error, Result};

pub mod frame;
pub use frame::{Field, Message};

pub mod manager_conf;

mod reader;
pub use reader::{DisconnectCallback, EventCallback};

pub mod response;
pub use response::Response;

pub mod session;
pub use session::{Session, State};

mod shutdown;

/// The AMI TCP port Asterisk listens on by default.
pub const DEFAULT_PORT: u16 = config::DEFAULT_PORT;
