//! Connection lifecycle core for Parley.
//!
//! Pure state machines with no I/O. Each method takes the current input and
//! returns actions for the caller to execute, so the same logic runs against
//! the real gateway and inside deterministic tests.
//!
//! # Components
//!
//! - [`ConnectionManager`]: single logical gateway connection, credential
//!   resolution and disconnect classification
//! - [`ReconnectPolicy`]: bounded exponential backoff
//! - [`TimerRegistry`]: one cancellable timer per [`TimerSlot`]
//! - [`env::Environment`]: time source abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod identity;
pub mod reconnect;
pub mod timer;

pub use connection::{ConnectionAction, ConnectionManager, ConnectionState};
pub use error::{ConnectionError, DisconnectKind, Disconnection};
pub use identity::{Credentials, Identity, Role};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use timer::{TimerRegistry, TimerSlot, TimerToken};
