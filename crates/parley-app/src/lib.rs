//! Async runtime for Parley.
//!
//! The sync engine in `parley-client` is a pure state machine. This crate
//! executes its actions: it owns the gateway transport, the timers, and the
//! collaborators the engine asks for (credentials, the conversation
//! directory), and publishes a [`SessionSnapshot`] after every transition.
//!
//! # Components
//!
//! - [`Runtime`]: `select!` loop feeding one event at a time into the client
//! - [`GatewayDriver`]: transport seam (open, send, receive, close)
//! - [`ConversationDirectory`]: conversation list, history and status updates
//! - [`CredentialResolver`]: yields the bearer token and identity
//! - [`TimerSet`]: one abortable task per timer slot
//! - [`SystemEnv`]: production environment on the tokio clock
//!
//! [`SessionSnapshot`]: parley_client::SessionSnapshot

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod credential;
mod directory;
mod driver;
mod error;
mod runtime;
mod system_env;
mod timers;

pub use credential::{CredentialResolver, StaticCredentials};
pub use directory::ConversationDirectory;
pub use driver::GatewayDriver;
pub use error::RuntimeError;
pub use runtime::{
    Command, DEFAULT_COMMAND_CAPACITY, DEFAULT_TICK_INTERVAL, Runtime, RuntimeConfig,
    RuntimeHandle,
};
pub use system_env::SystemEnv;
pub use timers::{TimerFirings, TimerSet};
