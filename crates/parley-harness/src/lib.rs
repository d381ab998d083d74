//! Deterministic test harness for Parley.
//!
//! In-memory implementations of the runtime's collaborator traits plus an
//! invariant registry over [`SessionSnapshot`]s.
//!
//! # Invariant Testing
//!
//! Invariants state what must hold after every transition, whatever the
//! event order. Use [`InvariantRegistry::standard()`] for the session-wide
//! checks and run it after each `Client::handle`.
//!
//! # Simulation
//!
//! [`SimGateway`] is a scripted gateway: it confirms the handshake on open,
//! can echo sends back as confirmed messages, refuse opens, and drop the
//! connection on demand. [`SimDirectory`] serves conversations and paged
//! history from memory. Both are cheap to clone; clones share state, so a test
//! keeps one handle while the runtime owns the other.
//!
//! [`SessionSnapshot`]: parley_client::SessionSnapshot

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_directory;
pub mod sim_gateway;

pub use invariants::{
    CacheBounded, ConversationsSorted, Invariant, InvariantRegistry, InvariantResult,
    MessageIdentity, TypingSetsWellFormed, UniqueConversations, Violation,
};
pub use sim_directory::{HISTORY_PAGE_SIZE, SimDirectory, SimDirectoryError};
pub use sim_gateway::{SimGateway, SimGatewayError};
