//! Conversation sync engine for Parley.
//!
//! [`Client`] is a pure state machine over the whole session: it consumes
//! [`ClientEvent`]s (user intents, gateway frames, timer firings, directory
//! results) and returns [`ClientAction`]s for the runtime to execute. No I/O
//! happens here, so every interleaving can be replayed deterministically.
//!
//! # Components
//!
//! - [`MessageCache`]: optimistic sends and server confirmations, deduplicated
//!   and capped per conversation
//! - [`ConversationIndex`]: conversation list ordered by recent activity
//! - [`RemoteTyping`] / [`LocalTyping`]: presence in both directions
//! - [`Dispatcher`]: gateway emissions, dropped while disconnected
//! - [`SessionSnapshot`]: immutable view published after each transition

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod dispatcher;
mod error;
mod event;
mod index;
mod reconciler;
mod snapshot;
mod state;
mod typing;

pub use client::Client;
pub use config::{
    DEFAULT_MAX_SEND_RETRIES, DEFAULT_MESSAGE_CACHE_LIMIT, DEFAULT_PRESENCE_TTL,
    DEFAULT_TYPING_IDLE, SyncConfig,
};
pub use dispatcher::Dispatcher;
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
pub use index::ConversationIndex;
pub use reconciler::{Applied, MessageCache};
pub use snapshot::SessionSnapshot;
pub use state::{Conversation, HistoryPage, Message, MessageKey};
pub use typing::{LocalTyping, RemoteTyping, TypingSignal};
