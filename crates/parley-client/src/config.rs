//! Sync engine configuration.

use std::time::Duration;

use parley_core::ReconnectConfig;

/// Idle time after the last keystroke before `typing{false}` is sent.
pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_secs(3);

/// Remote typing indicators expire after this long without a refresh.
pub const DEFAULT_PRESENCE_TTL: Duration = Duration::from_secs(3);

/// Messages kept per conversation.
pub const DEFAULT_MESSAGE_CACHE_LIMIT: usize = 100;

/// Explicit retries allowed per message.
pub const DEFAULT_MAX_SEND_RETRIES: u32 = 3;

/// Sync engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backoff for transient disconnects
    pub reconnect: ReconnectConfig,
    /// Local typing debounce
    pub typing_idle: Duration,
    /// Remote typing expiry
    pub presence_ttl: Duration,
    /// Messages kept per conversation; oldest are evicted first
    pub message_cache_limit: usize,
    /// Explicit retries allowed before a message is marked failed for good
    pub max_send_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            typing_idle: DEFAULT_TYPING_IDLE,
            presence_ttl: DEFAULT_PRESENCE_TTL,
            message_cache_limit: DEFAULT_MESSAGE_CACHE_LIMIT,
            max_send_retries: DEFAULT_MAX_SEND_RETRIES,
        }
    }
}
