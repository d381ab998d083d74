//! Gateway connection state machine.
//!
//! Owns the single logical connection of a session: credential resolution,
//! handshake confirmation, disconnect classification and backoff scheduling.
//! Uses the action pattern: methods return [`ConnectionAction`]s for the
//! driver to execute and never perform I/O.
//!
//! # State Machine
//!
//! ```text
//!                 credentials ok           connect / connected{ack}
//! ┌──────────────┐ ─────────────> ┌────────────┐ ─────────────> ┌───────────┐
//! │ Disconnected │                │ Connecting │                │ Connected │
//! └──────────────┘ <───────────── └────────────┘ <───────────── └───────────┘
//!        ^            open failed                   disconnect        │
//!        └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! - At most one connection is live: opening with different credentials
//!   closes the current one first.
//! - At most one reconnect is scheduled at a time.
//! - Terminal and local disconnects never schedule a reconnect.

use crate::{
    error::{ConnectionError, DisconnectKind, Disconnection},
    identity::{Credentials, Identity},
    reconnect::{ReconnectConfig, ReconnectPolicy},
};

/// Recorded reason for [`ConnectionManager::disconnect`].
pub const LOCAL_REASON: &str = "disconnect requested";

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Ask the credential resolver for a token, then report back with
    /// [`ConnectionManager::credentials_resolved`]
    ResolveCredentials,

    /// Open the transport with this bearer token
    Open {
        /// Gateway bearer token
        token: String,
    },

    /// Close the transport
    Close,

    /// Arm the reconnect timer
    ScheduleReconnect {
        /// Backoff delay
        delay: std::time::Duration,
        /// Attempt number, starting at 1
        attempt: u32,
    },

    /// Disarm the reconnect timer
    CancelReconnect,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport
    #[default]
    Disconnected,
    /// Transport opening, handshake not yet confirmed
    Connecting,
    /// Handshake confirmed by the gateway
    Connected,
}

impl ConnectionState {
    /// Lowercase name of the state.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Connection lifecycle state machine.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    credentials: Option<Credentials>,
    policy: ReconnectPolicy,
    resolving: bool,
    reconnect_pending: bool,
    last_disconnect: Option<Disconnection>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

impl ConnectionManager {
    /// Create a disconnected manager.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            credentials: None,
            policy: ReconnectPolicy::new(config),
            resolving: false,
            reconnect_pending: false,
            last_disconnect: None,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once the handshake is confirmed.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Identity of the current (or most recent) credentials.
    pub fn identity(&self) -> Option<&Identity> {
        self.credentials.as_ref().map(|c| &c.identity)
    }

    /// How the last connection ended. Cleared by a successful handshake.
    pub fn last_disconnect(&self) -> Option<&Disconnection> {
        self.last_disconnect.as_ref()
    }

    /// Reconnect attempts used since the last reset.
    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempts()
    }

    /// True while a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Manual connect.
    ///
    /// Resets the backoff counter and cancels any scheduled reconnect. A
    /// connect while a credential resolution is in flight is a no-op.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.resolving {
            tracing::debug!("connect ignored, credential resolution already pending");
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.policy.reset();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(ConnectionAction::CancelReconnect);
        }

        self.resolving = true;
        actions.push(ConnectionAction::ResolveCredentials);
        actions
    }

    /// Credential resolution finished.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingCredentials` if `credentials` is `None`
    /// - `ConnectionError::EmptyToken` if the token is blank
    /// - `ConnectionError::InvalidState` if no resolution was pending
    pub fn credentials_resolved(
        &mut self,
        credentials: Option<Credentials>,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !self.resolving {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "accept credentials",
            });
        }
        self.resolving = false;

        let credentials = credentials.ok_or(ConnectionError::MissingCredentials)?;
        if credentials.is_blank() {
            return Err(ConnectionError::EmptyToken);
        }

        let mut actions = Vec::new();
        if self.state != ConnectionState::Disconnected {
            if self.credentials.as_ref() == Some(&credentials) {
                tracing::debug!(state = self.state.as_str(), "connection already live");
                return Ok(actions);
            }
            actions.push(ConnectionAction::Close);
        }

        tracing::info!(user_id = credentials.identity.id, "opening gateway connection");
        actions.push(ConnectionAction::Open { token: credentials.token.clone() });
        self.credentials = Some(credentials);
        self.state = ConnectionState::Connecting;
        Ok(actions)
    }

    /// Gateway confirmed the session (`connect`, or `connected` while still
    /// connecting).
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` unless the state is `Connecting`
    pub fn handshake(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "complete handshake",
            });
        }

        self.state = ConnectionState::Connected;
        self.policy.reset();
        self.last_disconnect = None;
        tracing::info!("gateway connection established");
        Ok(())
    }

    /// The transport closed or failed to open.
    ///
    /// Disconnects reported while already disconnected are ignored, so a
    /// transport that reports both a failed open and a close schedules only
    /// one retry.
    pub fn handle_disconnect(
        &mut self,
        kind: DisconnectKind,
        reason: impl Into<String>,
    ) -> Vec<ConnectionAction> {
        if self.state == ConnectionState::Disconnected {
            tracing::debug!(?kind, "disconnect while already disconnected");
            return Vec::new();
        }

        self.state = ConnectionState::Disconnected;
        self.last_disconnect = Some(Disconnection::new(kind, reason));

        let mut actions = Vec::new();
        match kind {
            DisconnectKind::Terminal | DisconnectKind::Local => {
                tracing::info!(?kind, "connection ended, not reconnecting");
                if self.reconnect_pending {
                    self.reconnect_pending = false;
                    actions.push(ConnectionAction::CancelReconnect);
                }
            },
            DisconnectKind::Transient => {
                if let Some(delay) = self.policy.next_delay() {
                    let attempt = self.policy.attempts();
                    tracing::info!(?delay, attempt, "connection lost, scheduling reconnect");
                    self.reconnect_pending = true;
                    actions.push(ConnectionAction::ScheduleReconnect { delay, attempt });
                } else {
                    tracing::warn!(
                        attempts = self.policy.attempts(),
                        "reconnect attempts exhausted, waiting for manual connect"
                    );
                }
            },
        }

        actions
    }

    /// The reconnect timer fired.
    ///
    /// Ignored unless a reconnect was actually scheduled and is still wanted.
    pub fn reconnect_due(&mut self) -> Vec<ConnectionAction> {
        let was_pending = std::mem::take(&mut self.reconnect_pending);

        if !was_pending || self.state != ConnectionState::Disconnected || self.resolving {
            tracing::debug!(state = self.state.as_str(), "reconnect no longer needed");
            return Vec::new();
        }

        self.resolving = true;
        vec![ConnectionAction::ResolveCredentials]
    }

    /// Explicit local teardown. Never schedules a reconnect.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if self.state != ConnectionState::Disconnected {
            actions.push(ConnectionAction::Close);
        }
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(ConnectionAction::CancelReconnect);
        }

        self.state = ConnectionState::Disconnected;
        self.resolving = false;
        self.last_disconnect = Some(Disconnection::new(DisconnectKind::Local, LOCAL_REASON));
        actions
    }

    /// Teardown plus forgetting the credentials and backoff state.
    pub fn reset(&mut self) -> Vec<ConnectionAction> {
        let actions = self.disconnect();
        self.credentials = None;
        self.last_disconnect = None;
        self.policy.reset();
        actions
    }
}
