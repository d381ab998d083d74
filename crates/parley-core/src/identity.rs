//! Session identity and gateway credentials.

use std::fmt;

use parley_proto::UserId;

/// Which side of a marketplace conversation the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sells services
    Vendor,
    /// Buys services
    Customer,
}

impl Role {
    /// Lowercase name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The local user. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// User id, compared against `sender_id` on inbound messages
    pub id: UserId,
    /// Name shown to other participants
    pub display_name: String,
    /// Marketplace role
    pub role: Role,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: UserId, display_name: impl Into<String>, role: Role) -> Self {
        Self { id, display_name: display_name.into(), role }
    }
}

/// Bearer token plus the identity it authenticates.
///
/// `Debug` redacts the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Gateway bearer token
    pub token: String,
    /// Identity the token belongs to
    pub identity: Identity,
}

impl Credentials {
    /// Create credentials.
    pub fn new(token: impl Into<String>, identity: Identity) -> Self {
        Self { token: token.into(), identity }
    }

    /// True if the token is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let creds = Credentials::new("secret-token", Identity::new(7, "ana", Role::Vendor));
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("ana"));
    }

    #[test]
    fn whitespace_token_is_blank() {
        let identity = Identity::new(7, "ana", Role::Customer);
        assert!(Credentials::new("  ", identity.clone()).is_blank());
        assert!(!Credentials::new("t", identity).is_blank());
    }
}
