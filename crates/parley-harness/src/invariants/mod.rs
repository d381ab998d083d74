//! Invariant checking over session snapshots.
//!
//! Invariants are properties that must hold after every transition. Unlike
//! example-based tests that check specific scenarios, they are checked against
//! whatever state an arbitrary event sequence produced.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! client.handle(event);
//! registry.assert_all(&client.snapshot(), "after event 12");
//! ```

mod checks;

pub use checks::{
    CacheBounded, ConversationsSorted, MessageIdentity, TypingSetsWellFormed, UniqueConversations,
};
use parley_client::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a [`SessionSnapshot`].
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every session invariant, assuming the default cache
    /// limit.
    ///
    /// Includes:
    /// - [`ConversationsSorted`]: list ordered by activity, newest first
    /// - [`UniqueConversations`]: no conversation listed twice
    /// - [`MessageIdentity`]: no duplicate ids or correlation ids
    /// - [`CacheBounded`]: per-conversation cache within the limit
    /// - [`TypingSetsWellFormed`]: no empty or duplicated typing sets
    pub fn standard() -> Self {
        Self::with_cache_limit(parley_client::DEFAULT_MESSAGE_CACHE_LIMIT)
    }

    /// Standard registry for a client configured with `limit`.
    pub fn with_cache_limit(limit: usize) -> Self {
        let mut registry = Self::new();
        registry.add(ConversationsSorted);
        registry.add(UniqueConversations);
        registry.add(MessageIdentity);
        registry.add(CacheBounded { limit });
        registry.add(TypingSetsWellFormed);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants. Returns every violation found.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
