//! Typing presence in both directions.
//!
//! [`RemoteTyping`] aggregates `user_typing` events into per-conversation
//! sets of usernames. [`LocalTyping`] debounces the local user's keystrokes
//! into `typing` emissions; the idle timer itself lives in the client's timer
//! registry.

use std::{collections::BTreeMap, ops::Sub, time::Duration};

use parley_proto::{ConversationId, UserTyping};

#[derive(Debug, Clone)]
struct Typist<I> {
    username: String,
    last_seen: I,
}

/// Who is typing where.
///
/// Sets never leak across conversations; an empty set is removed.
#[derive(Debug, Clone)]
pub struct RemoteTyping<I> {
    by_conversation: BTreeMap<ConversationId, Vec<Typist<I>>>,
}

impl<I> Default for RemoteTyping<I> {
    fn default() -> Self {
        Self { by_conversation: BTreeMap::new() }
    }
}

impl<I> RemoteTyping<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a `user_typing` event. Returns `true` if the visible set
    /// changed.
    ///
    /// A repeated `is_typing: true` only refreshes the expiry.
    pub fn apply(&mut self, event: &UserTyping, now: I) -> bool {
        if event.is_typing {
            let typists = self.by_conversation.entry(event.conversation_id).or_default();
            if let Some(existing) = typists.iter_mut().find(|t| t.username == event.username) {
                existing.last_seen = now;
                return false;
            }
            typists.push(Typist { username: event.username.clone(), last_seen: now });
            return true;
        }

        let Some(typists) = self.by_conversation.get_mut(&event.conversation_id) else {
            return false;
        };
        let before = typists.len();
        typists.retain(|t| t.username != event.username);
        let changed = typists.len() != before;
        if typists.is_empty() {
            self.by_conversation.remove(&event.conversation_id);
        }
        changed
    }

    /// Drop entries not refreshed within `ttl`. Returns `true` if anything
    /// was removed.
    pub fn expire(&mut self, now: I, ttl: Duration) -> bool {
        let mut changed = false;
        self.by_conversation.retain(|conversation_id, typists| {
            let before = typists.len();
            typists.retain(|t| now - t.last_seen < ttl);
            if typists.len() != before {
                let expired = before - typists.len();
                tracing::trace!(conversation_id, expired, "typing expired");
                changed = true;
            }
            !typists.is_empty()
        });
        changed
    }

    /// Usernames typing in a conversation, in arrival order.
    pub fn usernames(&self, conversation_id: ConversationId) -> Vec<String> {
        self.by_conversation
            .get(&conversation_id)
            .map(|typists| typists.iter().map(|t| t.username.clone()).collect())
            .unwrap_or_default()
    }

    /// Every non-empty set.
    pub fn snapshot(&self) -> BTreeMap<ConversationId, Vec<String>> {
        self.by_conversation
            .iter()
            .map(|(id, typists)| (*id, typists.iter().map(|t| t.username.clone()).collect()))
            .collect()
    }

    /// Forget everyone. Returns `true` if anything was visible.
    pub fn clear(&mut self) -> bool {
        let changed = !self.by_conversation.is_empty();
        self.by_conversation.clear();
        changed
    }
}

/// A `typing` emission to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// Emit `typing{is_typing: true}`
    Start(ConversationId),
    /// Emit `typing{is_typing: false}`
    Stop(ConversationId),
}

/// Local keystroke debounce.
///
/// Tracks the conversation the local user is currently typing in. The caller
/// re-arms the idle timer after every keystroke.
#[derive(Debug, Clone, Default)]
pub struct LocalTyping {
    active: Option<ConversationId>,
}

impl LocalTyping {
    /// Create an idle debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A keystroke happened in `conversation_id`.
    ///
    /// The first keystroke starts typing. Typing in a different conversation
    /// stops the previous one first.
    pub fn keystroke(&mut self, conversation_id: ConversationId) -> Vec<TypingSignal> {
        match self.active.replace(conversation_id) {
            Some(current) if current == conversation_id => Vec::new(),
            Some(previous) => {
                vec![TypingSignal::Stop(previous), TypingSignal::Start(conversation_id)]
            },
            None => vec![TypingSignal::Start(conversation_id)],
        }
    }

    /// The idle timer fired.
    pub fn idle(&mut self) -> Option<TypingSignal> {
        self.active.take().map(TypingSignal::Stop)
    }

    /// Stop typing early (send, conversation switch, teardown).
    pub fn cancel(&mut self) -> Option<TypingSignal> {
        self.active.take().map(TypingSignal::Stop)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn typing(conversation_id: ConversationId, username: &str, is_typing: bool) -> UserTyping {
        UserTyping { conversation_id, user_id: 9, username: username.into(), is_typing }
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let now = Instant::now();
        let mut remote = RemoteTyping::new();

        assert!(remote.apply(&typing(1, "bo", true), now));
        assert!(!remote.apply(&typing(1, "bo", true), now));
        assert_eq!(remote.usernames(1), vec!["bo".to_string()]);

        assert!(remote.apply(&typing(1, "bo", false), now));
        assert!(!remote.apply(&typing(1, "bo", false), now));
        assert!(remote.snapshot().is_empty());
    }

    #[test]
    fn sets_are_per_conversation() {
        let now = Instant::now();
        let mut remote = RemoteTyping::new();
        remote.apply(&typing(1, "bo", true), now);
        remote.apply(&typing(2, "cy", true), now);
        remote.apply(&typing(2, "bo", false), now);

        assert_eq!(remote.usernames(1), vec!["bo".to_string()]);
        assert_eq!(remote.usernames(2), vec!["cy".to_string()]);
    }

    #[test]
    fn entries_expire_without_refresh() {
        let t0 = Instant::now();
        let ttl = Duration::from_secs(3);
        let mut remote = RemoteTyping::new();
        remote.apply(&typing(1, "bo", true), t0);
        remote.apply(&typing(1, "cy", true), t0);
        remote.apply(&typing(1, "cy", true), t0 + Duration::from_secs(2));

        assert!(!remote.expire(t0 + Duration::from_secs(2), ttl));
        assert!(remote.expire(t0 + Duration::from_secs(3), ttl));
        assert_eq!(remote.usernames(1), vec!["cy".to_string()]);

        assert!(remote.expire(t0 + Duration::from_secs(5), ttl));
        assert!(remote.snapshot().is_empty());
    }

    #[test]
    fn first_keystroke_starts_typing() {
        let mut local = LocalTyping::new();
        assert_eq!(local.keystroke(1), vec![TypingSignal::Start(1)]);
        assert!(local.keystroke(1).is_empty());
        assert_eq!(local.idle(), Some(TypingSignal::Stop(1)));
        assert_eq!(local.idle(), None);
    }

    #[test]
    fn keystroke_elsewhere_stops_previous() {
        let mut local = LocalTyping::new();
        local.keystroke(1);
        assert_eq!(local.keystroke(2), vec![TypingSignal::Stop(1), TypingSignal::Start(2)]);
        assert_eq!(local.cancel(), Some(TypingSignal::Stop(2)));
    }

    #[test]
    fn cancel_stops_once() {
        let mut local = LocalTyping::new();
        local.keystroke(4);
        assert_eq!(local.cancel(), Some(TypingSignal::Stop(4)));
        assert_eq!(local.cancel(), None);
    }
}
