//! Named timer slots with generation tokens.
//!
//! The state machine never sleeps. It arms a slot, hands the token to the
//! driver, and later receives the token back when the timer fires. Arming a
//! slot again invalidates the previous token, so a firing that raced a re-arm
//! or a cancel is recognized as stale and ignored.

/// A named timer. Each slot holds at most one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerSlot {
    /// Backoff before the next reconnect attempt
    Reconnect,
    /// Idle period after the last local keystroke
    Typing,
}

impl TimerSlot {
    const fn index(self) -> usize {
        match self {
            Self::Reconnect => 0,
            Self::Typing => 1,
        }
    }
}

/// Identifies one arming of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Raw generation number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Tracks which token is live for each slot.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    next: u64,
    armed: [Option<TimerToken>; 2],
}

impl TimerRegistry {
    /// Create a registry with every slot idle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `slot`, replacing any previously armed timer.
    pub fn arm(&mut self, slot: TimerSlot) -> TimerToken {
        self.next += 1;
        let token = TimerToken(self.next);
        self.armed[slot.index()] = Some(token);
        token
    }

    /// Disarm `slot`. Returns `true` if a timer was armed.
    pub fn disarm(&mut self, slot: TimerSlot) -> bool {
        self.armed[slot.index()].take().is_some()
    }

    /// Consume a firing. Returns `true` only if `token` is the live one, in
    /// which case the slot becomes idle.
    pub fn fire(&mut self, slot: TimerSlot, token: TimerToken) -> bool {
        let entry = &mut self.armed[slot.index()];
        if *entry == Some(token) {
            *entry = None;
            true
        } else {
            false
        }
    }

    /// True if `slot` has a live timer.
    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.armed[slot.index()].is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearm_invalidates_previous_token() {
        let mut timers = TimerRegistry::new();
        let first = timers.arm(TimerSlot::Typing);
        let second = timers.arm(TimerSlot::Typing);

        assert!(!timers.fire(TimerSlot::Typing, first));
        assert!(timers.is_armed(TimerSlot::Typing));
        assert!(timers.fire(TimerSlot::Typing, second));
        assert!(!timers.is_armed(TimerSlot::Typing));
    }

    #[test]
    fn firing_twice_is_stale() {
        let mut timers = TimerRegistry::new();
        let token = timers.arm(TimerSlot::Reconnect);
        assert!(timers.fire(TimerSlot::Reconnect, token));
        assert!(!timers.fire(TimerSlot::Reconnect, token));
    }

    #[test]
    fn slots_are_independent() {
        let mut timers = TimerRegistry::new();
        let reconnect = timers.arm(TimerSlot::Reconnect);
        let typing = timers.arm(TimerSlot::Typing);

        assert!(timers.disarm(TimerSlot::Typing));
        assert!(!timers.fire(TimerSlot::Typing, typing));
        assert!(timers.fire(TimerSlot::Reconnect, reconnect));
    }

    #[test]
    fn token_from_other_slot_is_rejected() {
        let mut timers = TimerRegistry::new();
        let reconnect = timers.arm(TimerSlot::Reconnect);
        timers.arm(TimerSlot::Typing);
        assert!(!timers.fire(TimerSlot::Typing, reconnect));
    }

    #[test]
    fn disarm_idle_slot() {
        let mut timers = TimerRegistry::new();
        assert!(!timers.disarm(TimerSlot::Reconnect));
        let token = timers.arm(TimerSlot::Reconnect);
        assert!(timers.disarm(TimerSlot::Reconnect));
        assert!(!timers.is_armed(TimerSlot::Reconnect));
        assert!(!timers.fire(TimerSlot::Reconnect, token));
    }
}
