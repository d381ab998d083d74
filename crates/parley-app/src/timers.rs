//! Timer tasks.
//!
//! Each [`TimerSlot`] owns at most one sleeping task. Arming a slot aborts the
//! task already there; a firing is reported as `(slot, token)` on a channel and
//! the client discards tokens it no longer expects.

use std::{collections::BTreeMap, time::Duration};

use parley_core::{TimerSlot, TimerToken, env::Environment};
use tokio::{sync::mpsc, task::JoinHandle};

/// Receiving end of timer firings.
pub type TimerFirings = mpsc::UnboundedReceiver<(TimerSlot, TimerToken)>;

/// Abortable timer task per slot.
pub struct TimerSet<E: Environment> {
    env: E,
    tasks: BTreeMap<TimerSlot, JoinHandle<()>>,
    fired: mpsc::UnboundedSender<(TimerSlot, TimerToken)>,
}

impl<E: Environment> TimerSet<E> {
    /// Create an empty set and the channel its firings arrive on.
    pub fn new(env: E) -> (Self, TimerFirings) {
        let (fired, firings) = mpsc::unbounded_channel();
        (Self { env, tasks: BTreeMap::new(), fired }, firings)
    }

    /// Arm `slot`, replacing whatever was armed there.
    pub fn start(&mut self, slot: TimerSlot, token: TimerToken, delay: Duration) {
        let env = self.env.clone();
        let fired = self.fired.clone();
        let task = tokio::spawn(async move {
            env.sleep(delay).await;
            if fired.send((slot, token)).is_err() {
                tracing::trace!(?slot, "timer fired after runtime stopped");
            }
        });

        if let Some(previous) = self.tasks.insert(slot, task) {
            previous.abort();
        }
    }

    /// Abort the task in `slot`. Returns `false` if nothing was armed.
    pub fn cancel(&mut self, slot: TimerSlot) -> bool {
        self.tasks.remove(&slot).map(|task| task.abort()).is_some()
    }

    /// Abort every task.
    pub fn cancel_all(&mut self) {
        for (_, task) in std::mem::take(&mut self.tasks) {
            task.abort();
        }
    }
}

impl<E: Environment> Drop for TimerSet<E> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
