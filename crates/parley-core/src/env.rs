//! Environment abstraction for deterministic testing.
//!
//! Decouples sync logic from system time. Production uses the tokio clock so
//! paused-time tests drive it too; unit tests use [`test_utils::MockEnv`], a
//! manually advanced virtual clock.

use std::{fmt::Debug, future::Future, ops::Sub, time::Duration};

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `wall_clock()` is only used for display timestamps, never for ordering
///   timers
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    ///
    /// Production uses `tokio::time::Instant`; tests use a virtual instant.
    type Instant: Copy + Ord + Debug + Send + Sync + Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time, stamped on optimistic messages.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this. State machines never sleep.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Virtual clock for unit tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::{
        future::Future,
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    use super::Environment;

    /// Manually advanced clock.
    ///
    /// Clones share the same clock, so a test can keep one handle while the
    /// client owns another.
    #[derive(Debug, Clone)]
    pub struct MockEnv {
        origin: Instant,
        wall_origin: DateTime<Utc>,
        elapsed_nanos: Arc<AtomicU64>,
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockEnv {
        /// Create a clock at virtual time zero.
        ///
        /// Wall-clock time starts at 2024-01-01T00:00:00Z.
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                wall_origin: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
                elapsed_nanos: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Advance the clock.
        pub fn advance(&self, duration: Duration) {
            let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
            self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
        }

        /// Time elapsed since the clock was created.
        pub fn elapsed(&self) -> Duration {
            Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn wall_clock(&self) -> DateTime<Utc> {
            let delta = TimeDelta::from_std(self.elapsed()).unwrap_or(TimeDelta::zero());
            self.wall_origin + delta
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            self.advance(duration);
            std::future::ready(())
        }
    }
}
