//! Production environment.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_core::env::Environment;

/// Environment backed by the tokio clock.
///
/// Uses `tokio::time::Instant`, so a runtime under `start_paused` tests runs
/// on virtual time without any change.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a system environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
