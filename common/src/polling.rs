// common/src/polling.rs
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 60,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready(_))
    }
}

/// Run `check` until it yields a value or `max_attempts` checks have come back empty.
///
/// `check` receives the 1-based attempt number. Errors end the poll immediately.
pub async fn poll_until<T, E, F, Fut>(config: PollConfig, mut check: F) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 1..=config.max_attempts {
        if let Some(value) = check(attempt).await? {
            tracing::debug!("Poll ready after {} attempts", attempt);
            return Ok(PollOutcome::Ready(value));
        }
        if attempt < config.max_attempts {
            tokio::time::sleep(config.interval()).await;
        }
    }

    tracing::warn!("Poll gave up after {} attempts", config.max_attempts);
    Ok(PollOutcome::TimedOut {
        attempts: config.max_attempts,
    })
}
