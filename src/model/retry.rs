//! Retry policies for chat completions.
//!
//! Two independent policies are used:
//!
//! - [`RetryPolicy`] bounds the number of attempts made by
//!   [`ChatClient::try_chat_completion`](super::ChatClient::try_chat_completion)
//!   for any kind of failure, waiting `initial_retry_delay * 2^attempt` between tries.
//! - [`RateLimitPolicy`] is applied inside a single backend call and only retries
//!   errors whose description matches one of its throttling markers, within both an
//!   attempt budget and a wall-clock budget.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::client::ChatError;
use crate::logging::{API_CALLS, ERROR_ICON, WAIT_ICON};

/// Default number of attempts for a chat completion.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay before the first retry.
pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Error-description substrings that identify provider throttling.
pub const DEFAULT_RATE_LIMIT_MARKERS: &[&str] = &["AFC is enabled", "RESOURCE_EXHAUSTED"];

/// Outer retry policy applied to every chat completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Values below 1 are treated as 1.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on every following retry.
    pub initial_retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_retry_delay: DEFAULT_INITIAL_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_retry_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_retry_delay,
        }
    }

    /// Set the total number of attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay before the first retry.
    pub fn with_initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    /// Number of attempts that will actually be made.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Delay to wait after the failed attempt with the given zero-based index.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        exponential(self.initial_retry_delay, attempt_index)
    }
}

/// Inner retry policy for provider-signalled throttling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum number of calls, including the first one.
    pub max_tries: u32,
    /// Wall-clock budget for the whole retry sequence.
    pub max_time: Duration,
    /// Fixed pause taken as soon as a throttling error is observed.
    pub cooldown: Duration,
    /// Base of the exponential backoff between tries.
    pub base_delay: Duration,
    /// Substrings that mark an error as throttling.
    pub markers: Vec<String>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_tries: 5,
            max_time: Duration::from_secs(300),
            cooldown: Duration::from_secs(5),
            base_delay: Duration::from_secs(1),
            markers: DEFAULT_RATE_LIMIT_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl RateLimitPolicy {
    /// Replace the throttling markers.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the fixed pause taken after a throttling error.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the attempt budget.
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Set the base of the exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the wall-clock budget.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = max_time;
        self
    }

    /// Whether an error description signals throttling.
    pub fn is_rate_limited(&self, description: &str) -> bool {
        self.markers.iter().any(|m| description.contains(m.as_str()))
    }

    /// Backoff after the throttled try with the given zero-based index.
    pub fn backoff_for(&self, attempt_index: u32) -> Duration {
        exponential(self.base_delay, attempt_index)
    }
}

fn exponential(base: Duration, attempt_index: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Run `op`, retrying only throttling errors as described by `policy`.
///
/// Errors that do not match a marker are returned immediately. When the attempt or
/// time budget runs out the last throttling error is returned.
pub async fn retry_rate_limited<T, F, Fut>(policy: &RateLimitPolicy, mut op: F) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChatError>>,
{
    let started = Instant::now();
    let max_tries = policy.max_tries.max(1);
    let mut tries = 0;

    loop {
        tries += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let description = err.to_string();
        if !policy.is_rate_limited(&description) {
            tracing::error!(target: API_CALLS, "{} API call failed: {}", ERROR_ICON, description);
            return Err(err);
        }

        tracing::warn!(
            target: API_CALLS,
            "{} Rate limit hit, waiting before retry... error: {}",
            ERROR_ICON,
            description
        );
        sleep(policy.cooldown).await;

        if tries >= max_tries {
            tracing::error!(
                target: API_CALLS,
                "{} Rate limit retries exhausted after {} tries",
                ERROR_ICON,
                tries
            );
            return Err(err);
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.max_time {
            tracing::error!(
                target: API_CALLS,
                "{} Rate limit retry budget of {:?} exhausted",
                ERROR_ICON,
                policy.max_time
            );
            return Err(err);
        }

        let wait = policy
            .backoff_for(tries - 1)
            .min(policy.max_time - elapsed);
        tracing::info!(
            target: API_CALLS,
            "{} Backing off {:?} before rate-limited try {}/{}",
            WAIT_ICON,
            wait,
            tries + 1,
            max_tries
        );
        sleep(wait).await;
    }
}
