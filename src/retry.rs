use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use std::time::Duration;

/// Bounded-attempt retry policy shared by the classifier and summarizer.
/// No hidden global retry state: callers own the loop and the policy only
/// hands out delays.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Fresh exponential backoff for one retry loop. Jitter comes from the
    /// backoff crate's randomization factor.
    pub fn backoff(&self) -> ExponentialBackoff<backoff::SystemClock> {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Sleep before the next attempt. `attempt` is the 1-based attempt that
    /// just failed; no sleep after the final attempt.
    pub async fn wait(
        &self,
        backoff: &mut ExponentialBackoff<backoff::SystemClock>,
        attempt: u32,
    ) {
        if attempt >= self.max_attempts {
            return;
        }
        if let Some(delay) = backoff.next_backoff() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_toward_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        let mut backoff = policy.backoff();
        let mut last = Duration::ZERO;
        for _ in 0..6 {
            let delay = backoff.next_backoff().expect("no elapsed-time cutoff");
            assert!(delay <= Duration::from_millis(600)); // cap + jitter margin
            last = delay;
        }
        assert!(last >= Duration::from_millis(200));
    }
}
