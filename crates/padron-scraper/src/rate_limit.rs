//! Randomized inter-request pacing.
//!
//! Every network request issued by the orchestrator — including retries
//! after a resolved challenge — is preceded by one [`RateLimiter::wait`]
//! call. The delay is drawn uniformly from a fixed range; there is
//! deliberately no burst allowance and no adaptive backoff, which keeps the
//! request cadence under the portals' informal rate thresholds.

use std::time::Duration;

use rand::Rng;

pub struct RateLimiter {
    min_secs: f64,
    max_secs: f64,
}

impl RateLimiter {
    /// Creates a limiter drawing uniformly from `[min_secs, max_secs]`.
    /// Callers validate `0 <= min_secs <= max_secs` beforehand.
    #[must_use]
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        RateLimiter { min_secs, max_secs }
    }

    /// Draws one delay from the configured range without sleeping.
    #[must_use]
    pub fn sample_delay(&self) -> Duration {
        let secs = rand::rng().random_range(self.min_secs..=self.max_secs);
        Duration::from_secs_f64(secs)
    }

    /// Blocks the calling task for one sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample_delay();
        tracing::trace!(delay_ms = delay.as_millis() as u64, "inter-request delay");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_within_bounds_and_mean_is_centered() {
        let limiter = RateLimiter::new(4.0, 7.0);
        let n = 1000;
        let mut total = 0.0_f64;
        for _ in 0..n {
            let secs = limiter.sample_delay().as_secs_f64();
            assert!((4.0..=7.0).contains(&secs), "sample {secs} out of [4,7]");
            total += secs;
        }
        let mean = total / f64::from(n);
        // Uniform over [4,7] has mean 5.5; allow 5%.
        assert!(
            (mean - 5.5).abs() <= 5.5 * 0.05,
            "mean {mean} deviates more than 5% from 5.5"
        );
    }

    #[test]
    fn degenerate_range_is_deterministic() {
        let limiter = RateLimiter::new(2.0, 2.0);
        assert!((limiter.sample_delay().as_secs_f64() - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_at_least_the_minimum() {
        let limiter = RateLimiter::new(1.0, 2.0);
        let before = tokio::time::Instant::now();
        limiter.wait().await;
        let elapsed = before.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "slept {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(2) + Duration::from_millis(10));
    }
}
