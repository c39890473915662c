//! Reconnection Policy
//!
//! Exponential backoff for feed reconnection. The delay starts at a floor,
//! is multiplied after every failed attempt and is capped at a ceiling; the
//! nominal interval never shrinks until a reset. Optional jitter randomizes
//! each wait around the nominal interval; it is off by default so the
//! sequence is exactly 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt, and after every successful open.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each attempt).
    pub multiplier: f64,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            jitter_factor,
        }
    }

    /// Create configuration from `FeedSettings`.
    #[must_use]
    pub const fn from_feed_settings(settings: &crate::FeedSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: settings.reconnect_jitter,
        }
    }
}

/// Reconnection policy implementing capped exponential backoff.
///
/// Retries are unlimited: a feed is only abandoned by explicit shutdown.
///
/// # Example
///
/// ```rust
/// use ticker_snapshot::infrastructure::feed::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Duration::from_millis(1000));
/// assert_eq!(policy.next_delay(), Duration::from_millis(2000));
///
/// // Simulate successful connection
/// policy.reset();
/// assert_eq!(policy.next_delay(), Duration::from_millis(1000));
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Return the delay to wait now and advance the interval for the next failure.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);

        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled =
            (self.current_delay.as_millis() as f64 * self.config.multiplier.max(1.0)).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let max_millis = self.config.max_delay.as_millis();
        let capped = next_millis
            .min(max_millis)
            .max(self.current_delay.as_millis());
        let capped_u64 = u64::try_from(capped).unwrap_or(u64::MAX);
        self.current_delay = Duration::from_millis(capped_u64);

        delay_with_jitter
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Interval the next failure will wait (before jitter).
    #[must_use]
    pub const fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Failed attempts since the last successful open.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(1000));
        assert_eq!(config.max_delay, Duration::from_millis(30_000));
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
        assert!(config.jitter_factor.abs() < f64::EPSILON);
    }

    #[test]
    fn default_sequence_caps_at_thirty_seconds() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());

        let delays: Vec<u128> = (0..8).map(|_| policy.next_delay().as_millis()).collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000, 30_000]
        );
    }

    #[test]
    fn policy_max_delay_cap() {
        let config = ReconnectConfig::new(
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            4.0,
            0.0,
        );
        let mut policy = ReconnectPolicy::new(config);

        let _ = policy.next_delay();
        assert_eq!(policy.next_delay(), Duration::from_millis(2000));
        assert_eq!(policy.next_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn policy_reset_from_ceiling() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        for _ in 0..10 {
            let _ = policy.next_delay();
        }
        assert_eq!(policy.current_delay(), Duration::from_millis(30_000));
        assert_eq!(policy.attempt_count(), 10);

        policy.reset();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn shrinking_multiplier_never_decreases_interval() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::new(
            Duration::from_millis(1000),
            Duration::from_millis(30_000),
            0.5,
            0.0,
        ));

        let delays: Vec<u128> = (0..4).map(|_| policy.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![1000, 1000, 1000, 1000]);
    }

    #[test]
    fn jitter_comes_from_feed_settings() {
        let settings = crate::FeedSettings {
            reconnect_jitter: 0.25,
            ..crate::FeedSettings::default()
        };
        let config = ReconnectConfig::from_feed_settings(&settings);
        assert!((config.jitter_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn policy_jitter_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                jitter_factor: 0.1,
                ..ReconnectConfig::default()
            });

            let millis = policy.next_delay().as_millis();
            assert!(millis >= 900, "delay {millis}ms is below minimum 900ms");
            assert!(millis <= 1100, "delay {millis}ms is above maximum 1100ms");
        }
    }
}
