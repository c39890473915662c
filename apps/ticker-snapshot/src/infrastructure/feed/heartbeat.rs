//! Heartbeat
//!
//! Liveness bookkeeping for an open feed connection. A probe (WebSocket ping)
//! is due every `ping_interval`; if no inbound frame has been seen since the
//! previous probe when the next one is due, the connection is considered
//! silently dead.
//!
//! The state is owned by the connection task and never shared, so it needs
//! no synchronization.

use std::time::{Duration, Instant};

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between probes.
    pub ping_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with a custom probe interval.
    #[must_use]
    pub const fn new(ping_interval: Duration) -> Self {
        Self { ping_interval }
    }

    /// Create configuration from `FeedSettings`.
    #[must_use]
    pub const fn from_feed_settings(settings: &crate::FeedSettings) -> Self {
        Self {
            ping_interval: settings.heartbeat_interval,
        }
    }
}

/// Outcome of a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a probe now.
    SendPing,
    /// The previous probe went unanswered; the connection should be restarted.
    Timeout {
        /// Time since the last observed activity.
        idle: Duration,
    },
}

/// Per-connection liveness state.
#[derive(Debug, Clone)]
pub struct Liveness {
    last_activity: Instant,
    last_probe: Option<Instant>,
}

impl Liveness {
    /// Fresh state for a connection opened at `now`.
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            last_activity: now,
            last_probe: None,
        }
    }

    /// Record any inbound frame.
    pub fn record_activity(&mut self, now: Instant) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Reset for a newly opened connection.
    pub const fn reset(&mut self, now: Instant) {
        self.last_activity = now;
        self.last_probe = None;
    }

    /// Last time activity was observed.
    #[must_use]
    pub const fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether a probe is outstanding with no activity since it was sent.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.last_probe
            .is_some_and(|probe| self.last_activity < probe)
    }

    /// Evaluate the heartbeat timer firing at `now`.
    ///
    /// Marks a new probe as sent when the connection is still considered alive.
    pub fn on_tick(&mut self, now: Instant) -> HeartbeatEvent {
        if self.is_waiting_for_pong() {
            return HeartbeatEvent::Timeout {
                idle: now.saturating_duration_since(self.last_activity),
            };
        }
        self.last_probe = Some(now);
        HeartbeatEvent::SendPing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(30);

    #[test]
    fn default_config_values() {
        assert_eq!(HeartbeatConfig::default().ping_interval, PERIOD);
    }

    #[test]
    fn first_tick_sends_probe() {
        let start = Instant::now();
        let mut liveness = Liveness::new(start);

        assert_eq!(liveness.on_tick(start + PERIOD), HeartbeatEvent::SendPing);
        assert!(liveness.is_waiting_for_pong());
    }

    #[test]
    fn activity_after_probe_keeps_connection_alive() {
        let start = Instant::now();
        let mut liveness = Liveness::new(start);

        assert_eq!(liveness.on_tick(start + PERIOD), HeartbeatEvent::SendPing);
        liveness.record_activity(start + PERIOD + Duration::from_millis(40));
        assert!(!liveness.is_waiting_for_pong());

        assert_eq!(liveness.on_tick(start + PERIOD * 2), HeartbeatEvent::SendPing);
    }

    #[test]
    fn unanswered_probe_times_out() {
        let start = Instant::now();
        let mut liveness = Liveness::new(start);
        liveness.record_activity(start + Duration::from_secs(5));

        assert_eq!(liveness.on_tick(start + PERIOD), HeartbeatEvent::SendPing);
        assert_eq!(
            liveness.on_tick(start + PERIOD * 2),
            HeartbeatEvent::Timeout {
                idle: Duration::from_secs(55)
            }
        );
    }

    #[test]
    fn reset_clears_outstanding_probe() {
        let start = Instant::now();
        let mut liveness = Liveness::new(start);
        let _ = liveness.on_tick(start + PERIOD);
        assert!(liveness.is_waiting_for_pong());

        liveness.reset(start + PERIOD * 2);
        assert!(!liveness.is_waiting_for_pong());
        assert_eq!(liveness.last_activity(), start + PERIOD * 2);
    }

    #[test]
    fn stale_activity_does_not_move_backwards() {
        let start = Instant::now();
        let mut liveness = Liveness::new(start + PERIOD);
        liveness.record_activity(start);
        assert_eq!(liveness.last_activity(), start + PERIOD);
    }
}
