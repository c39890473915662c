//! Connection State Machine
//!
//! Lifecycle of one feed subscription as a pure transition function.
//! [`ConnectionState::apply`] updates the phase, backoff and liveness state
//! and returns the single side effect the connection task must perform.
//!
//! ```text
//!   Idle ──Start──► Connecting ──Opened──► Open
//!                     ▲    │                 │
//!          WaitElapsed│    │Failed     Failed│
//!                     │    ▼                 │
//!                   ReconnectWait ◄──────────┘
//!
//!   any ──Stop──► Shutdown (terminal)
//! ```

use std::time::{Duration, Instant};

use super::heartbeat::Liveness;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};

/// Lifecycle phase of a feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// Created, not started.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Subscription open; heartbeat armed.
    Open,
    /// Waiting out the backoff interval before reconnecting.
    ReconnectWait,
    /// Stopped. Terminal.
    Shutdown,
}

impl ConnectionPhase {
    /// Phase name for logs and health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ReconnectWait => "reconnect_wait",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// `start()` was called.
    Start,
    /// Handshake succeeded.
    Opened,
    /// Handshake failed, transport error, remote close or heartbeat timeout.
    Failed,
    /// The backoff interval elapsed.
    WaitElapsed,
    /// `stop()` was called.
    Stop,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new socket.
    Connect,
    /// Start the heartbeat timer on the open socket.
    ArmHeartbeat,
    /// Sleep for the given interval, then report `WaitElapsed`.
    Wait(Duration),
    /// Cancel timers and close the socket, if any.
    Close,
    /// Nothing to do; the event does not apply in the current phase.
    Ignore,
}

/// State owned by one connection task.
#[derive(Debug)]
pub struct ConnectionState {
    phase: ConnectionPhase,
    backoff: ReconnectPolicy,
    liveness: Liveness,
}

impl ConnectionState {
    /// New state in `Idle`.
    #[must_use]
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            backoff: ReconnectPolicy::new(reconnect),
            liveness: Liveness::new(Instant::now()),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Backoff interval the next failure will wait.
    #[must_use]
    pub const fn backoff_interval(&self) -> Duration {
        self.backoff.current_delay()
    }

    /// Consecutive failed attempts since the last successful open.
    #[must_use]
    pub const fn failed_attempts(&self) -> u32 {
        self.backoff.attempt_count()
    }

    /// Mutable liveness state, for recording activity and heartbeat ticks.
    pub const fn liveness_mut(&mut self) -> &mut Liveness {
        &mut self.liveness
    }

    /// Apply an event at `now` and return the side effect to perform.
    pub fn apply(&mut self, event: ConnectionEvent, now: Instant) -> ConnectionAction {
        use ConnectionAction as A;
        use ConnectionEvent as E;
        use ConnectionPhase as P;

        match (self.phase, event) {
            (P::Shutdown, _) => A::Ignore,
            (_, E::Stop) => {
                self.phase = P::Shutdown;
                A::Close
            }
            (P::Idle, E::Start) | (P::ReconnectWait, E::WaitElapsed) => {
                self.phase = P::Connecting;
                A::Connect
            }
            (P::Connecting, E::Opened) => {
                self.phase = P::Open;
                self.backoff.reset();
                self.liveness.reset(now);
                A::ArmHeartbeat
            }
            (P::Connecting | P::Open, E::Failed) => {
                self.phase = P::ReconnectWait;
                A::Wait(self.backoff.next_delay())
            }
            _ => A::Ignore,
        }
    }
}
