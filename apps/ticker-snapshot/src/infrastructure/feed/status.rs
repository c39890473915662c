//! Feed Status
//!
//! Read-only mirror of a connection's lifecycle, published by the owning
//! connection task for health reporting. Only the owning task writes it.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use super::state::ConnectionPhase;
use crate::domain::quote::Market;

/// Status counters and phase for one feed.
#[derive(Debug)]
pub struct FeedStatus {
    market: Market,
    phase: parking_lot::RwLock<ConnectionPhase>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    reconnect_attempts: AtomicU32,
    messages_received: AtomicU64,
    quotes_normalized: AtomicU64,
}

impl FeedStatus {
    /// New status for a feed that has not started.
    #[must_use]
    pub const fn new(market: Market) -> Self {
        Self {
            market,
            phase: parking_lot::RwLock::new(ConnectionPhase::Idle),
            last_connected_at: parking_lot::RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            messages_received: AtomicU64::new(0),
            quotes_normalized: AtomicU64::new(0),
        }
    }

    /// Publish the current phase.
    pub fn set_phase(&self, phase: ConnectionPhase) {
        *self.phase.write() = phase;
        if phase == ConnectionPhase::Open {
            *self.last_connected_at.write() = Some(Utc::now());
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Increment reconnect attempts.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment messages received counter.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment normalized quote counter.
    pub fn increment_quotes(&self) {
        self.quotes_normalized.fetch_add(1, Ordering::Relaxed);
    }

    /// Market of the feed.
    #[must_use]
    pub const fn market(&self) -> Market {
        self.market
    }

    /// Get the current phase.
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.read()
    }

    /// Whether the subscription is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.phase() == ConnectionPhase::Open
    }

    /// Time of the last successful open.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Payloads received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Quotes normalized and handed to the writer.
    #[must_use]
    pub fn quotes_normalized(&self) -> u64 {
        self.quotes_normalized.load(Ordering::Relaxed)
    }
}
