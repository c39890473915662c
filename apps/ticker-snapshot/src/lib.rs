#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Ticker Snapshot - Latest Quote Per Instrument
//!
//! Keeps one WebSocket subscription per market (spot, futures) to an
//! exchange's all-market ticker stream, normalizes every ticker into a
//! compact quote and overwrites the latest quote per instrument in a
//! key-value store. A small HTTP API reads the snapshots back.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Wire events, normalized quotes and normalization rules
//!   - `ticker`: Raw ticker events as received
//!   - `quote`: Markets, store keys, quotes, the normalizer
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Key-value store interface
//!   - `services`: Snapshot store
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: WebSocket connection manager, codec, heartbeat, backoff
//!   - `store`: Redis and in-memory key-value stores
//!   - `api`: HTTP read API
//!   - `config`: Configuration loading
//!   - `health`: Health, readiness and metrics routes
//!
//! # Data Flow
//!
//! ```text
//! spot WS ────► ConnectionManager ──► SnapshotWriter ──┐
//!                                                      ├──► KeyValueStore ◄── Read API
//! futures WS ─► ConnectionManager ──► SnapshotWriter ──┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Ticker and quote types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{
    Market, NormalizedQuote, QuoteMapping, QuoteNormalizer, StoreKey, ValidationError,
};
pub use domain::ticker::RawTickerEvent;

// Ports and services
pub use application::ports::{KeyValueStore, StoreError};
pub use application::services::SnapshotStore;

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, FeedEndpoint, FeedSettings, ServerSettings, ServiceConfig, StoreSettings,
};

// Feed connections
pub use infrastructure::feed::{
    ConnectionManager, ConnectionPhase, FeedConfig, FeedError, FeedHandle, FeedStatus,
    HeartbeatConfig, ReconnectConfig,
};

// Stores
pub use infrastructure::store::{InMemoryStore, RedisStore};

// HTTP
pub use infrastructure::api::{QueryServer, QueryServerError, router};
pub use infrastructure::health::HealthState;

// Metrics
pub use infrastructure::metrics::init_metrics;
