//! Ticker Feed Adapters
//!
//! WebSocket subscription to exchange ticker streams:
//!
//! - **Connection**: lifecycle state machine, reconnect backoff, heartbeat
//! - **Ingestion**: payload codec, per-element normalization
//! - **Persistence**: snapshot writer decoupled from the read loop, coalescing per key

pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod reconnect;
pub mod state;
pub mod status;
pub mod writer;

pub use client::{ConnectionManager, FeedConfig, FeedError, FeedHandle};
pub use codec::{CodecError, TickerCodec};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, Liveness};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use state::{ConnectionAction, ConnectionEvent, ConnectionPhase, ConnectionState};
pub use status::FeedStatus;
pub use writer::{QuoteSender, spawn_writer};
