//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `KeyValueStore`: string key-value service holding the quote snapshots

use async_trait::async_trait;

/// Errors raised by a key-value store or while (de)serializing its values.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed a command.
    #[error("store command failed: {0}")]
    Backend(String),

    /// A value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal key-value operations consumed by the snapshot store.
///
/// Implementations must be safe for concurrent use; atomicity per key is
/// the backend's responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `SET key value`, overwriting any prior value.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// `GET key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// `KEYS pattern`, where `*` matches any run of characters.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}
