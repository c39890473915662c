//! Application Services
//!
//! - `SnapshotStore`: write-through accessor for the latest quote per key

use std::sync::Arc;

use crate::application::ports::{KeyValueStore, StoreError};
use crate::domain::quote::{NormalizedQuote, StoreKey};
use crate::infrastructure::metrics;

/// Default `KEYS` pattern used by [`SnapshotStore::list_all`].
pub const DEFAULT_KEY_PATTERN: &str = "*";

/// Latest-quote store over a [`KeyValueStore`].
///
/// Cheap to clone; every clone shares the same backend handle.
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn KeyValueStore>,
    key_pattern: String,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("key_pattern", &self.key_pattern)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Create a store that enumerates every key on `list_all`.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key_pattern(backend, DEFAULT_KEY_PATTERN)
    }

    /// Create a store with a custom `KEYS` pattern for `list_all`.
    #[must_use]
    pub fn with_key_pattern(backend: Arc<dyn KeyValueStore>, pattern: impl Into<String>) -> Self {
        Self {
            backend,
            key_pattern: pattern.into(),
        }
    }

    /// Overwrite the quote stored under `key`.
    ///
    /// Failures are logged and dropped: the next tick for the same key
    /// repairs the value.
    pub async fn set(&self, key: &StoreKey, quote: &NormalizedQuote) {
        let key_text = key.to_string();
        let result = match serde_json::to_string(quote) {
            Ok(value) => self.backend.set(&key_text, value).await,
            Err(e) => Err(StoreError::from(e)),
        };

        match result {
            Ok(()) => metrics::record_quote_stored(key.market()),
            Err(e) => {
                metrics::record_store_error("set");
                tracing::warn!(key = %key_text, error = %e, "Failed to store quote");
            }
        }
    }

    /// Fetch the quote stored under a raw key such as `spot:BTCUSDT`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store fails or the value is not a quote.
    pub async fn get(&self, key: &str) -> Result<Option<NormalizedQuote>, StoreError> {
        let Some(value) = self.backend.get(key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&value)?))
    }

    /// Fetch every stored quote.
    ///
    /// Entries that disappear, fail to load or fail to deserialize are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only when the keys cannot be enumerated.
    pub async fn list_all(&self) -> Result<Vec<NormalizedQuote>, StoreError> {
        let keys = self.backend.keys(&self.key_pattern).await?;
        let mut quotes = Vec::with_capacity(keys.len());

        for key in keys {
            match self.backend.get(&key).await {
                Ok(Some(value)) => match serde_json::from_str::<NormalizedQuote>(&value) {
                    Ok(quote) => quotes.push(quote),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Skipping undecodable snapshot");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    metrics::record_store_error("get");
                    tracing::warn!(key = %key, error = %e, "Skipping unreadable snapshot");
                }
            }
        }

        Ok(quotes)
    }
}
