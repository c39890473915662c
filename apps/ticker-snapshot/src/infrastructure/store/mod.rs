//! Key-Value Store Adapters
//!
//! Implementations of the `KeyValueStore` port:
//!
//! - **Redis**: shared snapshot store, selected when `REDIS_URL` is set
//! - **In-memory**: process-local fallback and test double

mod memory;
mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;
