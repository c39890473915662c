//! Domain Layer - Core ticker types and normalization rules.
//!
//! This layer contains the wire-independent quote model and the pure
//! normalization logic. Nothing here performs I/O.

/// Normalized quotes, markets and store keys.
pub mod quote;

/// Raw ticker events as received from a feed.
pub mod ticker;
