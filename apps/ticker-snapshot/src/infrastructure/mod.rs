//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Ticker feed WebSocket connection management.
pub mod feed;

/// Key-value store adapters (Redis, in-memory).
pub mod store;

/// HTTP read API.
pub mod api;

/// Configuration loading.
pub mod config;

/// Health check HTTP routes.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
