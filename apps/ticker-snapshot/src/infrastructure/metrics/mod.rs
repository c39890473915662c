//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: Payloads received, decode failures, rejected tickers
//! - **Store**: Quotes written, coalesced writes and store operation failures
//! - **Connections**: Feed connection state, reconnects and transport errors
//! - **API**: Read API requests by route and status
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::quote::Market;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first call.
///
/// # Errors
///
/// Returns an error if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Ingestion counters
    describe_counter!(
        "ticker_snapshot_payloads_received_total",
        "Total payloads received from ticker feeds"
    );
    describe_counter!(
        "ticker_snapshot_decode_errors_total",
        "Total payloads dropped because they were not valid JSON"
    );
    describe_counter!(
        "ticker_snapshot_quotes_rejected_total",
        "Total ticker elements skipped by validation"
    );

    // Store counters
    describe_counter!(
        "ticker_snapshot_quotes_stored_total",
        "Total quotes written to the snapshot store"
    );
    describe_counter!(
        "ticker_snapshot_store_errors_total",
        "Total snapshot store operation failures"
    );
    describe_counter!(
        "ticker_snapshot_quotes_coalesced_total",
        "Total pending quotes replaced by a newer quote for the same key"
    );

    // Connection metrics
    describe_gauge!(
        "ticker_snapshot_feed_connected",
        "Whether the feed subscription is open (1) or not (0)"
    );
    describe_counter!(
        "ticker_snapshot_websocket_errors_total",
        "Total WebSocket errors by type"
    );
    describe_counter!(
        "ticker_snapshot_reconnects_total",
        "Total WebSocket reconnection attempts"
    );

    // API counters
    describe_counter!(
        "ticker_snapshot_http_requests_total",
        "Total read API requests by route and status"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a payload received from a feed.
pub fn record_payload_received(market: Market) {
    counter!(
        "ticker_snapshot_payloads_received_total",
        "market" => market.as_str()
    )
    .increment(1);
}

/// Record a payload dropped by the codec.
pub fn record_decode_error(market: Market) {
    counter!(
        "ticker_snapshot_decode_errors_total",
        "market" => market.as_str()
    )
    .increment(1);
}

/// Record a ticker element skipped by validation.
pub fn record_quote_rejected(market: Market, reason: &'static str) {
    counter!(
        "ticker_snapshot_quotes_rejected_total",
        "market" => market.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a quote written to the store.
pub fn record_quote_stored(market: Market) {
    counter!(
        "ticker_snapshot_quotes_stored_total",
        "market" => market.as_str()
    )
    .increment(1);
}

/// Record a pending quote replaced before it was written.
pub fn record_quote_coalesced(market: Market) {
    counter!(
        "ticker_snapshot_quotes_coalesced_total",
        "market" => market.as_str()
    )
    .increment(1);
}

/// Record a failed store operation.
pub fn record_store_error(operation: &'static str) {
    counter!(
        "ticker_snapshot_store_errors_total",
        "operation" => operation
    )
    .increment(1);
}

/// Update the connection state gauge for a feed.
pub fn set_feed_connected(market: Market, connected: bool) {
    gauge!(
        "ticker_snapshot_feed_connected",
        "market" => market.as_str()
    )
    .set(if connected { 1.0 } else { 0.0 });
}

/// Record a WebSocket error.
pub fn record_websocket_error(market: Market, error_type: &'static str) {
    counter!(
        "ticker_snapshot_websocket_errors_total",
        "market" => market.as_str(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a WebSocket reconnection attempt.
pub fn record_reconnect(market: Market) {
    counter!(
        "ticker_snapshot_reconnects_total",
        "market" => market.as_str()
    )
    .increment(1);
}

/// Record a read API request.
pub fn record_http_request(route: &'static str, status: u16) {
    counter!(
        "ticker_snapshot_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
