//! Health Check and Metrics Endpoint
//!
//! HTTP routes for health checks, feed status reporting, and Prometheus metrics.
//! Used by container orchestrators, load balancers, and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks feed connections)
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::quote::Market;
use crate::infrastructure::feed::FeedStatus;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Per-feed status.
    pub feeds: Vec<FeedInfo>,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every feed is open.
    Healthy,
    /// Some feeds are open.
    Degraded,
    /// No feed is open.
    Unhealthy,
}

/// Individual feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Market of the feed.
    pub market: Market,
    /// Connection phase.
    pub state: &'static str,
    /// Whether the subscription is open.
    pub connected: bool,
    /// Payloads received.
    pub messages_received: u64,
    /// Quotes normalized.
    pub quotes_normalized: u64,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Time of the last successful open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl From<&FeedStatus> for FeedInfo {
    fn from(status: &FeedStatus) -> Self {
        Self {
            market: status.market(),
            state: status.phase().as_str(),
            connected: status.is_open(),
            messages_received: status.messages_received(),
            quotes_normalized: status.quotes_normalized(),
            reconnect_attempts: status.reconnect_attempts(),
            last_connected_at: status.last_connected_at(),
        }
    }
}

// =============================================================================
// Health State
// =============================================================================

/// Shared state for the health routes.
pub struct HealthState {
    version: String,
    started_at: Instant,
    feeds: Vec<Arc<FeedStatus>>,
}

impl HealthState {
    /// Create health state over the given feed status mirrors.
    #[must_use]
    pub fn new(version: impl Into<String>, feeds: Vec<Arc<FeedStatus>>) -> Self {
        Self {
            version: version.into(),
            started_at: Instant::now(),
            feeds,
        }
    }

    /// Snapshot the current health.
    #[must_use]
    pub fn report(&self) -> HealthResponse {
        let feeds: Vec<FeedInfo> = self.feeds.iter().map(|s| FeedInfo::from(s.as_ref())).collect();

        HealthResponse {
            status: determine_health_status(&feeds),
            version: self.version.clone(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            current_time: Utc::now(),
            feeds,
        }
    }
}

/// Build the health and metrics routes.
pub fn routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let response = state.report();
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    if state.feeds.iter().any(|feed| feed.is_open()) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn determine_health_status(feeds: &[FeedInfo]) -> HealthStatus {
    let connected = feeds.iter().filter(|f| f.connected).count();

    match connected {
        0 => HealthStatus::Unhealthy,
        n if n == feeds.len() => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::infrastructure::feed::ConnectionPhase;

    fn statuses(open: &[bool]) -> Vec<Arc<FeedStatus>> {
        open.iter()
            .zip(Market::all().iter().cycle())
            .map(|(&is_open, &market)| {
                let status = FeedStatus::new(market);
                if is_open {
                    status.set_phase(ConnectionPhase::Open);
                }
                Arc::new(status)
            })
            .collect()
    }

    fn infos(open: &[bool]) -> Vec<FeedInfo> {
        statuses(open).iter().map(|s| FeedInfo::from(s.as_ref())).collect()
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn determine_status_by_open_feeds() {
        assert_eq!(determine_health_status(&infos(&[true, true])), HealthStatus::Healthy);
        assert_eq!(determine_health_status(&infos(&[true, false])), HealthStatus::Degraded);
        assert_eq!(determine_health_status(&infos(&[false, false])), HealthStatus::Unhealthy);
        assert_eq!(determine_health_status(&[]), HealthStatus::Unhealthy);
    }

    #[test]
    fn feed_info_mirrors_status() {
        let info = &infos(&[true])[0];
        assert_eq!(info.market, Market::Spot);
        assert_eq!(info.state, "open");
        assert!(info.connected);
        assert!(info.last_connected_at.is_some());
    }

    #[tokio::test]
    async fn readiness_follows_feed_phase() {
        let feeds = statuses(&[false, false]);
        let app = routes(Arc::new(HealthState::new("test", feeds.clone())));

        let request = || Request::get("/readyz").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        feeds[1].set_phase(ConnectionPhase::Open);
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let app = routes(Arc::new(HealthState::new("test", Vec::new())));
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
