//! Read API
//!
//! HTTP access to the latest stored quotes, served on the same listener as
//! the health routes.
//!
//! # Endpoints
//!
//! - `GET /v1/tickers` - Every stored quote as a JSON array
//! - `GET /v1/ticker?symbol=<market:symbol>` - One stored quote

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::SnapshotStore;
use crate::infrastructure::health::{self, HealthState};
use crate::infrastructure::metrics;

const NOT_FOUND_MESSAGE: &str = "No trade data available";
const FAILURE_MESSAGE: &str = "Failed to fetch trade data";

/// Error body returned by the read API.
#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[derive(Debug, Deserialize)]
struct TickerQuery {
    symbol: Option<String>,
}

fn error_response(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrorBody { error })).into_response()
}

/// Build the complete router: `/v1` read routes plus health routes.
pub fn router(store: SnapshotStore, health: Arc<HealthState>) -> Router {
    let v1 = Router::new()
        .route("/tickers", get(list_tickers))
        .route("/ticker", get(get_ticker))
        .with_state(store);

    Router::new()
        .nest("/v1", v1)
        .merge(health::routes(health))
}

async fn list_tickers(State(store): State<SnapshotStore>) -> Response {
    match store.list_all().await {
        Ok(quotes) => {
            metrics::record_http_request("/v1/tickers", 200);
            Json(quotes).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to list quotes");
            metrics::record_http_request("/v1/tickers", 404);
            error_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
        }
    }
}

async fn get_ticker(
    State(store): State<SnapshotStore>,
    Query(query): Query<TickerQuery>,
) -> Response {
    let Some(symbol) = query.symbol.filter(|s| !s.is_empty()) else {
        metrics::record_http_request("/v1/ticker", 404);
        return error_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE);
    };

    match store.get(&symbol).await {
        Ok(Some(quote)) => {
            metrics::record_http_request("/v1/ticker", 200);
            Json(quote).into_response()
        }
        Ok(None) => {
            metrics::record_http_request("/v1/ticker", 404);
            error_response(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
        }
        Err(e) => {
            tracing::error!(symbol = %symbol, error = %e, "Failed to fetch quote");
            metrics::record_http_request("/v1/ticker", 500);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE)
        }
    }
}

// =============================================================================
// Query Server
// =============================================================================

/// HTTP server for the read API and health routes.
pub struct QueryServer {
    port: u16,
    router: Router,
    cancel: CancellationToken,
}

impl QueryServer {
    /// Create a new server.
    #[must_use]
    pub fn new(
        port: u16,
        store: SnapshotStore,
        health: Arc<HealthState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            router: router(store, health),
            cancel,
        }
    }

    /// Bind the port and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `QueryServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), QueryServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| QueryServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Query server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| QueryServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Query server stopped");
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Query server errors.
#[derive(Debug, thiserror::Error)]
pub enum QueryServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{MockKeyValueStore, StoreError};

    fn app_with(mock: MockKeyValueStore) -> Router {
        router(
            SnapshotStore::new(Arc::new(mock)),
            Arc::new(HealthState::new("test", Vec::new())),
        )
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn store_failure_on_get_is_500() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .returning(|_| Err(StoreError::Unavailable("down".into())));

        let (status, body) = call(app_with(mock), "/v1/ticker?symbol=spot:BTCUSDT").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn missing_symbol_is_404_without_store_access() {
        let mock = MockKeyValueStore::new();

        let (status, body) = call(app_with(mock), "/v1/ticker").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn enumeration_failure_on_list_is_404() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_keys()
            .returning(|_| Err(StoreError::Backend("KEYS disabled".into())));

        let (status, body) = call(app_with(mock), "/v1/tickers").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], NOT_FOUND_MESSAGE);
    }
}
