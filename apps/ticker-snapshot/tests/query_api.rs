//! Read API Integration Tests
//!
//! Exercises the HTTP router against an in-memory snapshot store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use ticker_snapshot::{
    FeedStatus, HealthState, InMemoryStore, KeyValueStore, Market, NormalizedQuote,
    SnapshotStore, router,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn setup() -> (Router, SnapshotStore, Arc<InMemoryStore>) {
    let backend = Arc::new(InMemoryStore::new());
    let store = SnapshotStore::new(backend.clone());
    let health = Arc::new(HealthState::new(
        "test-0.0.1",
        vec![
            Arc::new(FeedStatus::new(Market::Spot)),
            Arc::new(FeedStatus::new(Market::Futures)),
        ],
    ));
    (router(store.clone(), health), store, backend)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn put(store: &SnapshotStore, quote: &NormalizedQuote) {
    store.set(&quote.store_key(), quote).await;
}

#[tokio::test]
async fn unknown_symbol_is_404() {
    let (app, _, _) = setup();

    let (status, body) = get(app, "/v1/ticker?symbol=UNKNOWN").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "No trade data available"}));
}

#[tokio::test]
async fn stored_quote_is_returned_by_key() {
    let (app, store, _) = setup();
    put(
        &store,
        &NormalizedQuote::new(Market::Spot, "BTCUSDT", dec("100.0"), dec("100.5"), None),
    )
    .await;

    let (status, body) = get(app, "/v1/ticker?symbol=spot:BTCUSDT").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["market"], "spot");
    assert_eq!(body["symbol"], "BTCUSDT");
    assert_eq!(body["bid"], "100.0");
    assert_eq!(body["ask"], "100.5");
    assert_eq!(body["spread"], "0.5");
    assert!(body["spread_percent"].as_str().unwrap().starts_with("0.4975"));
    assert!(body.get("volume").is_none());
}

#[tokio::test]
async fn markets_do_not_collide() {
    let (app, store, _) = setup();
    put(
        &store,
        &NormalizedQuote::new(Market::Spot, "BTCUSDT", dec("1"), dec("2"), None),
    )
    .await;
    put(
        &store,
        &NormalizedQuote::new(Market::Futures, "BTCUSDT", dec("3"), dec("3"), Some(dec("6"))),
    )
    .await;

    let (_, spot) = get(app.clone(), "/v1/ticker?symbol=spot:BTCUSDT").await;
    let (_, futures) = get(app, "/v1/ticker?symbol=futures:BTCUSDT").await;
    assert_eq!(spot["bid"], "1");
    assert_eq!(futures["bid"], "3");
    assert_eq!(futures["volume"], "6");
}

#[tokio::test]
async fn list_returns_every_quote_and_skips_corrupt_entries() {
    let (app, store, backend) = setup();
    put(
        &store,
        &NormalizedQuote::new(Market::Spot, "BTCUSDT", dec("1"), dec("2"), None),
    )
    .await;
    put(
        &store,
        &NormalizedQuote::new(Market::Futures, "ETHUSDT", dec("3"), dec("3"), None),
    )
    .await;
    backend
        .set("spot:BROKEN", "not a quote".to_string())
        .await
        .unwrap();

    let (status, body) = get(app, "/v1/tickers").await;
    assert_eq!(status, StatusCode::OK);

    let mut keys: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|q| format!("{}:{}", q["market"].as_str().unwrap(), q["symbol"].as_str().unwrap()))
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["futures:ETHUSDT", "spot:BTCUSDT"]);
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let (app, _, _) = setup();

    let (status, body) = get(app, "/v1/tickers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn health_reports_unhealthy_without_open_feeds() {
    let (app, _, _) = setup();

    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["version"], "test-0.0.1");
    assert_eq!(body["feeds"].as_array().unwrap().len(), 2);
    assert_eq!(body["feeds"][0]["state"], "idle");
}
