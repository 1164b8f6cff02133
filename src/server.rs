//! HTTP surface over the cached market cap
//!
//! Handlers only read the store; nothing is fetched per request. Failures
//! upstream show up as `ok: false` in the body, never as an HTTP error.

use crate::{
    metrics::{MetricsCollector, RefreshMetrics},
    store::MarketCapStore,
    tracker::MarketCapTracker,
    types::{CacheEntry, HealthSnapshot},
};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MarketCapStore>,
    pub metrics: Arc<MetricsCollector>,
    pub poll_interval_ms: u64,
}

impl AppState {
    /// Read-only view on a tracker's cache and metrics
    pub fn from_tracker(tracker: &MarketCapTracker) -> Self {
        Self {
            store: tracker.store(),
            metrics: tracker.metrics(),
            poll_interval_ms: tracker.poll_interval_ms(),
        }
    }
}

/// GET /api/marketcap - The cached entry, never cached downstream
pub async fn marketcap(State(state): State<AppState>) -> impl IntoResponse {
    let entry = state.store.snapshot().await;
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(CacheEntry::clone(&entry)),
    )
}

/// GET /api/health - Operational snapshot
pub async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    let entry = state.store.snapshot().await;
    Json(HealthSnapshot::from_entry(&entry, state.poll_interval_ms))
}

/// GET /api/metrics - Refresh cycle metrics
pub async fn metrics(State(state): State<AppState>) -> Json<RefreshMetrics> {
    Json(state.metrics.get_metrics().await)
}

/// Builds the router with CORS open to every origin
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/api/marketcap", get(marketcap))
        .route("/api/health", get(health))
        .route("/api/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Cache server listening on http://{}", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceQuote;
    use axum::body::{to_bytes, Body, Bytes};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            store: Arc::new(MarketCapStore::new()),
            metrics: Arc::new(MetricsCollector::new("mock")),
            poll_interval_ms: 5_000,
        }
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let request = Request::builder()
            .uri(path)
            .header(header::ORIGIN, "https://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_marketcap_before_first_refresh() {
        let (status, headers, body) = get_path(router(state()), "/api/marketcap").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["price"], serde_json::Value::Null);
        assert_eq!(json["marketCap"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_failure_is_reported_in_body_with_stale_price() {
        let state = state();
        let at = Utc::now();
        state
            .store
            .record_success(&PriceQuote::new(100.0, 10, "price:bsc"), at)
            .await;
        state.store.record_failure("[price:bsc] HTTP 500 | ", at).await;

        let (status, _, body) = get_path(router(state), "/api/marketcap").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["price"], 100.0);
        assert_eq!(json["marketCap"], 1000.0);
        assert_eq!(json["error"], "[price:bsc] HTTP 500 | ");
        assert_eq!(json["lastSource"], "price:bsc");
        assert_eq!(json["fetchedAt"], at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_repeated_reads_are_identical() {
        let state = state();
        state
            .store
            .record_success(&PriceQuote::new(0.0000123, 1_000_000_000, "price:bsc"), Utc::now())
            .await;
        let app = router(state);

        let (_, _, first) = get_path(app.clone(), "/api/marketcap").await;
        let (_, _, second) = get_path(app.clone(), "/api/marketcap").await;
        let (_, _, third) = get_path(app, "/api/marketcap").await;

        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[tokio::test]
    async fn test_health_projection() {
        let state = state();
        let at = Utc::now();
        state
            .store
            .record_success(&PriceQuote::new(2.0, 5, "multi_price[list_address]:BNB"), at)
            .await;
        state.store.record_failure("boom", at).await;

        let (status, headers, body) = get_path(router(state), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "running": true,
                "fetchedAt": at.timestamp_millis(),
                "ok": false,
                "lastError": "boom",
                "lastSource": "multi_price[list_address]:BNB",
                "pollIntervalMs": 5_000,
            })
        );
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = state();
        state
            .metrics
            .record_refresh(std::time::Duration::from_millis(40), true)
            .await;

        let (status, _, body) = get_path(router(state), "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["providerName"], "mock");
        assert_eq!(json["totalRefreshes"], 1);
        assert_eq!(json["successRate"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _, _) = get_path(router(state()), "/api/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
