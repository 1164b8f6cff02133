//! # Market Cap Cache
//!
//! A small price-caching proxy for a single BEP-20 token. A background task
//! polls the Birdeye price API on a fixed period, keeps the latest result in
//! memory and serves it over HTTP as JSON.
//!
//! ## Architecture
//!
//! ```text
//! MarketCapTracker (background task, every 5s)
//!     ↓
//! BirdeyeProvider → FailoverRunner → [price:bsc, multi_price[..]:bsc, price:BNB, ...]
//!     ↓
//! MarketCapStore (single writer, whole-entry snapshots)
//!     ↓
//! axum router: /api/marketcap, /api/health, /api/metrics
//! ```
//!
//! ## Staleness
//!
//! A failed refresh never clears the cached price. The entry flips to
//! `ok: false` with the aggregated error, and the last good price and
//! market cap keep being served until the next successful refresh.
//!
//! ## Usage
//!
//! ```no_run
//! use marketcap_cache::{
//!     server, AppState, BirdeyeProvider, BirdeyeSettings, MarketCapTracker, TrackerSettings,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = BirdeyeProvider::new(BirdeyeSettings::new("api-key"))?;
//! let tracker = Arc::new(MarketCapTracker::new(Arc::new(provider), TrackerSettings::default()));
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! tracker.start_background_task(shutdown_rx);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3001").await?;
//! let app = server::router(AppState::from_tracker(&tracker));
//! server::serve(listener, app, async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     let _ = shutdown_tx.send(true);
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod server;
pub mod store;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, FetchError, QueryError, QueryFailure};
pub use metrics::RefreshMetrics;
pub use provider::{PriceProvider, PriceQuery};
pub use providers::{BirdeyeProvider, BirdeyeSettings, FailoverRunner};
pub use server::AppState;
pub use store::MarketCapStore;
pub use tracker::{MarketCapTracker, RefreshOutcome, TrackerSettings};
pub use types::{CacheEntry, FetchAttempt, HealthSnapshot, PriceQuote, TokenAddress};
