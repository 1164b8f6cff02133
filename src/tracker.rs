//! Market cap tracker service
//!
//! Owns the refresh loop: polls the price provider on a fixed period and
//! writes the outcome into the [`MarketCapStore`].

use crate::{
    constants::{DEFAULT_SUPPLY, DEFAULT_TOKEN_ADDRESS, POLL_INTERVAL_MS},
    error::FetchError,
    metrics::{MetricsCollector, RefreshMetrics},
    provider::PriceProvider,
    store::MarketCapStore,
    types::{CacheEntry, HealthSnapshot, PriceQuote},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// What the tracker polls and how often
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Contract address of the token
    pub token: String,
    /// Total supply used for the market cap
    pub supply: u64,
    /// Refresh period
    pub poll_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN_ADDRESS.to_string(),
            supply: DEFAULT_SUPPLY,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
        }
    }
}

/// Result of one refresh cycle
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The cache now holds this quote
    Updated(PriceQuote),
    /// The fetch failed; the cache keeps its last good price
    Failed(FetchError),
    /// Another cycle was still running, nothing was done
    Skipped,
}

/// Market Cap Tracker
///
/// The only writer of the cache. HTTP handlers get read access through
/// [`MarketCapTracker::store`].
///
/// # Example
/// ```no_run
/// use marketcap_cache::{BirdeyeProvider, BirdeyeSettings, MarketCapTracker, TrackerSettings};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = BirdeyeProvider::new(BirdeyeSettings::new("api-key"))?;
/// let tracker = Arc::new(MarketCapTracker::new(Arc::new(provider), TrackerSettings::default()));
///
/// let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
/// tracker.start_background_task(shutdown_rx);
///
/// let entry = tracker.snapshot().await;
/// println!("market cap: {:?}", entry.market_cap);
/// # Ok(())
/// # }
/// ```
pub struct MarketCapTracker {
    store: Arc<MarketCapStore>,
    provider: Arc<dyn PriceProvider>,
    metrics: Arc<MetricsCollector>,
    settings: TrackerSettings,
    cycle: Mutex<()>,
}

impl MarketCapTracker {
    /// Creates a new tracker around a provider
    pub fn new(provider: Arc<dyn PriceProvider>, settings: TrackerSettings) -> Self {
        let metrics = Arc::new(MetricsCollector::new(provider.provider_name()));

        Self {
            store: Arc::new(MarketCapStore::new()),
            provider,
            metrics,
            settings,
            cycle: Mutex::new(()),
        }
    }

    /// Starts the background polling task
    ///
    /// The first cycle runs immediately. Ticks that fall due while a cycle
    /// is still running are dropped rather than queued, and each dropped
    /// tick is counted as a skipped refresh. The task exits once `shutdown`
    /// turns true or its sender is dropped.
    pub fn start_background_task(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let tracker = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!(
                token = %tracker.settings.token,
                supply = tracker.settings.supply,
                poll_interval_ms = tracker.settings.poll_interval.as_millis() as u64,
                provider = tracker.provider_name(),
                "Starting market cap tracker background task"
            );

            let mut ticker = interval(tracker.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        tracker.refresh_now().await;

                        let missed = tracker.ticks_missed(started.elapsed());
                        if missed > 0 {
                            tracing::debug!(missed, "Refresh overran the poll interval, dropping ticks");
                            tracker.metrics.record_skips(missed).await;
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("Market cap tracker shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Number of ticks a cycle of length `busy` causes the interval to drop
    ///
    /// Every period that elapsed during the cycle is a tick that fell due.
    /// The first of them still fires once the cycle ends, the rest are
    /// skipped.
    fn ticks_missed(&self, busy: Duration) -> u64 {
        let period = self.settings.poll_interval.as_nanos();
        if period == 0 {
            return 0;
        }
        (busy.as_nanos() / period).saturating_sub(1) as u64
    }

    /// Runs one refresh cycle immediately
    ///
    /// Never fails: fetch errors are logged and folded into the cache entry.
    /// Returns `Skipped` if another cycle is in flight.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        let Ok(_cycle) = self.cycle.try_lock() else {
            tracing::debug!("Previous refresh still running, skipping this one");
            self.metrics.record_skip().await;
            return RefreshOutcome::Skipped;
        };

        let start = Instant::now();
        let result = self
            .provider
            .fetch_price(&self.settings.token, self.settings.supply)
            .await;
        let elapsed = start.elapsed();
        let at = Utc::now();

        match result {
            Ok(quote) => {
                self.store.record_success(&quote, at).await;
                self.metrics.record_refresh(elapsed, true).await;
                tracing::debug!(
                    source = %quote.source,
                    price = quote.price,
                    market_cap = quote.market_cap,
                    latency_ms = elapsed.as_millis() as u64,
                    "Refreshed market cap"
                );
                RefreshOutcome::Updated(quote)
            }
            Err(e) => {
                let message = e.to_string();
                let entry = self.store.record_failure(&message, at).await;
                self.metrics.record_refresh(elapsed, false).await;
                tracing::warn!(
                    provider = self.provider_name(),
                    serving_stale = entry.has_price(),
                    latency_ms = elapsed.as_millis() as u64,
                    error = %message,
                    "Failed to refresh market cap"
                );
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Read handle on the cache
    pub fn store(&self) -> Arc<MarketCapStore> {
        Arc::clone(&self.store)
    }

    /// Metrics handle
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Current cache entry
    pub async fn snapshot(&self) -> Arc<CacheEntry> {
        self.store.snapshot().await
    }

    /// Operational snapshot of the tracker
    pub async fn health(&self) -> HealthSnapshot {
        let entry = self.snapshot().await;
        HealthSnapshot::from_entry(&entry, self.poll_interval_ms())
    }

    /// Gets refresh metrics including latency percentiles and success rate
    pub async fn get_refresh_metrics(&self) -> RefreshMetrics {
        self.metrics.get_metrics().await
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.settings.poll_interval.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QueryError, QueryFailure};
    use crate::provider::mock::MockProvider;
    use crate::providers::{BirdeyeProvider, BirdeyeSettings};
    use tokio::sync::Notify;

    fn settings() -> TrackerSettings {
        TrackerSettings {
            supply: 1_000_000_000,
            ..TrackerSettings::default()
        }
    }

    fn upstream_down() -> FetchError {
        FetchError::AllSourcesFailed(vec![QueryFailure {
            source: "price:bsc".to_string(),
            error: QueryError::UpstreamHttp {
                status: 503,
                body: "maintenance".to_string(),
            },
        }])
    }

    #[tokio::test]
    async fn test_refresh_updates_then_serves_stale_on_failure() {
        let provider = Arc::new(MockProvider::new());
        provider.push_price(100.0, "price:bsc");
        provider.push_error(upstream_down());
        let tracker = MarketCapTracker::new(provider.clone(), settings());

        let outcome = tracker.refresh_now().await;
        assert!(matches!(outcome, RefreshOutcome::Updated(ref q) if q.price == 100.0));
        let good = tracker.snapshot().await;
        assert!(good.ok);
        assert_eq!(good.market_cap, Some(100.0 * 1_000_000_000.0));

        let outcome = tracker.refresh_now().await;
        assert_eq!(outcome, RefreshOutcome::Failed(upstream_down()));

        let stale = tracker.snapshot().await;
        assert!(!stale.ok);
        assert_eq!(stale.price, Some(100.0));
        assert_eq!(stale.market_cap, good.market_cap);
        assert_eq!(
            stale.error.as_deref(),
            Some("[price:bsc] HTTP 503 | maintenance")
        );
        assert!(stale.fetched_at >= good.fetched_at);
        assert_eq!(provider.call_count(), 2);

        let metrics = tracker.get_refresh_metrics().await;
        assert_eq!(metrics.provider_name, "mock");
        assert_eq!(metrics.total_refreshes, 2);
        assert_eq!(metrics.failed_refreshes, 1);
    }

    #[tokio::test]
    async fn test_invalid_address_fails_the_cycle_only() {
        let provider = BirdeyeProvider::new(BirdeyeSettings::new("key")).unwrap();
        let tracker = MarketCapTracker::new(
            Arc::new(provider),
            TrackerSettings {
                token: "not-an-address".to_string(),
                ..settings()
            },
        );

        let outcome = tracker.refresh_now().await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(FetchError::InvalidAddressFormat { .. })
        ));

        let entry = tracker.snapshot().await;
        assert!(!entry.ok);
        assert_eq!(entry.price, None);
        assert!(entry.fetched_at.is_some());
        assert!(entry
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("Invalid address format"));
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(MockProvider::gated(gate.clone()));
        provider.push_price(1.0, "price:bsc");
        let tracker = Arc::new(MarketCapTracker::new(provider.clone(), settings()));

        let first = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.refresh_now().await }
        });

        while provider.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(tracker.refresh_now().await, RefreshOutcome::Skipped);

        gate.notify_one();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Updated(_)));
        assert_eq!(provider.call_count(), 1);
        assert_eq!(tracker.get_refresh_metrics().await.skipped_refreshes, 1);
    }

    #[test]
    fn test_ticks_missed() {
        let tracker = MarketCapTracker::new(
            Arc::new(MockProvider::new()),
            TrackerSettings {
                poll_interval: Duration::from_millis(10),
                ..settings()
            },
        );

        assert_eq!(tracker.ticks_missed(Duration::from_millis(3)), 0);
        assert_eq!(tracker.ticks_missed(Duration::from_millis(15)), 0);
        assert_eq!(tracker.ticks_missed(Duration::from_millis(25)), 1);
        assert_eq!(tracker.ticks_missed(Duration::from_millis(200)), 19);
    }

    #[tokio::test]
    async fn test_slow_cycle_counts_dropped_ticks() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(MockProvider::gated(gate.clone()));
        provider.push_price(1.0, "price:bsc");
        let tracker = Arc::new(MarketCapTracker::new(
            provider.clone(),
            TrackerSettings {
                poll_interval: Duration::from_millis(10),
                ..settings()
            },
        ));

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tracker.start_background_task(shutdown_rx);

        while provider.call_count() == 0 {
            tokio::task::yield_now().await;
        }

        // Hold the first cycle across ~20 periods
        tokio::time::sleep(Duration::from_millis(200)).await;
        gate.notify_one();

        tokio::time::timeout(Duration::from_secs(5), async {
            while provider.call_count() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tracker should start the next cycle");

        let metrics = tracker.get_refresh_metrics().await;
        assert_eq!(metrics.total_refreshes, 1);
        assert!(
            metrics.skipped_refreshes >= 10,
            "expected dropped ticks to be counted, got {}",
            metrics.skipped_refreshes
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_background_task_polls_until_shutdown() {
        let provider = Arc::new(MockProvider::new());
        provider.push_price(2.0, "price:bsc");
        let tracker = Arc::new(MarketCapTracker::new(
            provider.clone(),
            TrackerSettings {
                poll_interval: Duration::from_millis(10),
                ..settings()
            },
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tracker.start_background_task(shutdown_rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while provider.call_count() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tracker should poll repeatedly");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("tracker should stop")
            .unwrap();

        let health = tracker.health().await;
        assert!(health.running);
        assert!(health.ok);
        assert_eq!(health.last_source.as_deref(), Some("price:bsc"));
        assert_eq!(health.poll_interval_ms, 10);
    }
}
