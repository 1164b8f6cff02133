//! In-memory store for the cached market cap

use crate::types::{CacheEntry, PriceQuote};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the single cache entry served to HTTP callers
///
/// Readers receive an immutable snapshot; writers replace the whole entry
/// at once, so a reader never observes a half-applied refresh. Only the
/// refresh cycle writes, which is why the write methods are crate-private.
pub struct MarketCapStore {
    entry: RwLock<Arc<CacheEntry>>,
}

impl MarketCapStore {
    /// Creates an empty store (no refresh attempted yet)
    pub fn new() -> Self {
        Self {
            entry: RwLock::new(Arc::new(CacheEntry::default())),
        }
    }

    /// Returns the current entry
    pub async fn snapshot(&self) -> Arc<CacheEntry> {
        self.entry.read().await.clone()
    }

    /// Applies a successful refresh
    pub(crate) async fn record_success(&self, quote: &PriceQuote, at: DateTime<Utc>) {
        let next = Arc::new(CacheEntry::succeeded(quote, at));
        *self.entry.write().await = next;

        tracing::debug!(
            price = quote.price,
            market_cap = quote.market_cap,
            source = %quote.source,
            "Updated cached market cap"
        );
    }

    /// Applies a failed refresh, keeping the last good price
    ///
    /// Returns the entry now being served.
    pub(crate) async fn record_failure(&self, error: &str, at: DateTime<Utc>) -> Arc<CacheEntry> {
        let mut slot = self.entry.write().await;
        let next = Arc::new(slot.failed(error, at));
        *slot = Arc::clone(&next);
        next
    }
}

impl Default for MarketCapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MarketCapStore::new();
        let entry = store.snapshot().await;

        assert!(!entry.ok);
        assert_eq!(entry.price, None);
        assert_eq!(entry.market_cap, None);
        assert_eq!(entry.fetched_at, None);
    }

    #[tokio::test]
    async fn test_failure_keeps_stale_price() {
        let store = MarketCapStore::new();
        let first = Utc::now();
        store
            .record_success(&PriceQuote::new(100.0, 1_000, "price:bsc"), first)
            .await;

        let before = store.snapshot().await;
        assert!(before.ok);
        assert_eq!(before.price, Some(100.0));

        let later = first + chrono::Duration::seconds(5);
        let served = store.record_failure("[price:bsc] HTTP 503 | ", later).await;
        assert!(served.has_price());

        let after = store.snapshot().await;
        assert!(Arc::ptr_eq(&served, &after));
        assert!(!after.ok);
        assert_eq!(after.price, Some(100.0));
        assert_eq!(after.market_cap, Some(100_000.0));
        assert_eq!(after.error.as_deref(), Some("[price:bsc] HTTP 503 | "));
        assert_eq!(after.fetched_at, Some(later));

        // Earlier snapshots are untouched by later writes
        assert!(before.ok);
        assert_eq!(before.error, None);
    }

    #[tokio::test]
    async fn test_snapshots_between_writes_are_shared() {
        let store = MarketCapStore::new();
        store
            .record_success(&PriceQuote::new(1.0, 1, "price:bsc"), Utc::now())
            .await;

        let a = store.snapshot().await;
        let b = store.snapshot().await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
