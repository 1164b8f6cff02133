//! Refresh cycle metrics collection and reporting
//!
//! Tracks latency percentiles and success rates for refresh cycles.

use crate::constants::METRICS_WINDOW;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of refresh cycle metrics, served by `GET /api/metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshMetrics {
    /// Name of the provider being polled
    pub provider_name: String,
    /// 50th percentile latency of successful cycles in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful cycles in milliseconds
    pub latency_p99_ms: f64,
    /// Success rate (0.0 to 1.0)
    pub success_rate: f64,
    /// Total number of completed cycles
    pub total_refreshes: u64,
    /// Number of failed cycles
    pub failed_refreshes: u64,
    /// Cycles skipped because the previous one was still running
    pub skipped_refreshes: u64,
}

impl RefreshMetrics {
    /// Creates metrics with no data
    pub fn empty(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_refreshes: 0,
            failed_refreshes: 0,
            skipped_refreshes: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<LatencySample>,
    total: u64,
    failed: u64,
    skipped: u64,
}

/// Collects and computes metrics for refresh cycles
pub struct MetricsCollector {
    provider_name: String,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    /// Creates a new metrics collector for a provider
    pub fn new(provider_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            counters: RwLock::new(Counters {
                samples: VecDeque::with_capacity(METRICS_WINDOW),
                ..Counters::default()
            }),
        }
    }

    /// Records a completed cycle with its duration and outcome
    pub async fn record_refresh(&self, duration: Duration, success: bool) {
        let mut counters = self.counters.write().await;
        counters.total += 1;
        if !success {
            counters.failed += 1;
        }

        if counters.samples.len() >= METRICS_WINDOW {
            counters.samples.pop_front();
        }
        counters.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success,
        });
    }

    /// Records a cycle that did not run because another was in flight
    pub async fn record_skip(&self) {
        self.record_skips(1).await;
    }

    /// Records several skipped cycles at once
    pub async fn record_skips(&self, count: u64) {
        self.counters.write().await.skipped += count;
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> RefreshMetrics {
        let counters = self.counters.read().await;

        let mut metrics = RefreshMetrics::empty(&self.provider_name);
        metrics.skipped_refreshes = counters.skipped;
        if counters.samples.is_empty() {
            return metrics;
        }

        let mut latencies: Vec<f64> = counters
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        metrics.latency_p50_ms = percentile(&latencies, 50.0);
        metrics.latency_p99_ms = percentile(&latencies, 99.0);
        metrics.success_rate = (counters.total - counters.failed) as f64 / counters.total as f64;
        metrics.total_refreshes = counters.total;
        metrics.failed_refreshes = counters.failed;
        metrics
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}
