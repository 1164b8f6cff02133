//! Sequential failover over candidate price queries

use crate::{
    error::{FetchError, QueryFailure},
    provider::PriceQuery,
    types::FetchAttempt,
};
use std::sync::Arc;
use std::time::Instant;

/// Runs candidate queries one at a time until one yields a price
///
/// Candidates are tried strictly in the order they are provided and never
/// concurrently. The first success wins and the remaining candidates are
/// not executed.
pub struct FailoverRunner {
    queries: Vec<Arc<dyn PriceQuery>>,
}

impl FailoverRunner {
    /// Creates a new runner over an ordered list of queries
    pub fn new(queries: Vec<Arc<dyn PriceQuery>>) -> Self {
        Self { queries }
    }

    /// Labels of the configured queries, in attempt order
    pub fn labels(&self) -> Vec<&str> {
        self.queries.iter().map(|q| q.label()).collect()
    }

    /// Executes a single query and labels its outcome
    pub async fn attempt(query: &dyn PriceQuery) -> FetchAttempt {
        let start = Instant::now();
        match query.execute().await {
            Ok(price) => {
                tracing::debug!(
                    source = query.label(),
                    price,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Price query succeeded"
                );
                FetchAttempt::Success {
                    price,
                    source: query.label().to_string(),
                }
            }
            Err(error) => {
                tracing::debug!(
                    source = query.label(),
                    error = %error,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Price query failed"
                );
                FetchAttempt::Failure(QueryFailure {
                    source: query.label().to_string(),
                    error,
                })
            }
        }
    }

    /// Tries every query in order
    ///
    /// # Returns
    /// The winning price and its source label, or `AllSourcesFailed`
    /// carrying every failure in attempt order
    pub async fn run(&self) -> Result<(f64, String), FetchError> {
        if self.queries.is_empty() {
            return Err(FetchError::NoCandidates);
        }

        tracing::trace!(candidates = ?self.labels(), "Trying price candidates");
        let mut failures = Vec::with_capacity(self.queries.len());

        for query in &self.queries {
            match Self::attempt(query.as_ref()).await {
                FetchAttempt::Success { price, source } => {
                    if !failures.is_empty() {
                        tracing::info!(
                            source = %source,
                            failed_candidates = failures.len(),
                            "Price found after failover"
                        );
                    }
                    return Ok((price, source));
                }
                FetchAttempt::Failure(failure) => failures.push(failure),
            }
        }

        Err(FetchError::AllSourcesFailed(failures))
    }
}
