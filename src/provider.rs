//! Provider abstraction for fetching the token price from external APIs

use crate::{
    error::{FetchError, QueryError},
    types::PriceQuote,
};
use async_trait::async_trait;

/// One candidate upstream request
///
/// A query knows its target, the headers it needs and how to pull a price
/// out of the response. It is immutable once built; the same query can be
/// executed again on every refresh cycle.
#[async_trait]
pub trait PriceQuery: Send + Sync {
    /// Label identifying the endpoint/chain combination, e.g. `price:bsc`
    fn label(&self) -> &str;

    /// Issues the request and extracts a positive, finite price
    async fn execute(&self) -> Result<f64, QueryError>;
}

/// Trait for token price providers
///
/// Implementations resolve a token identifier to a unit price and derive
/// the market cap from the given supply.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Fetches the current price for a token
    ///
    /// # Arguments
    /// * `token` - Contract address of the token
    /// * `supply` - Total supply used to compute the market cap
    ///
    /// # Returns
    /// The first valid quote found, or an error describing every failure
    async fn fetch_price(&self, token: &str, supply: u64) -> Result<PriceQuote, FetchError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
