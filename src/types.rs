//! Types for the market cap cache

use crate::error::{FetchError, QueryFailure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the hex part of a BEP-20 / EVM contract address
const ADDRESS_HEX_LEN: usize = 40;

/// A validated BEP-20 contract address (`0x` + 40 hex digits)
///
/// Mixed-case (checksum) spellings are accepted and kept as given, since
/// the upstream API accepts either.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    /// Validates `raw` against the address format
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let trimmed = raw.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| FetchError::invalid_address(raw, "missing 0x prefix"))?;

        if hex.len() != ADDRESS_HEX_LEN {
            return Err(FetchError::invalid_address(
                raw,
                format!(
                    "expected {} hex digits after 0x, found {}",
                    ADDRESS_HEX_LEN,
                    hex.len()
                ),
            ));
        }

        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(FetchError::invalid_address(
                raw,
                format!("non-hex character {:?}", bad),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the address as given
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TokenAddress {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successful price lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Unit price in USD
    pub price: f64,

    /// `price * supply`
    pub market_cap: f64,

    /// Label of the query that produced the price
    pub source: String,
}

impl PriceQuote {
    /// Derives the market cap from a unit price and total supply
    pub fn new(price: f64, supply: u64, source: impl Into<String>) -> Self {
        Self {
            price,
            market_cap: price * supply as f64,
            source: source.into(),
        }
    }
}

/// Outcome of executing one candidate query
#[derive(Debug, Clone, PartialEq)]
pub enum FetchAttempt {
    Success { price: f64, source: String },
    Failure(QueryFailure),
}

/// The cached result of the most recent refresh
///
/// Serialized as-is by `GET /api/marketcap`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Whether the most recent refresh succeeded
    pub ok: bool,

    /// Last successfully observed unit price
    pub price: Option<f64>,

    /// `price * supply`, recomputed only on success
    pub market_cap: Option<f64>,

    /// Time of the most recent refresh attempt, success or failure
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub fetched_at: Option<DateTime<Utc>>,

    /// Diagnostic from the most recent failed refresh
    pub error: Option<String>,

    /// Label of the query that produced the current price
    pub last_source: Option<String>,
}

impl CacheEntry {
    /// Entry after a successful refresh; replaces every field
    pub fn succeeded(quote: &PriceQuote, at: DateTime<Utc>) -> Self {
        Self {
            ok: true,
            price: Some(quote.price),
            market_cap: Some(quote.market_cap),
            fetched_at: Some(at),
            error: None,
            last_source: Some(quote.source.clone()),
        }
    }

    /// Entry after a failed refresh
    ///
    /// The last good price, market cap and source are carried over so
    /// readers keep getting stale data instead of nothing.
    pub fn failed(&self, error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            fetched_at: Some(at),
            ..self.clone()
        }
    }

    /// Returns true if a price has ever been observed
    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

/// Operational snapshot served by `GET /api/health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub running: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub ok: bool,
    pub last_error: Option<String>,
    pub last_source: Option<String>,
    /// Refresh period, for clients that display a countdown
    pub poll_interval_ms: u64,
}

impl HealthSnapshot {
    /// Projects a cache entry into a health snapshot
    pub fn from_entry(entry: &CacheEntry, poll_interval_ms: u64) -> Self {
        Self {
            running: true,
            fetched_at: entry.fetched_at,
            ok: entry.ok,
            last_error: entry.error.clone(),
            last_source: entry.last_source.clone(),
            poll_interval_ms,
        }
    }
}
