//! Error types for the market cap cache

use std::time::Duration;
use thiserror::Error;

/// Errors produced by a single upstream price query
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// Upstream answered with a non-success HTTP status
    #[error("HTTP {status} | {body}")]
    UpstreamHttp { status: u16, body: String },

    /// Response body could not be read as JSON
    #[error("Parse error: {0}")]
    MalformedBody(String),

    /// Response parsed but carried no usable price
    #[error("Invalid price in response {0}")]
    InvalidPrice(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    /// Classifies a transport error, attributing timeouts to `timeout`
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(flatten(&err.to_string()))
        }
    }
}

/// A failed candidate, labeled with the query that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFailure {
    /// Label of the query, e.g. `price:bsc`
    pub source: String,
    /// What went wrong
    pub error: QueryError,
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.source, self.error)
    }
}

/// Errors that can occur when fetching the token price
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// Token identifier does not look like a contract address
    #[error("Invalid address format {address:?}: {reason}")]
    InvalidAddressFormat { address: String, reason: String },

    /// Every candidate query failed; one line per candidate, in attempt order
    #[error("{}", join_failures(.0))]
    AllSourcesFailed(Vec<QueryFailure>),

    /// No candidate queries were configured
    #[error("No price queries configured")]
    NoCandidates,
}

impl FetchError {
    /// Creates an InvalidAddressFormat error
    pub fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddressFormat {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns the per-candidate failures, if any
    pub fn failures(&self) -> &[QueryFailure] {
        match self {
            Self::AllSourcesFailed(failures) => failures,
            _ => &[],
        }
    }
}

/// Errors in runtime configuration values
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("Invalid base URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

fn join_failures(failures: &[QueryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapses line breaks so a diagnostic always occupies one line
pub(crate) fn flatten(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
