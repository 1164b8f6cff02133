//! Constants for the market cap cache
//!
//! Compile-time defaults are centralized here. Every value that an operator
//! may want to change is also exposed on the command line (see `config`),
//! with these constants as the defaults.

/// Default token contract (BEP-20) whose price is tracked
pub const DEFAULT_TOKEN_ADDRESS: &str = "0x60445b34c6834e1b775c4bd8789d7cbf5adf4444";

/// Default total supply, in whole tokens
pub const DEFAULT_SUPPLY: u64 = 1_000_000_000;

/// How often to refresh the cached price (in milliseconds)
///
/// The front end shows a countdown synchronized to this value.
pub const POLL_INTERVAL_MS: u64 = 5_000;

/// HTTP request timeout for a single upstream candidate (in milliseconds)
pub const REQUEST_TIMEOUT_MS: u64 = 4_000;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 3001;

/// Default HTTP listen host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Birdeye public API base URL
pub const BIRDEYE_API_URL: &str = "https://public-api.birdeye.so";

/// Birdeye single price endpoint
pub const BIRDEYE_PRICE_ENDPOINT: &str = "/defi/price";

/// Birdeye batch price endpoint
pub const BIRDEYE_MULTI_PRICE_ENDPOINT: &str = "/defi/multi_price";

/// Chain spellings accepted by Birdeye for BNB Smart Chain, most reliable first
pub const DEFAULT_CHAINS: &[&str] = &["bsc", "BNB"];

/// Header carrying the Birdeye API key
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Header carrying the chain identifier
pub const CHAIN_HEADER: &str = "x-chain";

/// Maximum number of body characters kept in a diagnostic message
pub const MAX_DIAGNOSTIC_BODY_CHARS: usize = 512;

/// Number of refresh cycles kept for latency percentiles
pub const METRICS_WINDOW: usize = 100;

/// User agent for HTTP requests
pub const USER_AGENT: &str = concat!("marketcap-cache/", env!("CARGO_PKG_VERSION"));
