//! Birdeye price provider implementation
//!
//! Birdeye has historically accepted both `bsc` and `BNB` for BNB Smart
//! Chain and has exposed the price through a single-address endpoint as well
//! as a batch endpoint whose address parameter name changed over time. The
//! provider tries every (chain, endpoint) combination in order until one
//! returns a usable price.

use crate::{
    constants::{
        API_KEY_HEADER, BIRDEYE_API_URL, BIRDEYE_MULTI_PRICE_ENDPOINT, BIRDEYE_PRICE_ENDPOINT,
        CHAIN_HEADER, DEFAULT_CHAINS, MAX_DIAGNOSTIC_BODY_CHARS, REQUEST_TIMEOUT_MS, USER_AGENT,
    },
    error::{flatten, ConfigError, FetchError, QueryError},
    provider::{PriceProvider, PriceQuery},
    providers::failover::FailoverRunner,
    types::{PriceQuote, TokenAddress},
};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Name of the query parameter carrying addresses on the batch endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchParam {
    ListAddress,
    Addresses,
}

impl BatchParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchParam::ListAddress => "list_address",
            BatchParam::Addresses => "addresses",
        }
    }
}

/// Birdeye endpoint variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `/defi/price`, answers `{ data: { value } }`
    Price,
    /// `/defi/multi_price`, answers `{ data: { <address>: { value } } }`
    MultiPrice(BatchParam),
}

impl Endpoint {
    /// Endpoints in the order they are tried, most reliable first
    pub const ALL: &'static [Endpoint] = &[
        Endpoint::Price,
        Endpoint::MultiPrice(BatchParam::ListAddress),
        Endpoint::MultiPrice(BatchParam::Addresses),
    ];

    fn path(&self) -> &'static str {
        match self {
            Endpoint::Price => BIRDEYE_PRICE_ENDPOINT,
            Endpoint::MultiPrice(_) => BIRDEYE_MULTI_PRICE_ENDPOINT,
        }
    }

    /// Label of this endpoint on a given chain, e.g. `multi_price[addresses]:BNB`
    pub fn label(&self, chain: &str) -> String {
        match self {
            Endpoint::Price => format!("price:{}", chain),
            Endpoint::MultiPrice(param) => format!("multi_price[{}]:{}", param.as_str(), chain),
        }
    }

    /// Builds the request URL for this endpoint
    fn url(&self, base: &Url, address: &TokenAddress, chain: &str) -> Url {
        let mut url = base.clone();
        let path = format!("{}{}", base.path().trim_end_matches('/'), self.path());
        url.set_path(&path);

        {
            let mut query = url.query_pairs_mut();
            match self {
                Endpoint::Price => {
                    query
                        .append_pair("address", address.as_str())
                        .append_pair("chain", chain)
                        .append_pair("include_liquidity", "true");
                }
                Endpoint::MultiPrice(param) => {
                    query
                        .append_pair("chain", chain)
                        .append_pair(param.as_str(), address.as_str());
                }
            }
        }

        url
    }

    /// Pulls the price out of a parsed response body
    pub fn extract(&self, payload: &Value, address: &TokenAddress) -> Result<f64, QueryError> {
        let raw = match self {
            Endpoint::Price => payload.pointer("/data/value"),
            Endpoint::MultiPrice(_) => payload
                .get("data")
                .and_then(Value::as_object)
                .and_then(|entries| {
                    entries
                        .iter()
                        .find(|(key, _)| key.eq_ignore_ascii_case(address.as_str()))
                        // first entry in response order
                        .or_else(|| entries.iter().next())
                })
                .and_then(|(_, entry)| entry.get("value")),
        };

        raw.and_then(parse_price)
            .ok_or_else(|| QueryError::InvalidPrice(excerpt(&payload.to_string())))
    }
}

/// Accepts JSON numbers and numeric strings that are finite and positive
fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    (price.is_finite() && price > 0.0).then_some(price)
}

/// Flattens and truncates an upstream body for use in a diagnostic
fn excerpt(body: &str) -> String {
    let flat = flatten(body);
    if flat.chars().count() <= MAX_DIAGNOSTIC_BODY_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_DIAGNOSTIC_BODY_CHARS).collect();
    cut.push('…');
    cut
}

/// Classifies a raw response into a JSON payload or a query error
pub(crate) fn classify_response(
    status: StatusCode,
    content_type: &str,
    body: &str,
) -> Result<Value, QueryError> {
    if !status.is_success() {
        return Err(QueryError::UpstreamHttp {
            status: status.as_u16(),
            body: excerpt(body),
        });
    }

    if !content_type.contains("json") {
        return Err(QueryError::MalformedBody(format!(
            "unexpected content type {:?} | {}",
            content_type,
            excerpt(body)
        )));
    }

    serde_json::from_str(body)
        .map_err(|e| QueryError::MalformedBody(format!("{} | {}", e, excerpt(body))))
}

/// One (endpoint, chain) candidate against the Birdeye API
pub struct BirdeyeQuery {
    client: Client,
    url: Url,
    headers: Vec<(&'static str, String)>,
    endpoint: Endpoint,
    address: TokenAddress,
    label: String,
    timeout: Duration,
}

#[cfg(test)]
impl BirdeyeQuery {
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

#[async_trait]
impl PriceQuery for BirdeyeQuery {
    fn label(&self) -> &str {
        &self.label
    }

    async fn execute(&self) -> Result<f64, QueryError> {
        tracing::trace!(source = %self.label, url = %self.url, "Querying Birdeye");

        let mut request = self.client.get(self.url.clone()).timeout(self.timeout);
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueryError::from_transport(e, self.timeout))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::from_transport(e, self.timeout))?;

        let payload = classify_response(status, &content_type, &body)?;
        self.endpoint.extract(&payload, &self.address)
    }
}

/// Settings for the Birdeye provider
#[derive(Debug, Clone)]
pub struct BirdeyeSettings {
    pub api_key: String,
    pub base_url: String,
    pub chains: Vec<String>,
    pub request_timeout: Duration,
}

impl BirdeyeSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BIRDEYE_API_URL.to_string(),
            chains: DEFAULT_CHAINS.iter().map(|c| c.to_string()).collect(),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
        }
    }
}

/// Birdeye price provider
pub struct BirdeyeProvider {
    client: Client,
    base_url: Url,
    api_key: String,
    chains: Vec<String>,
    endpoints: Vec<Endpoint>,
    request_timeout: Duration,
}

impl BirdeyeProvider {
    /// Creates a new Birdeye provider
    pub fn new(settings: BirdeyeSettings) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| ConfigError::InvalidUrl {
            url: settings.base_url.clone(),
            reason: e.to_string(),
        })?;

        if settings.chains.is_empty() {
            return Err(ConfigError::Empty { name: "chains" });
        }

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key,
            chains: settings.chains,
            endpoints: Endpoint::ALL.to_vec(),
            request_timeout: settings.request_timeout,
        })
    }

    /// Restricts the provider to a subset of endpoints, in the given order
    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Builds the ordered candidate list for an address
    pub fn candidates(&self, address: &TokenAddress) -> Vec<BirdeyeQuery> {
        let mut queries = Vec::with_capacity(self.chains.len() * self.endpoints.len());

        for chain in &self.chains {
            for endpoint in &self.endpoints {
                queries.push(BirdeyeQuery {
                    client: self.client.clone(),
                    url: endpoint.url(&self.base_url, address, chain),
                    headers: vec![
                        (API_KEY_HEADER, self.api_key.clone()),
                        ("accept", "application/json".to_string()),
                        (CHAIN_HEADER, chain.clone()),
                    ],
                    endpoint: *endpoint,
                    address: address.clone(),
                    label: endpoint.label(chain),
                    timeout: self.request_timeout,
                });
            }
        }

        queries
    }
}

#[async_trait]
impl PriceProvider for BirdeyeProvider {
    async fn fetch_price(&self, token: &str, supply: u64) -> Result<PriceQuote, FetchError> {
        let address = TokenAddress::parse(token)?;

        let queries = self
            .candidates(&address)
            .into_iter()
            .map(|q| Arc::new(q) as Arc<dyn PriceQuery>)
            .collect();

        let (price, source) = FailoverRunner::new(queries).run().await?;
        Ok(PriceQuote::new(price, supply, source))
    }

    fn provider_name(&self) -> &'static str {
        "birdeye"
    }
}
