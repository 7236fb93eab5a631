use std::time::Duration;

use super::subgraph::parse_numeric;
use super::PriceFetchError;

/// Block-scoped spot price feed for one native asset, queried through a
/// fixed proxy endpoint. The upstream worker requires a browser `Origin`
/// header or it rejects the request.
pub struct DirectPriceFeed {
    http: reqwest::Client,
    endpoint: String,
    origin: String,
}

impl DirectPriceFeed {
    pub fn new(endpoint: &str, origin: &str, timeout: Duration) -> Result<Self, PriceFetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PriceFetchError::Http)?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            origin: origin.to_string(),
        })
    }

    /// The BNB Chain feed the original deployment used.
    pub fn pancakeswap(endpoint: &str, timeout: Duration) -> Result<Self, PriceFetchError> {
        Self::new(endpoint, "https://pancakeswap.finance", timeout)
    }

    /// Spot price of the feed's asset at the given block.
    pub async fn spot_price(&self, block_number: u64) -> Result<f64, PriceFetchError> {
        let query = format!(
            " query tokenPriceData {{ bundle (id: \"1\", block: {{number: {}}}) {{ bnbPrice }}}}",
            block_number,
        );
        let body = serde_json::json!({ "query": query });

        let response: serde_json::Value = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ORIGIN, &self.origin)
            .json(&body)
            .send()
            .await
            .map_err(PriceFetchError::Http)?
            .json()
            .await
            .map_err(PriceFetchError::Http)?;

        parse_bundle_response(&response)
    }
}

/// Extract `data.bundle.bnbPrice` from a feed response.
pub(super) fn parse_bundle_response(
    response: &serde_json::Value,
) -> Result<f64, PriceFetchError> {
    response
        .get("data")
        .and_then(|d| d.get("bundle"))
        .and_then(|b| b.get("bnbPrice"))
        .and_then(parse_numeric)
        .ok_or_else(|| {
            PriceFetchError::MalformedResponse("missing data.bundle.bnbPrice".to_string())
        })
}
