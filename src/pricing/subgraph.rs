use std::time::Duration;

use alloy::primitives::Address;

use super::PriceFetchError;

/// Client for the Uniswap V2 subgraph's token-day price series.
pub struct SubgraphClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SubgraphClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PriceFetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PriceFetchError::Http)?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    /// Most recent USD price recorded at or before `as_of` for the token,
    /// or `None` when the series has no matching record.
    pub async fn token_day_price(
        &self,
        token: Address,
        as_of: i64,
    ) -> Result<Option<f64>, PriceFetchError> {
        let query = format!(
            "query GetTokenDayDatas {{ tokenDayDatas (first: 1, where: {{token: \"{}\", date_lte: {}}}, orderBy: date, orderDirection: desc ) {{ priceUSD }} }}",
            token.to_string().to_lowercase(),
            as_of,
        );

        let body = serde_json::json!({ "query": query });
        let response: serde_json::Value = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(PriceFetchError::Http)?
            .json()
            .await
            .map_err(PriceFetchError::Http)?;

        parse_token_day_response(&response)
    }
}

/// Extract `data.tokenDayDatas[0].priceUSD` from a subgraph response.
pub(super) fn parse_token_day_response(
    response: &serde_json::Value,
) -> Result<Option<f64>, PriceFetchError> {
    let records = response
        .get("data")
        .and_then(|d| d.get("tokenDayDatas"))
        .and_then(|t| t.as_array())
        .ok_or_else(|| {
            PriceFetchError::MalformedResponse("missing data.tokenDayDatas".to_string())
        })?;

    let first = match records.first() {
        Some(r) => r,
        None => return Ok(None),
    };

    let price = first
        .get("priceUSD")
        .and_then(parse_numeric)
        .ok_or_else(|| PriceFetchError::MalformedResponse("unparseable priceUSD".to_string()))?;

    Ok(Some(price))
}

/// Subgraph responses carry numbers as strings; accept either form.
pub(super) fn parse_numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
