//! Price oracle resolution.
//!
//! Resolution strategy is keyed by chain id: chains with a registered
//! direct feed get a block-scoped spot price, every other chain goes
//! through the subgraph's token-day series. Price unavailability is never
//! fatal: any failure yields a quote of 0, which callers must treat as
//! "not priced" rather than "free".

mod feed;
mod subgraph;

use std::collections::HashMap;

use alloy::primitives::Address;
use async_trait::async_trait;
use thiserror::Error;

pub use feed::DirectPriceFeed;
pub use subgraph::SubgraphClient;

use crate::types::config::EndpointConfig;

/// The BNB Chain uses the direct feed in the default deployment.
pub const BNB_CHAIN_ID: u64 = 56;

#[derive(Debug, Error)]
pub enum PriceFetchError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Subgraph,
    DirectFeed,
}

/// A resolved USD price. `usd_price == 0.0` means the price could not be
/// determined.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub token: Address,
    pub as_of: i64,
    pub usd_price: f64,
    pub source: PriceSource,
}

impl PriceQuote {
    pub fn unpriced(token: Address, as_of: i64, source: PriceSource) -> Self {
        Self {
            token,
            as_of,
            usd_price: 0.0,
            source,
        }
    }
}

/// Oracle seam the fee calculator and transfer correlator resolve prices
/// through; infallible by contract (failures become 0-quotes).
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn resolve(
        &self,
        chain_id: u64,
        token: Address,
        as_of: i64,
        as_of_block: u64,
    ) -> PriceQuote;
}

/// Production resolver: direct feeds for the chains that have one,
/// subgraph for the rest. Additional direct-feed chains are registered
/// with [`PriceResolver::with_direct_feed`] without touching callers.
pub struct PriceResolver {
    subgraph: SubgraphClient,
    direct_feeds: HashMap<u64, DirectPriceFeed>,
}

impl PriceResolver {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, PriceFetchError> {
        let subgraph = SubgraphClient::new(&endpoints.subgraph_url, endpoints.http_timeout)?;
        let bnb_feed = DirectPriceFeed::pancakeswap(&endpoints.bnb_feed_url, endpoints.http_timeout)?;

        let mut direct_feeds = HashMap::new();
        direct_feeds.insert(BNB_CHAIN_ID, bnb_feed);

        Ok(Self {
            subgraph,
            direct_feeds,
        })
    }

    /// Register a direct feed for another chain.
    pub fn with_direct_feed(mut self, chain_id: u64, feed: DirectPriceFeed) -> Self {
        self.direct_feeds.insert(chain_id, feed);
        self
    }

    /// Which strategy a chain id dispatches to.
    pub fn strategy(&self, chain_id: u64) -> PriceSource {
        if self.direct_feeds.contains_key(&chain_id) {
            PriceSource::DirectFeed
        } else {
            PriceSource::Subgraph
        }
    }
}

#[async_trait]
impl PriceOracle for PriceResolver {
    async fn resolve(
        &self,
        chain_id: u64,
        token: Address,
        as_of: i64,
        as_of_block: u64,
    ) -> PriceQuote {
        if let Some(feed) = self.direct_feeds.get(&chain_id) {
            return match feed.spot_price(as_of_block).await {
                Ok(price) => PriceQuote {
                    token,
                    as_of,
                    usd_price: price,
                    source: PriceSource::DirectFeed,
                },
                Err(e) => {
                    tracing::warn!(
                        "Direct feed price lookup failed for chain {} at block {}: {}",
                        chain_id,
                        as_of_block,
                        e
                    );
                    PriceQuote::unpriced(token, as_of, PriceSource::DirectFeed)
                }
            };
        }

        match self.subgraph.token_day_price(token, as_of).await {
            Ok(Some(price)) => PriceQuote {
                token,
                as_of,
                usd_price: price,
                source: PriceSource::Subgraph,
            },
            Ok(None) => {
                tracing::warn!(
                    "No subgraph price record for token {} at or before {}",
                    token,
                    as_of
                );
                PriceQuote::unpriced(token, as_of, PriceSource::Subgraph)
            }
            Err(e) => {
                tracing::warn!(
                    "Subgraph price lookup failed for token {} at {}: {}",
                    token,
                    as_of,
                    e
                );
                PriceQuote::unpriced(token, as_of, PriceSource::Subgraph)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn resolver() -> PriceResolver {
        PriceResolver::new(&EndpointConfig::default()).unwrap()
    }

    #[test]
    fn bnb_chain_dispatches_to_direct_feed() {
        let resolver = resolver();
        assert_eq!(resolver.strategy(BNB_CHAIN_ID), PriceSource::DirectFeed);
        for chain_id in [1, 10, 100, 137, 42161] {
            assert_eq!(resolver.strategy(chain_id), PriceSource::Subgraph);
        }
    }

    #[test]
    fn direct_feeds_are_extensible_per_chain() {
        let feed =
            DirectPriceFeed::pancakeswap("https://feed.example", Duration::from_secs(5)).unwrap();
        let resolver = resolver().with_direct_feed(137, feed);
        assert_eq!(resolver.strategy(137), PriceSource::DirectFeed);
        assert_eq!(resolver.strategy(1), PriceSource::Subgraph);
    }

    #[test]
    fn unpriced_quote_is_zero() {
        let quote = PriceQuote::unpriced(Address::ZERO, 1675662056, PriceSource::Subgraph);
        assert_eq!(quote.usd_price, 0.0);
    }
}
