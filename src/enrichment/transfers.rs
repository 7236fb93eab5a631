use std::sync::Arc;

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::fees::to_usd_string;
use crate::decoding::EventTrace;
use crate::pricing::PriceOracle;
use crate::types::config::{ChainRegistry, EndpointConfig};

/// Interface and event whose presence in a trace marks the row as the
/// destination leg of a cross-chain transfer.
const TRIGGER_INTERFACE: &str = "connext";
const TRIGGER_EVENT: &str = "Executed";

#[derive(Debug, Error)]
pub enum CorrelationError {
    /// Correlation was triggered but the index has no record for the
    /// execute hash. The correlator requires exactly one record.
    #[error("No transfer index record for execute transaction {0}")]
    TransferNotFound(B256),

    #[error("Transfer index names origin chain {0}, which is not in the chain registry")]
    UnknownOriginChain(u64),

    #[error("Transfer index record for {tx_hash} has unparseable relayer fee {value:?}")]
    MalformedRelayerFee { tx_hash: B256, value: String },

    #[error("Transfer index error: {0}")]
    Index(String),
}

/// Origin-side metadata for one executed transfer, as returned by the
/// transfer index.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRecord {
    pub origin_chain: u64,
    pub xcall_block_number: u64,
    pub xcall_timestamp: i64,
    /// Relayer fee in origin-chain native wei units, as a decimal string.
    pub relayer_fee: String,
}

/// Lookup seam over the external transfer index.
#[async_trait]
pub trait TransferIndex: Send + Sync {
    async fn lookup(&self, execute_tx_hash: B256) -> Result<TransferRecord, CorrelationError>;
}

/// HTTP client for the transfer index service (PostgREST-style filter on
/// the execute transaction hash).
pub struct TransferIndexClient {
    http: reqwest::Client,
    base_url: String,
}

impl TransferIndexClient {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self, CorrelationError> {
        let http = reqwest::Client::builder()
            .timeout(endpoints.http_timeout)
            .build()
            .map_err(|e| CorrelationError::Index(e.to_string()))?;
        Ok(Self {
            http,
            base_url: endpoints.transfer_index_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TransferIndex for TransferIndexClient {
    async fn lookup(&self, execute_tx_hash: B256) -> Result<TransferRecord, CorrelationError> {
        let url = format!(
            "{}/transfers?execute_transaction_hash=eq.{:?}",
            self.base_url, execute_tx_hash
        );

        let records: Vec<TransferRecord> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CorrelationError::Index(e.to_string()))?
            .json()
            .await
            .map_err(|e| CorrelationError::Index(e.to_string()))?;

        records
            .into_iter()
            .next()
            .ok_or(CorrelationError::TransferNotFound(execute_tx_hash))
    }
}

/// Result of transfer correlation for one row. The zero value means
/// "not a cross-chain transfer", a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedTransfer {
    pub origin_chain_id: u64,
    pub relayer_fee_native: String,
    pub origin_token_price: f64,
    pub relayer_fee_usd: String,
}

impl CorrelatedTransfer {
    pub fn none() -> Self {
        Self {
            origin_chain_id: 0,
            relayer_fee_native: "0".to_string(),
            origin_token_price: 0.0,
            relayer_fee_usd: "0".to_string(),
        }
    }
}

/// Detects executed cross-chain transfers in a decoded trace and resolves
/// the origin-side relayer fee in USD.
pub struct TransferCorrelator {
    index: Arc<dyn TransferIndex>,
    oracle: Arc<dyn PriceOracle>,
    registry: ChainRegistry,
}

impl TransferCorrelator {
    pub fn new(
        index: Arc<dyn TransferIndex>,
        oracle: Arc<dyn PriceOracle>,
        registry: ChainRegistry,
    ) -> Self {
        Self {
            index,
            oracle,
            registry,
        }
    }

    pub async fn correlate(
        &self,
        trace: &EventTrace,
        execute_tx_hash: B256,
    ) -> Result<CorrelatedTransfer, CorrelationError> {
        if !trace.contains(TRIGGER_INTERFACE, TRIGGER_EVENT) {
            return Ok(CorrelatedTransfer::none());
        }

        let record = self.index.lookup(execute_tx_hash).await?;

        let origin = self
            .registry
            .get(record.origin_chain)
            .ok_or(CorrelationError::UnknownOriginChain(record.origin_chain))?;

        // Price the relayer fee at the origin-side call, not the
        // destination execution.
        let price = if origin.is_stablecoin {
            1.0
        } else {
            self.oracle
                .resolve(
                    origin.chain_id,
                    origin.mainnet_equivalent,
                    record.xcall_timestamp,
                    record.xcall_block_number,
                )
                .await
                .usd_price
        };

        let relayer_fee_wei = U256::from_str_radix(record.relayer_fee.trim(), 10).map_err(|_| {
            CorrelationError::MalformedRelayerFee {
                tx_hash: execute_tx_hash,
                value: record.relayer_fee.clone(),
            }
        })?;

        Ok(CorrelatedTransfer {
            origin_chain_id: origin.chain_id,
            relayer_fee_native: record.relayer_fee,
            origin_token_price: price,
            relayer_fee_usd: to_usd_string(relayer_fee_wei, price),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use alloy::primitives::Address;

    use super::*;
    use crate::decoding::{decode_logs, InterfaceSet};
    use crate::pricing::{PriceQuote, PriceSource};

    struct FakeIndex {
        record: Option<TransferRecord>,
        calls: AtomicUsize,
    }

    impl FakeIndex {
        fn with_record(record: TransferRecord) -> Self {
            Self {
                record: Some(record),
                calls: AtomicUsize::new(0),
            }
        }

        fn empty() -> Self {
            Self {
                record: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransferIndex for FakeIndex {
        async fn lookup(&self, execute_tx_hash: B256) -> Result<TransferRecord, CorrelationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.record
                .clone()
                .ok_or(CorrelationError::TransferNotFound(execute_tx_hash))
        }
    }

    /// Records the (chain, block, timestamp) each resolution asked for.
    struct RecordingOracle {
        price: f64,
        requests: Mutex<Vec<(u64, i64, u64)>>,
    }

    impl RecordingOracle {
        fn new(price: f64) -> Self {
            Self {
                price,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PriceOracle for RecordingOracle {
        async fn resolve(
            &self,
            chain_id: u64,
            token: Address,
            as_of: i64,
            as_of_block: u64,
        ) -> PriceQuote {
            self.requests
                .lock()
                .unwrap()
                .push((chain_id, as_of, as_of_block));
            PriceQuote {
                token,
                as_of,
                usd_price: self.price,
                source: PriceSource::Subgraph,
            }
        }
    }

    fn executed_trace() -> EventTrace {
        use alloy::primitives::{keccak256, Bytes};
        let topic = keccak256("Executed(bytes32,address,address,uint256,address)".as_bytes());
        let log = alloy::rpc::types::Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: alloy::primitives::LogData::new_unchecked(vec![topic], Bytes::new()),
            },
            ..Default::default()
        };
        decode_logs(&[log], &InterfaceSet::bridge_default())
    }

    fn plain_trace() -> EventTrace {
        decode_logs(&[], &InterfaceSet::bridge_default())
    }

    fn sample_record() -> TransferRecord {
        TransferRecord {
            origin_chain: 137,
            xcall_block_number: 39_000_000,
            xcall_timestamp: 1_675_600_000,
            relayer_fee: "1000000000000000000".to_string(),
        }
    }

    #[tokio::test]
    async fn untriggered_trace_makes_no_external_call() {
        let index = Arc::new(FakeIndex::with_record(sample_record()));
        let correlator = TransferCorrelator::new(
            index.clone(),
            Arc::new(RecordingOracle::new(1.2)),
            ChainRegistry::defaults(),
        );

        let result = correlator
            .correlate(&plain_trace(), B256::ZERO)
            .await
            .unwrap();

        assert_eq!(result, CorrelatedTransfer::none());
        assert_eq!(result.origin_chain_id, 0);
        assert_eq!(result.relayer_fee_native, "0");
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn triggered_trace_prices_at_the_origin_call() {
        let oracle = Arc::new(RecordingOracle::new(1.2));
        let correlator = TransferCorrelator::new(
            Arc::new(FakeIndex::with_record(sample_record())),
            oracle.clone(),
            ChainRegistry::defaults(),
        );

        let result = correlator
            .correlate(&executed_trace(), B256::ZERO)
            .await
            .unwrap();

        assert_eq!(result.origin_chain_id, 137);
        assert_eq!(result.origin_token_price, 1.2);
        // 1 token at 1.2 USD with milli-unit scaling.
        assert_eq!(result.relayer_fee_usd, "1.200000000000000000");

        let requests = oracle.requests.lock().unwrap();
        assert_eq!(
            requests.as_slice(),
            &[(137, 1_675_600_000, 39_000_000)],
            "price must be resolved against the origin chain's block and timestamp"
        );
    }

    #[tokio::test]
    async fn missing_index_record_is_an_error() {
        let correlator = TransferCorrelator::new(
            Arc::new(FakeIndex::empty()),
            Arc::new(RecordingOracle::new(1.0)),
            ChainRegistry::defaults(),
        );

        let err = correlator
            .correlate(&executed_trace(), B256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::TransferNotFound(_)));
    }

    #[tokio::test]
    async fn unknown_origin_chain_is_an_error() {
        let mut record = sample_record();
        record.origin_chain = 424242;
        let correlator = TransferCorrelator::new(
            Arc::new(FakeIndex::with_record(record)),
            Arc::new(RecordingOracle::new(1.0)),
            ChainRegistry::defaults(),
        );

        let err = correlator
            .correlate(&executed_trace(), B256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::UnknownOriginChain(424242)));
    }
}
