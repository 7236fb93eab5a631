use std::collections::HashMap;

use alloy::consensus::TxReceipt as _;
use alloy::network::Ethereum;
use alloy::primitives::{B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::types::config::ChainRegistry;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No receipt found for transaction {0}")]
    MissingReceipt(B256),

    #[error("Malformed receipt for transaction {tx_hash}: {reason}")]
    MalformedReceipt { tx_hash: B256, reason: String },

    #[error("No RPC client configured for chain {0}")]
    UnknownChain(u64),
}

/// The subset of a transaction receipt the pipeline consumes. Derived from
/// the node response per transaction; never persisted.
#[derive(Debug, Clone)]
pub struct DecodedReceipt {
    pub gas_used: u64,
    pub gas_price_wei: u128,
    pub block_number: u64,
    pub logs: Vec<Log>,
}

/// Rollup receipt extension fields, present only on chains that charge an
/// L1 data fee.
#[derive(Debug, Clone, Copy)]
pub struct L1FeeInfo {
    pub l1_fee: U256,
    pub l1_fee_scalar: U256,
}

impl L1FeeInfo {
    /// The native-fee surcharge this receipt carries.
    pub fn surcharge(&self) -> U256 {
        self.l1_fee * self.l1_fee_scalar
    }
}

/// Source of transaction receipts, keyed by chain id. The pipeline talks to
/// this seam so tests can substitute a fake for the live RPC pool.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// Fetch the receipt for a finalized transaction. A missing receipt is
    /// an error: every ledger row references an executed transaction.
    async fn transaction_receipt(
        &self,
        chain_id: u64,
        tx_hash: B256,
    ) -> Result<DecodedReceipt, RpcError>;

    /// Fetch the rollup L1 fee extension fields from the raw receipt.
    async fn l1_fee_info(&self, chain_id: u64, tx_hash: B256) -> Result<L1FeeInfo, RpcError>;
}

/// JSON-RPC client for one chain.
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
}

impl RpcClient {
    pub fn from_url(url: &str) -> Result<Self, RpcError> {
        let url = Url::parse(url).map_err(|e| RpcError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            provider: RootProvider::<Ethereum>::new_http(url),
        })
    }

    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<DecodedReceipt, RpcError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| RpcError::Provider(e.to_string()))?
            .ok_or(RpcError::MissingReceipt(tx_hash))?;

        let block_number = receipt.block_number.ok_or(RpcError::MalformedReceipt {
            tx_hash,
            reason: "missing block number".to_string(),
        })?;

        Ok(DecodedReceipt {
            gas_used: receipt.gas_used,
            gas_price_wei: receipt.effective_gas_price,
            block_number,
            logs: receipt.inner.logs().to_vec(),
        })
    }

    /// Re-fetch the receipt as raw JSON to read the provider extension
    /// fields (`l1Fee`, `l1FeeScalar`) that the typed receipt drops.
    pub async fn l1_fee_info(&self, tx_hash: B256) -> Result<L1FeeInfo, RpcError> {
        let raw: serde_json::Value = self
            .provider
            .client()
            .request("eth_getTransactionReceipt", (tx_hash,))
            .await
            .map_err(|e| RpcError::Provider(e.to_string()))?;

        if raw.is_null() {
            return Err(RpcError::MissingReceipt(tx_hash));
        }

        let l1_fee = extract_quantity(&raw, "l1Fee", tx_hash)?;
        let l1_fee_scalar = extract_quantity(&raw, "l1FeeScalar", tx_hash)?;

        Ok(L1FeeInfo {
            l1_fee,
            l1_fee_scalar,
        })
    }
}

fn extract_quantity(raw: &serde_json::Value, field: &str, tx_hash: B256) -> Result<U256, RpcError> {
    let value = raw.get(field).ok_or_else(|| RpcError::MalformedReceipt {
        tx_hash,
        reason: format!("missing field {:?}", field),
    })?;

    let text = value.as_str().ok_or_else(|| RpcError::MalformedReceipt {
        tx_hash,
        reason: format!("field {:?} is not a string", field),
    })?;

    parse_quantity(text).ok_or_else(|| RpcError::MalformedReceipt {
        tx_hash,
        reason: format!("field {:?} has unparseable value {:?}", field, text),
    })
}

/// Parses either a 0x-prefixed hex quantity or a plain decimal string; the
/// node reports `l1Fee` as hex and `l1FeeScalar` as decimal.
fn parse_quantity(text: &str) -> Option<U256> {
    if let Some(hex) = text.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_str_radix(text, 10).ok()
    }
}

/// Live receipt source holding one client per configured chain.
pub struct ChainRpcPool {
    clients: HashMap<u64, RpcClient>,
}

impl ChainRpcPool {
    pub fn new(registry: &ChainRegistry) -> Result<Self, RpcError> {
        let mut clients = HashMap::with_capacity(registry.len());
        for chain in registry.iter() {
            clients.insert(chain.chain_id, RpcClient::from_url(&chain.rpc_url)?);
        }
        Ok(Self { clients })
    }

    fn client(&self, chain_id: u64) -> Result<&RpcClient, RpcError> {
        self.clients
            .get(&chain_id)
            .ok_or(RpcError::UnknownChain(chain_id))
    }
}

#[async_trait]
impl ReceiptSource for ChainRpcPool {
    async fn transaction_receipt(
        &self,
        chain_id: u64,
        tx_hash: B256,
    ) -> Result<DecodedReceipt, RpcError> {
        self.client(chain_id)?.transaction_receipt(tx_hash).await
    }

    async fn l1_fee_info(&self, chain_id: u64, tx_hash: B256) -> Result<L1FeeInfo, RpcError> {
        self.client(chain_id)?.l1_fee_info(tx_hash).await
    }
}
