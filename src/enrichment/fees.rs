use std::sync::Arc;

use alloy::primitives::utils::format_ether;
use alloy::primitives::{B256, U256};
use thiserror::Error;

use crate::pricing::PriceOracle;
use crate::rpc::{DecodedReceipt, ReceiptSource, RpcError};
use crate::types::config::ChainConfig;

/// The one chain whose receipts carry an L1 data-fee extension (Optimism).
pub const L1_DATA_FEE_CHAIN_ID: u64 = 10;

/// USD prices are scaled to milli-units before touching the integer fee
/// path, preserving 3 decimal digits of price precision.
pub const PRICE_SCALE: u64 = 1000;

#[derive(Debug, Error)]
pub enum FeeError {
    /// The rollup surcharge path was invoked for a chain without the
    /// receipt extension. This is a programming error, not a data error,
    /// and must not silently produce a zero surcharge.
    #[error("L1 data fee lookup is not supported on chain {0}")]
    UnsupportedL1FeeChain(u64),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Result of fee computation for one transaction.
#[derive(Debug, Clone)]
pub struct FeeBreakdown {
    /// Total fee in native wei units, including any L1 surcharge.
    pub native_fee: U256,
    /// Fee in USD, rendered as an 18-decimal decimal string.
    pub usd_fee: String,
    /// The USD price the conversion used (0 when unpriced).
    pub native_token_price: f64,
}

/// Computes the native gas fee for a receipt, applies the rollup L1
/// surcharge where the chain has one, and converts to USD through the
/// price oracle.
pub struct FeeCalculator {
    receipts: Arc<dyn ReceiptSource>,
    oracle: Arc<dyn PriceOracle>,
}

impl FeeCalculator {
    pub fn new(receipts: Arc<dyn ReceiptSource>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { receipts, oracle }
    }

    pub async fn compute(
        &self,
        chain: &ChainConfig,
        tx_hash: B256,
        receipt: &DecodedReceipt,
        as_of: i64,
    ) -> Result<FeeBreakdown, FeeError> {
        let mut native_fee = U256::from(receipt.gas_used) * U256::from(receipt.gas_price_wei);

        if chain.chain_id == L1_DATA_FEE_CHAIN_ID {
            native_fee += self.l1_surcharge(chain.chain_id, tx_hash).await?;
        }

        let price = if chain.is_stablecoin {
            1.0
        } else {
            self.oracle
                .resolve(
                    chain.chain_id,
                    chain.mainnet_equivalent,
                    as_of,
                    receipt.block_number,
                )
                .await
                .usd_price
        };

        Ok(FeeBreakdown {
            native_fee,
            usd_fee: to_usd_string(native_fee, price),
            native_token_price: price,
        })
    }

    /// Fetch the L1 data-fee surcharge. Chain-gated: calling this for any
    /// chain but the designated rollup fails loudly.
    pub async fn l1_surcharge(&self, chain_id: u64, tx_hash: B256) -> Result<U256, FeeError> {
        if chain_id != L1_DATA_FEE_CHAIN_ID {
            return Err(FeeError::UnsupportedL1FeeChain(chain_id));
        }
        let info = self.receipts.l1_fee_info(chain_id, tx_hash).await?;
        Ok(info.surcharge())
    }
}

/// USD price scaled to integer milli-units, floored; non-finite or
/// non-positive prices scale to 0.
pub fn milli_price(price: f64) -> U256 {
    if !price.is_finite() || price <= 0.0 {
        return U256::ZERO;
    }
    U256::from((price * PRICE_SCALE as f64).floor() as u128)
}

/// Convert a native wei amount to an 18-decimal USD string. The price is
/// widened to milli-units before the multiply so no float arithmetic
/// touches the amount itself.
pub fn to_usd_string(native_amount: U256, price: f64) -> String {
    let scaled = native_amount * milli_price(price) / U256::from(PRICE_SCALE);
    format_ether(scaled)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::primitives::{address, Address};
    use async_trait::async_trait;

    use super::*;
    use crate::pricing::{PriceQuote, PriceSource};
    use crate::rpc::L1FeeInfo;

    struct FixedPriceOracle(f64);

    #[async_trait]
    impl PriceOracle for FixedPriceOracle {
        async fn resolve(
            &self,
            _chain_id: u64,
            token: Address,
            as_of: i64,
            _as_of_block: u64,
        ) -> PriceQuote {
            PriceQuote {
                token,
                as_of,
                usd_price: self.0,
                source: PriceSource::Subgraph,
            }
        }
    }

    struct FakeReceipts {
        l1_fee: U256,
        l1_fee_scalar: U256,
        l1_calls: AtomicUsize,
    }

    impl FakeReceipts {
        fn new(l1_fee: u64, l1_fee_scalar: u64) -> Self {
            Self {
                l1_fee: U256::from(l1_fee),
                l1_fee_scalar: U256::from(l1_fee_scalar),
                l1_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReceiptSource for FakeReceipts {
        async fn transaction_receipt(
            &self,
            _chain_id: u64,
            tx_hash: B256,
        ) -> Result<DecodedReceipt, RpcError> {
            Err(RpcError::MissingReceipt(tx_hash))
        }

        async fn l1_fee_info(&self, _chain_id: u64, _tx_hash: B256) -> Result<L1FeeInfo, RpcError> {
            self.l1_calls.fetch_add(1, Ordering::SeqCst);
            Ok(L1FeeInfo {
                l1_fee: self.l1_fee,
                l1_fee_scalar: self.l1_fee_scalar,
            })
        }
    }

    fn chain(chain_id: u64, stable: bool) -> ChainConfig {
        ChainConfig {
            chain_id,
            rpc_url: "https://rpc.example".to_string(),
            mainnet_equivalent: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            is_stablecoin: stable,
        }
    }

    fn receipt(gas_used: u64, gas_price_wei: u128) -> DecodedReceipt {
        DecodedReceipt {
            gas_used,
            gas_price_wei,
            block_number: 25_634_027,
            logs: Vec::new(),
        }
    }

    #[test]
    fn pinned_fee_arithmetic() {
        // gasUsed=100000, gasPriceWei=20000000000, price=1800.123
        let native = U256::from(100_000u64) * U256::from(20_000_000_000u64);
        assert_eq!(native, U256::from(2_000_000_000_000_000u64));

        assert_eq!(milli_price(1800.123), U256::from(1_800_123u64));

        // 2_000_000_000_000_000 * 1_800_123 / 1000
        // = 3_600_246_000_000_000_000, formatted at 18 decimals.
        assert_eq!(to_usd_string(native, 1800.123), "3.600246000000000000");
    }

    #[test]
    fn zero_price_means_zero_usd_not_an_error() {
        let native = U256::from(2_000_000_000_000_000u64);
        assert_eq!(to_usd_string(native, 0.0), "0.000000000000000000");
        assert_eq!(milli_price(f64::NAN), U256::ZERO);
        assert_eq!(milli_price(-1.0), U256::ZERO);
    }

    #[tokio::test]
    async fn surcharge_gating_rejects_other_chains() {
        let calc = FeeCalculator::new(
            Arc::new(FakeReceipts::new(1000, 2)),
            Arc::new(FixedPriceOracle(1800.123)),
        );
        let err = calc.l1_surcharge(1, B256::ZERO).await.unwrap_err();
        assert!(matches!(err, FeeError::UnsupportedL1FeeChain(1)));
    }

    #[tokio::test]
    async fn surcharge_added_on_designated_chain() {
        let receipts = Arc::new(FakeReceipts::new(1000, 2));
        let calc = FeeCalculator::new(receipts.clone(), Arc::new(FixedPriceOracle(1.0)));

        let breakdown = calc
            .compute(&chain(10, false), B256::ZERO, &receipt(100, 10), 1675662056)
            .await
            .unwrap();

        // base 1000 + surcharge 1000*2
        assert_eq!(breakdown.native_fee, U256::from(3000u64));
        assert_eq!(receipts.l1_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_surcharge_lookup_off_the_designated_chain() {
        let receipts = Arc::new(FakeReceipts::new(1000, 2));
        let calc = FeeCalculator::new(receipts.clone(), Arc::new(FixedPriceOracle(1.0)));

        let breakdown = calc
            .compute(&chain(1, false), B256::ZERO, &receipt(100, 10), 1675662056)
            .await
            .unwrap();

        assert_eq!(breakdown.native_fee, U256::from(1000u64));
        assert_eq!(receipts.l1_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stablecoin_chains_skip_the_oracle() {
        let calc = FeeCalculator::new(
            Arc::new(FakeReceipts::new(0, 0)),
            // An oracle price that would be visibly wrong if consulted.
            Arc::new(FixedPriceOracle(9999.0)),
        );

        let breakdown = calc
            .compute(&chain(100, true), B256::ZERO, &receipt(100, 10), 1675662056)
            .await
            .unwrap();

        assert_eq!(breakdown.native_token_price, 1.0);
    }
}
