use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::{address, Address};
use serde::Deserialize;

/// One entry of the on-disk chain configuration, keyed by chain id string:
/// `{"10": {"rpc": "...", "mainnetEquivalent": "0x...", "stable": false}}`.
#[derive(Debug, Deserialize)]
pub struct ChainConfigRaw {
    pub rpc: String,
    #[serde(rename = "mainnetEquivalent")]
    pub mainnet_equivalent: Address,
    #[serde(default)]
    pub stable: bool,
}

/// Resolved per-chain configuration. Immutable after load.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Mainnet address of the token equivalent to this chain's native asset,
    /// used for subgraph price lookups.
    pub mainnet_equivalent: Address,
    /// True when the native asset tracks 1 USD (e.g. xDAI); price lookups
    /// are short-circuited for these chains.
    pub is_stablecoin: bool,
}

/// Static mapping from chain id to its configuration. Consumed by every
/// other component; rows referencing unknown chain ids are filtered out
/// before they reach the pipeline.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: HashMap<u64, ChainConfig>,
}

impl ChainRegistry {
    /// Load the registry from a JSON file, falling back to the compiled-in
    /// defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(
                "Config file {} not found, using built-in chain configs",
                path.display()
            );
            return Ok(Self::defaults());
        }

        let content = std::fs::read_to_string(path)?;
        let raw: HashMap<String, ChainConfigRaw> = serde_json::from_str(&content)?;

        let mut chains = HashMap::with_capacity(raw.len());
        for (key, entry) in raw {
            let chain_id: u64 = key
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid chain id key in config: {:?}", key))?;
            chains.insert(
                chain_id,
                ChainConfig {
                    chain_id,
                    rpc_url: entry.rpc,
                    mainnet_equivalent: entry.mainnet_equivalent,
                    is_stablecoin: entry.stable,
                },
            );
        }

        Ok(Self { chains })
    }

    /// Built-in configs for the chains the original deployment covered.
    pub fn defaults() -> Self {
        const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        const BNB: Address = address!("B8c77482e45F1F44dE1745F52C74426C631bDD52");
        const DAI: Address = address!("6B175474E89094C44Da98b954EedeAC495271d0F");
        const MATIC: Address = address!("7D1AfA7B718fb893dB30A3aBc0Cfc608AaCfeBB0");

        let entries = [
            (1u64, "https://cloudflare-eth.com", WETH, false),
            (
                10,
                "https://endpoints.omniatech.io/v1/op/mainnet/public",
                WETH,
                false,
            ),
            (56, "https://bsc-dataseed2.ninicoin.io", BNB, false),
            (100, "https://rpc.gnosischain.com", DAI, true),
            (137, "https://polygon.llamarpc.com", MATIC, false),
            (
                42161,
                "https://endpoints.omniatech.io/v1/arbitrum/one/public",
                WETH,
                false,
            ),
        ];

        let chains = entries
            .into_iter()
            .map(|(chain_id, rpc, token, stable)| {
                (
                    chain_id,
                    ChainConfig {
                        chain_id,
                        rpc_url: rpc.to_string(),
                        mainnet_equivalent: token,
                        is_stablecoin: stable,
                    },
                )
            })
            .collect();

        Self { chains }
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id)
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values()
    }
}
