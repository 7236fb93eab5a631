use std::path::PathBuf;
use std::time::Duration;

/// Endpoints for the off-chain services the enrichment stages call.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Uniswap V2 subgraph used for token-day price lookups.
    pub subgraph_url: String,
    /// Block-scoped BNB spot price proxy.
    pub bnb_feed_url: String,
    /// Transfer index queried by execute transaction hash.
    pub transfer_index_url: String,
    /// Bound applied to every outbound HTTP request.
    pub http_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            subgraph_url: "https://api.thegraph.com/subgraphs/name/uniswap/uniswap-v2"
                .to_string(),
            bnb_feed_url: "https://proxy-worker.pancake-swap.workers.dev/bsc-exchange"
                .to_string(),
            transfer_index_url: "https://postgrest.mainnet.connext.ninja".to_string(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Run settings for one pipeline invocation. The fee and correlation stages
/// are toggleable so a single pipeline covers the decode-only, decode+fee
/// and decode+fee+cross-chain variants.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub config_path: PathBuf,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub compute_fees: bool,
    pub correlate_transfers: bool,
    pub endpoints: EndpointConfig,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            input_path: PathBuf::from("data.csv"),
            output_path: PathBuf::from("data_converted.csv"),
            checkpoint_path: PathBuf::from("checkpoint.json"),
            compute_fees: true,
            correlate_transfers: true,
            endpoints: EndpointConfig::default(),
        }
    }
}
