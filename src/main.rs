mod decoding;
mod enrichment;
mod pipeline;
mod pricing;
mod rpc;
mod types;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use decoding::InterfaceSet;
use enrichment::{FeeCalculator, TransferCorrelator, TransferIndexClient};
use pipeline::EnrichmentPipeline;
use pricing::PriceResolver;
use rpc::ChainRpcPool;
use types::config::{ChainRegistry, EnricherConfig};

/// Value following a `--flag` argument, if present.
fn flag_value(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn parse_args(args: &[String]) -> EnricherConfig {
    let mut config = EnricherConfig::default();
    if let Some(path) = flag_value(args, "--config") {
        config.config_path = path;
    }
    if let Some(path) = flag_value(args, "--input") {
        config.input_path = path;
    }
    if let Some(path) = flag_value(args, "--output") {
        config.output_path = path;
    }
    if let Some(path) = flag_value(args, "--checkpoint") {
        config.checkpoint_path = path;
    }
    config.compute_fees = !args.iter().any(|a| a == "--no-fees");
    config.correlate_transfers = !args.iter().any(|a| a == "--no-correlation");
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = parse_args(&args);

    let registry = ChainRegistry::load(&config.config_path)
        .with_context(|| format!("failed to load chain config {}", config.config_path.display()))?;
    tracing::info!("Loaded config with {} chain(s)", registry.len());

    let receipts = Arc::new(ChainRpcPool::new(&registry).context("failed to build RPC clients")?);
    let oracle = Arc::new(
        PriceResolver::new(&config.endpoints).context("failed to build price resolver")?,
    );

    let mut pipeline =
        EnrichmentPipeline::new(registry.clone(), receipts.clone(), InterfaceSet::bridge_default());

    if config.compute_fees {
        pipeline = pipeline.with_fees(FeeCalculator::new(receipts.clone(), oracle.clone()));
    } else {
        tracing::info!("Fee computation disabled");
    }

    if config.correlate_transfers {
        let index = Arc::new(
            TransferIndexClient::new(&config.endpoints)
                .context("failed to build transfer index client")?,
        );
        pipeline = pipeline.with_correlation(TransferCorrelator::new(index, oracle, registry));
    } else {
        tracing::info!("Transfer correlation disabled");
    }

    let summary = pipeline
        .run(
            &config.input_path,
            &config.output_path,
            &config.checkpoint_path,
        )
        .await?;

    tracing::info!(
        "Run complete: {} row(s) processed, {} skipped, cursor at {}",
        summary.processed,
        summary.skipped,
        summary.read_count
    );
    Ok(())
}
