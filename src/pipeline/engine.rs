use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{B256, U256};
use thiserror::Error;

use super::checkpoint::{Checkpoint, CheckpointError};
use super::ledger::{InputLedger, LedgerError, OutputLedger};
use crate::decoding::{decode_logs, InterfaceSet};
use crate::enrichment::{CorrelatedTransfer, CorrelationError, FeeCalculator, FeeError, TransferCorrelator};
use crate::rpc::{ReceiptSource, RpcError};
use crate::types::config::ChainRegistry;
use crate::types::record::{EnrichedRecord, RawTransactionRecord};

/// Failure of one enrichment stage for one row.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed. The run halts with the cursor still pointing at the
    /// failed row, so the next invocation retries exactly here.
    #[error("halted at row {index} (chain {chain_id}, tx {tx_hash}): {source}")]
    Halted {
        index: u64,
        chain_id: u64,
        tx_hash: B256,
        source: StageError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows enriched and committed by this run.
    pub processed: u64,
    /// Input lines dropped by filtering (unknown chain or unparseable).
    pub skipped: u64,
    /// Cursor position after the run.
    pub read_count: u64,
}

/// The resumable enrichment loop. Rows are processed strictly in input
/// order; each committed row advances and persists the checkpoint before
/// the next row starts, so a crash or halt loses at most in-flight work
/// and a re-run never duplicates output.
pub struct EnrichmentPipeline {
    registry: ChainRegistry,
    receipts: Arc<dyn ReceiptSource>,
    interfaces: InterfaceSet,
    fees: Option<FeeCalculator>,
    correlator: Option<TransferCorrelator>,
}

impl EnrichmentPipeline {
    pub fn new(
        registry: ChainRegistry,
        receipts: Arc<dyn ReceiptSource>,
        interfaces: InterfaceSet,
    ) -> Self {
        Self {
            registry,
            receipts,
            interfaces,
            fees: None,
            correlator: None,
        }
    }

    pub fn with_fees(mut self, fees: FeeCalculator) -> Self {
        self.fees = Some(fees);
        self
    }

    pub fn with_correlation(mut self, correlator: TransferCorrelator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    pub async fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        checkpoint_path: &Path,
    ) -> Result<RunSummary, PipelineError> {
        let checkpoint = Checkpoint::load(checkpoint_path);
        let input = InputLedger::load(input_path, &self.registry)?;
        let mut output = OutputLedger::open(output_path, checkpoint.read_count)?;

        if checkpoint.read_count > 0 {
            tracing::info!("Resuming from row {}", checkpoint.read_count);
        }

        let mut read_count = checkpoint.read_count;
        let mut processed = 0u64;

        for (index, row) in input.rows.iter().enumerate() {
            let index = index as u64;
            if index < checkpoint.read_count {
                continue;
            }

            let enriched = match self.enrich_row(index, row).await {
                Ok(enriched) => enriched,
                Err(source) => {
                    // Leave the cursor at the failed row. A persist failure
                    // here must not mask the stage error.
                    if let Err(e) = (Checkpoint { read_count }).persist(checkpoint_path) {
                        tracing::warn!("Failed to persist checkpoint on halt: {}", e);
                    }
                    return Err(PipelineError::Halted {
                        index,
                        chain_id: row.chain_id,
                        tx_hash: row.tx_hash,
                        source,
                    });
                }
            };

            output.commit(&enriched)?;
            read_count = index + 1;
            Checkpoint { read_count }.persist(checkpoint_path)?;
            processed += 1;

            tracing::debug!(
                "Committed row {} (chain {}, tx {})",
                index,
                row.chain_id,
                row.tx_hash
            );
        }

        Checkpoint { read_count }.persist(checkpoint_path)?;

        Ok(RunSummary {
            processed,
            skipped: input.skipped,
            read_count,
        })
    }

    async fn enrich_row(
        &self,
        index: u64,
        row: &RawTransactionRecord,
    ) -> Result<EnrichedRecord, StageError> {
        let chain = self
            .registry
            .get(row.chain_id)
            .ok_or(RpcError::UnknownChain(row.chain_id))?;

        let receipt = self
            .receipts
            .transaction_receipt(row.chain_id, row.tx_hash)
            .await?;
        let trace = decode_logs(&receipt.logs, &self.interfaces);

        let (fee_native, fee_usd, native_token_price) = match &self.fees {
            Some(fees) => {
                let breakdown = fees
                    .compute(chain, row.tx_hash, &receipt, row.timestamp)
                    .await?;
                (
                    breakdown.native_fee,
                    breakdown.usd_fee,
                    breakdown.native_token_price,
                )
            }
            None => (U256::ZERO, "0".to_string(), 0.0),
        };

        let transfer = match &self.correlator {
            Some(correlator) => correlator.correlate(&trace, row.tx_hash).await?,
            None => CorrelatedTransfer::none(),
        };

        Ok(EnrichedRecord {
            index,
            raw: row.clone(),
            events: trace.flatten(),
            gas_used: receipt.gas_used,
            gas_price_wei: receipt.gas_price_wei,
            native_token_price,
            fee_native,
            fee_usd,
            origin_chain_id: transfer.origin_chain_id,
            origin_token_price: transfer.origin_token_price,
            relayer_fee_native: transfer.relayer_fee_native,
            relayer_fee_usd: transfer.relayer_fee_usd,
        })
    }
}
