//! Checkpointed enrichment pipeline.

pub mod checkpoint;
pub mod engine;
pub mod ledger;

pub use checkpoint::{Checkpoint, CheckpointError};
pub use engine::{EnrichmentPipeline, PipelineError, RunSummary, StageError};
pub use ledger::{InputLedger, LedgerError, OutputLedger};
