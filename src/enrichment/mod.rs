//! Row enrichment stages: fee computation and transfer correlation.

pub mod fees;
pub mod transfers;

pub use fees::{FeeBreakdown, FeeCalculator, FeeError, L1_DATA_FEE_CHAIN_ID};
pub use transfers::{
    CorrelatedTransfer, CorrelationError, TransferCorrelator, TransferIndex, TransferIndexClient,
    TransferRecord,
};
