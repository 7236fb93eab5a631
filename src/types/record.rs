use alloy::primitives::{B256, U256};
use chrono::NaiveDateTime;
use thiserror::Error;

/// Column header written once at row index 0 of the output ledger.
pub const OUTPUT_HEADER: &str = "index,time,chainId,txhash,taskId,spentAmount,spentAmount(USD),events,gasUsed,gasPrice,ethPrice,feeInETH,feeInUsd,originChain,originEthPrice,relayerFee,relayerFeeInUsd";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("expected 6 comma-separated fields, got {0}")]
    FieldCount(usize),
    #[error("invalid chain id: {0:?}")]
    ChainId(String),
    #[error("invalid hash: {0:?}")]
    Hash(String),
    #[error("invalid timestamp: {0:?}")]
    Timestamp(String),
}

/// One input row:
/// `timestamp,chainId,txHash,taskId,spentAmountNative,spentAmountUsd`.
#[derive(Debug, Clone)]
pub struct RawTransactionRecord {
    /// Timestamp exactly as it appeared in the input, echoed to the output.
    pub timestamp_raw: String,
    /// The same timestamp as unix seconds, used for price lookups.
    pub timestamp: i64,
    pub chain_id: u64,
    pub tx_hash: B256,
    pub task_id: B256,
    pub spent_amount_native: String,
    pub spent_amount_usd: String,
}

impl RawTransactionRecord {
    /// Parse one CSV line. Example:
    /// `2023-02-06 05:40:56.016399,42161,0x32c2...,0x64e5...,296903,$0.30`
    pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 6 {
            return Err(RecordParseError::FieldCount(fields.len()));
        }

        let timestamp_raw = fields[0].trim().to_string();
        let timestamp = parse_timestamp(&timestamp_raw)
            .ok_or_else(|| RecordParseError::Timestamp(timestamp_raw.clone()))?;

        let chain_id: u64 = fields[1]
            .trim()
            .parse()
            .map_err(|_| RecordParseError::ChainId(fields[1].to_string()))?;

        let tx_hash: B256 = fields[2]
            .trim()
            .parse()
            .map_err(|_| RecordParseError::Hash(fields[2].to_string()))?;
        let task_id: B256 = fields[3]
            .trim()
            .parse()
            .map_err(|_| RecordParseError::Hash(fields[3].to_string()))?;

        Ok(Self {
            timestamp_raw,
            timestamp,
            chain_id,
            tx_hash,
            task_id,
            spent_amount_native: fields[4].trim().to_string(),
            spent_amount_usd: fields[5].trim().to_string(),
        })
    }
}

/// Accepts either `YYYY-MM-DD HH:MM:SS[.ffffff]` or plain unix seconds.
fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp());
    }
    raw.parse::<i64>().ok()
}

/// Fully enriched output row. Created once per processed input row and
/// appended to the output ledger; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct EnrichedRecord {
    /// Position in the filtered input sequence.
    pub index: u64,
    pub raw: RawTransactionRecord,
    /// Flattened event trace, or the `NoEvents` sentinel.
    pub events: String,
    pub gas_used: u64,
    pub gas_price_wei: u128,
    /// Native token USD price, rendered with 3 decimal places.
    pub native_token_price: f64,
    /// Total fee in native wei units (base fee plus any L1 surcharge).
    pub fee_native: U256,
    /// Fee in USD as an 18-decimal decimal string.
    pub fee_usd: String,
    /// 0 when the row is not a cross-chain transfer.
    pub origin_chain_id: u64,
    pub origin_token_price: f64,
    /// Relayer fee in origin-chain native wei units, as a decimal string.
    pub relayer_fee_native: String,
    pub relayer_fee_usd: String,
}

impl EnrichedRecord {
    /// Render as one output ledger line (no trailing newline).
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{:?},{:?},{},{},{},{},{},{:.3},{},{},{},{:.3},{},{}",
            self.index,
            self.raw.timestamp_raw,
            self.raw.chain_id,
            self.raw.tx_hash,
            self.raw.task_id,
            self.raw.spent_amount_native,
            self.raw.spent_amount_usd,
            self.events,
            self.gas_used,
            self.gas_price_wei,
            self.native_token_price,
            self.fee_native,
            self.fee_usd,
            self.origin_chain_id,
            self.origin_token_price,
            self.relayer_fee_native,
            self.relayer_fee_usd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "2023-02-06 05:40:56.016399,42161,0x32c2631d5bc88e78105edf7543158689720d2f4de969b79b946f16c83e629e21,0x64e54a6a771267b35a40dc14cf80921a6afb05990d086186b2d2f9c591087d92,296903,$0.30";

    #[test]
    fn parses_well_formed_line() {
        let record = RawTransactionRecord::parse_line(LINE).unwrap();
        assert_eq!(record.chain_id, 42161);
        assert_eq!(record.spent_amount_native, "296903");
        assert_eq!(record.spent_amount_usd, "$0.30");
        assert_eq!(record.timestamp_raw, "2023-02-06 05:40:56.016399");
        // 2023-02-06 05:40:56 UTC
        assert_eq!(record.timestamp, 1675662056);
    }

    #[test]
    fn accepts_unix_seconds_timestamp() {
        let line = LINE.replacen("2023-02-06 05:40:56.016399", "1675662056", 1);
        let record = RawTransactionRecord::parse_line(&line).unwrap();
        assert_eq!(record.timestamp, 1675662056);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = RawTransactionRecord::parse_line("a,b,c").unwrap_err();
        assert_eq!(err, RecordParseError::FieldCount(3));
    }

    #[test]
    fn rejects_bad_chain_id() {
        let line = LINE.replacen("42161", "not-a-chain", 1);
        assert!(matches!(
            RawTransactionRecord::parse_line(&line),
            Err(RecordParseError::ChainId(_))
        ));
    }

    #[test]
    fn csv_line_has_header_arity() {
        let raw = RawTransactionRecord::parse_line(LINE).unwrap();
        let record = EnrichedRecord {
            index: 0,
            raw,
            events: "connext:Executed".to_string(),
            gas_used: 100_000,
            gas_price_wei: 20_000_000_000,
            native_token_price: 1800.123,
            fee_native: U256::from(2_000_000_000_000_000u64),
            fee_usd: "3.600246000000000000".to_string(),
            origin_chain_id: 0,
            origin_token_price: 0.0,
            relayer_fee_native: "0".to_string(),
            relayer_fee_usd: "0".to_string(),
        };
        let line = record.to_csv_line();
        assert_eq!(
            line.split(',').count(),
            OUTPUT_HEADER.split(',').count(),
            "row arity must match the header"
        );
        assert!(line.contains(",1800.123,"));
    }
}
