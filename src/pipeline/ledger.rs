use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::config::ChainRegistry;
use crate::types::record::{EnrichedRecord, RawTransactionRecord, OUTPUT_HEADER};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read input ledger {path}: {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open output ledger {path}: {source}")]
    OpenOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to append to output ledger: {0}")]
    Append(std::io::Error),
}

/// The filtered input row sequence. Rows for chains outside the registry
/// and rows that do not parse are dropped here, before any indexing, so
/// the checkpoint cursor only ever counts rows that can be processed.
pub struct InputLedger {
    pub rows: Vec<RawTransactionRecord>,
    pub skipped: u64,
}

impl InputLedger {
    pub fn load(path: &Path, registry: &ChainRegistry) -> Result<Self, LedgerError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LedgerError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rows = Vec::new();
        let mut skipped = 0u64;

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = match RawTransactionRecord::parse_line(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping unparseable input line {}: {}", line_no + 1, e);
                    skipped += 1;
                    continue;
                }
            };
            if !registry.contains(record.chain_id) {
                tracing::debug!(
                    "Skipping input line {} for unconfigured chain {}",
                    line_no + 1,
                    record.chain_id
                );
                skipped += 1;
                continue;
            }
            rows.push(record);
        }

        Ok(Self { rows, skipped })
    }
}

/// Append-only output ledger. A fresh run truncates and writes the column
/// header; a resumed run appends after the rows already committed.
pub struct OutputLedger {
    writer: BufWriter<File>,
}

impl OutputLedger {
    pub fn open(path: &Path, read_count: u64) -> Result<Self, LedgerError> {
        let open = |resuming: bool| {
            if resuming {
                OpenOptions::new().create(true).append(true).open(path)
            } else {
                File::create(path)
            }
        };

        let file = open(read_count > 0).map_err(|source| LedgerError::OpenOutput {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        if read_count == 0 {
            writeln!(writer, "{}", OUTPUT_HEADER).map_err(LedgerError::Append)?;
            writer.flush().map_err(LedgerError::Append)?;
        }

        Ok(Self { writer })
    }

    /// Append one enriched row and flush it to disk, so a halt after this
    /// call never loses the row.
    pub fn commit(&mut self, record: &EnrichedRecord) -> Result<(), LedgerError> {
        writeln!(self.writer, "{}", record.to_csv_line()).map_err(LedgerError::Append)?;
        self.writer.flush().map_err(LedgerError::Append)
    }
}
