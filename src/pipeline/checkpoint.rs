use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Resume cursor for the enrichment pipeline. `read_count` indexes the
/// filtered row sequence: a value of `n` means rows `0..n` are committed
/// to the output ledger and the next run starts at row `n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "readCount")]
    pub read_count: u64,
}

impl Checkpoint {
    /// Load the cursor from disk. An absent or unreadable file means a
    /// fresh run from row 0.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&contents) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(
                    "Corrupt checkpoint at {}, restarting from row 0: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Persist the cursor atomically: write a sibling temp file, sync it,
    /// then rename over the target so a crash never leaves a torn file.
    pub fn persist(&self, path: &Path) -> Result<(), CheckpointError> {
        let body = serde_json::to_string(self)?;
        let tmp = path.with_extension("tmp");

        let write = |p: &Path| -> std::io::Result<()> {
            use std::io::Write;
            let mut file = fs::File::create(p)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()
        };

        write(&tmp)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|source| CheckpointError::Write {
                path: path.display().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_starts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::load(&dir.path().join("missing.json"));
        assert_eq!(checkpoint.read_count, 0);
    }

    #[test]
    fn corrupt_file_starts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Checkpoint::load(&path).read_count, 0);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        Checkpoint { read_count: 42 }.persist(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).read_count, 42);

        // Field name is part of the on-disk contract.
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body, r#"{"readCount":42}"#);
    }

    #[test]
    fn persist_overwrites_previous_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        Checkpoint { read_count: 5 }.persist(&path).unwrap();
        Checkpoint { read_count: 6 }.persist(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).read_count, 6);
    }
}
