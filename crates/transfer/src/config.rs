use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_MAX_CHUNK_BYTES;

/// Settings for [`ChunkedTransferManager`](crate::ChunkedTransferManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Largest part sent in one upload, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,

    /// Parent directory for job scratch directories (system temp dir if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

fn default_max_chunk_bytes() -> u64 {
    DEFAULT_MAX_CHUNK_BYTES
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: default_max_chunk_bytes(),
            temp_dir: None,
        }
    }
}

impl TransferConfig {
    /// Directory under which each chunked job creates its own scratch directory.
    pub fn scratch_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
