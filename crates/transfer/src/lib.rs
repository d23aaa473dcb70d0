//! Chunked file transfer for size-capped transports.
//!
//! A finished media file is handed to a [`ChunkedTransferManager`] together
//! with a [`Transport`]. Files that fit in one message go out in a single
//! upload; larger files are split into sequential `.partNNN` artifacts inside
//! a job-scoped scratch directory, uploaded in order, and removed as soon as
//! each upload returns.

mod chunked;
mod config;
mod manager;
mod progress;
mod transport;
mod types;
mod validation;

use std::path::PathBuf;

pub use chunked::{Chunk, ChunkArtifact, ChunkPlan, artifact_file_name, calculate_file_checksum};
pub use config::TransferConfig;
pub use manager::{ChunkedTransferManager, transfer};
pub use progress::{ProgressReporter, SpeedCalculator, TransferProgress};
pub use transport::{Transport, TransportError, UploadFuture};
pub use types::{
    ParseKindError, PartReceipt, TransferJob, TransferKind, TransferMode, TransferReport,
    TransferState,
};
pub use validation::{validate_chunk_size, validate_source};

/// Largest file the Telegram Bot API accepts in a single upload: 50 MiB.
pub const TELEGRAM_UPLOAD_LIMIT: u64 = 50 * 1024 * 1024;

/// Headroom kept below the transport cap for multipart framing.
pub const CHUNK_SAFETY_MARGIN: u64 = 1024 * 1024;

/// Default maximum chunk size: the Bot API cap minus [`CHUNK_SAFETY_MARGIN`].
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = TELEGRAM_UPLOAD_LIMIT - CHUNK_SAFETY_MARGIN;

/// Errors produced by the transfer crate.
///
/// Every chunk-level variant carries the failing ordinal and the total part
/// count so the caller can tell the end user exactly where the job stopped.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("source file not readable: {}", .path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid max chunk size {max_chunk_bytes}: {reason}")]
    InvalidChunkSize {
        max_chunk_bytes: u64,
        reason: &'static str,
    },

    #[error("failed to create scratch directory")]
    TempDir(#[source] std::io::Error),

    #[error("failed to read part {ordinal}/{total}")]
    ChunkRead {
        ordinal: u32,
        total: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of part {ordinal}/{total} failed")]
    Upload {
        ordinal: u32,
        total: u32,
        #[source]
        source: TransportError,
    },

    #[error("cancelled at part {ordinal}/{total}")]
    Cancelled { ordinal: u32, total: u32 },
}

impl TransferError {
    /// Returns the 1-based ordinal of the part that failed, if the error is
    /// tied to one.
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            Self::ChunkRead { ordinal, .. }
            | Self::Upload { ordinal, .. }
            | Self::Cancelled { ordinal, .. } => Some(*ordinal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chunk_fits_under_cap() {
        assert!(DEFAULT_MAX_CHUNK_BYTES < TELEGRAM_UPLOAD_LIMIT);
        assert_eq!(DEFAULT_MAX_CHUNK_BYTES, 49 * 1024 * 1024);
    }

    #[test]
    fn error_ordinal() {
        let err = TransferError::Upload {
            ordinal: 2,
            total: 3,
            source: TransportError::new("boom"),
        };
        assert_eq!(err.ordinal(), Some(2));
        assert_eq!(err.to_string(), "upload of part 2/3 failed");

        let err = TransferError::InvalidChunkSize {
            max_chunk_bytes: 0,
            reason: "must be greater than zero",
        };
        assert_eq!(err.ordinal(), None);
    }
}
