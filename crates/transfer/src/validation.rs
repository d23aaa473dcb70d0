use std::io;
use std::path::Path;

use crate::TransferError;

/// Rejects a zero chunk size.
pub fn validate_chunk_size(max_chunk_bytes: u64) -> Result<(), TransferError> {
    if max_chunk_bytes == 0 {
        return Err(TransferError::InvalidChunkSize {
            max_chunk_bytes,
            reason: "must be greater than zero",
        });
    }
    Ok(())
}

/// Checks that `path` is a readable regular file and returns its size.
///
/// Rejects:
/// - Missing paths
/// - Directories and other non-regular files
/// - Files that cannot be opened for reading
pub fn validate_source(path: &Path) -> Result<u64, TransferError> {
    let not_found = |source: io::Error| TransferError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(path).map_err(not_found)?;
    if !metadata.is_file() {
        return Err(not_found(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    // Metadata can succeed on files we are not allowed to read.
    std::fs::File::open(path).map_err(not_found)?;

    Ok(metadata.len())
}
