use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::types::PartReceipt;

/// Copy buffer used while materialising a chunk: 256 KiB.
const COPY_BUFFER_SIZE: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
#[cfg(test)]
pub(crate) fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// A contiguous byte range of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position in the transfer.
    pub ordinal: u32,
    /// Byte offset within the source file.
    pub offset: u64,
    /// Length in bytes. Equal to the chunk size except possibly for the last chunk.
    pub len: u64,
}

/// Splits `total_bytes` into fixed-size chunks, yielded in ordinal order.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    total_bytes: u64,
    chunk_size: u64,
    offset: u64,
    next_ordinal: u32,
}

impl ChunkPlan {
    /// Plans chunks of at most `chunk_size` bytes.
    ///
    /// `chunk_size` must be non-zero; [`TransferJob`](crate::TransferJob)
    /// rejects zero before a plan is ever built.
    pub fn new(total_bytes: u64, chunk_size: u64) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            total_bytes,
            chunk_size: chunk_size.max(1),
            offset: 0,
            next_ordinal: 1,
        }
    }

    /// Number of chunks: `ceil(total_bytes / chunk_size)`.
    pub fn part_count(&self) -> u64 {
        self.total_bytes.div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.offset >= self.total_bytes {
            return None;
        }
        let len = self.chunk_size.min(self.total_bytes - self.offset);
        let chunk = Chunk {
            ordinal: self.next_ordinal,
            offset: self.offset,
            len,
        };
        self.offset += len;
        self.next_ordinal += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total_bytes - self.offset).div_ceil(self.chunk_size);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkPlan {}

// ---------------------------------------------------------------------------
// ChunkArtifact
// ---------------------------------------------------------------------------

/// File name of the artifact for `ordinal`: `<base>.part001`, `<base>.part002`, ...
pub fn artifact_file_name(base: &str, ordinal: u32) -> String {
    format!("{base}.part{ordinal:03}")
}

/// A chunk copied out of its source file into a transient file.
///
/// The artifact owns its file: dropping it removes the file, whether the
/// upload succeeded, failed, or the surrounding task was cancelled.
#[derive(Debug)]
pub struct ChunkArtifact {
    chunk: Chunk,
    path: PathBuf,
    checksum: String,
}

impl ChunkArtifact {
    /// Copies `chunk` out of `source` into `dir`, hashing the bytes as they
    /// are written.
    ///
    /// Blocking; run it on a blocking thread. A source shorter than the
    /// planned range yields [`io::ErrorKind::UnexpectedEof`] and leaves no
    /// file behind.
    pub fn materialize(source: &Path, chunk: Chunk, dir: &Path, base: &str) -> io::Result<Self> {
        let mut src = File::open(source)?;
        src.seek(SeekFrom::Start(chunk.offset))?;

        // The guard is declared before the file handle so the handle is
        // closed before the guard removes the file on an error path.
        let mut artifact = Self {
            chunk,
            path: dir.join(artifact_file_name(base, chunk.ordinal)),
            checksum: String::new(),
        };
        let mut dst = File::create(&artifact.path)?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut limited = src.take(chunk.len);
        let mut written = 0u64;
        loop {
            let n = limited.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            dst.write_all(&buf[..n])?;
            written += n as u64;
        }
        if written != chunk.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended after {written} of {} bytes at offset {}",
                    chunk.len, chunk.offset
                ),
            ));
        }
        dst.sync_all()?;

        artifact.checksum = hex::encode(hasher.finalize());
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the chunk sits in the source, with the SHA-256 of its bytes.
    pub fn receipt(&self) -> PartReceipt {
        PartReceipt {
            ordinal: self.chunk.ordinal,
            offset: self.chunk.offset,
            len: self.chunk.len,
            checksum: self.checksum.clone(),
        }
    }
}

impl Drop for ChunkArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "chunk artifact removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove chunk artifact"
                );
            }
        }
    }
}
