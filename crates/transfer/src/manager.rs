//! Sequential chunked upload of one file per job.
//!
//! Each job owns a scratch directory under [`TransferConfig::scratch_root`].
//! At most one chunk artifact exists in it at a time, and both the artifact
//! and the directory are removed by their guards on every exit path,
//! including when the `transfer` future itself is dropped.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TransferError;
use crate::chunked::{Chunk, ChunkArtifact, calculate_file_checksum};
use crate::config::TransferConfig;
use crate::progress::{ProgressReporter, SpeedCalculator, TransferProgress};
use crate::transport::Transport;
use crate::types::{
    PartReceipt, TransferJob, TransferKind, TransferMode, TransferReport, TransferState,
};
use crate::validation::validate_source;

/// Moves files through a size-capped [`Transport`].
pub struct ChunkedTransferManager {
    config: TransferConfig,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl Default for ChunkedTransferManager {
    fn default() -> Self {
        Self::new(TransferConfig::default())
    }
}

impl ChunkedTransferManager {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            progress: ProgressReporter::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sends a [`TransferProgress`] on every state change.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Aborts transfers when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the token that cancels this manager's transfers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Creates a job for `source` using the configured chunk size.
    pub fn prepare(
        &self,
        source: impl Into<PathBuf>,
        kind: TransferKind,
    ) -> Result<TransferJob, TransferError> {
        TransferJob::new(source, self.config.max_chunk_bytes, kind)
    }

    /// Delivers `job` through `transport`.
    ///
    /// Files that fit in one chunk are uploaded as-is. Larger files are split
    /// into `.partNNN` artifacts uploaded strictly in order; the first failure
    /// aborts the job and later parts are never produced. The source file is
    /// never modified or removed.
    pub async fn transfer(
        &self,
        job: &TransferJob,
        transport: &dyn Transport,
    ) -> Result<TransferReport, TransferError> {
        let mut tracker = JobTracker::new(job, &self.progress);
        let result = self.run(job, transport, &mut tracker).await;

        match &result {
            Ok(report) => {
                tracker.enter(TransferState::Done);
                info!(
                    job = %job.id(),
                    mode = ?report.mode,
                    parts = report.parts.len(),
                    bytes = report.total_bytes,
                    "transfer finished"
                );
            }
            Err(e) => {
                tracker.enter(TransferState::Failed);
                warn!(job = %job.id(), error = %error_chain(e), "transfer failed");
            }
        }
        result
    }

    async fn run(
        &self,
        job: &TransferJob,
        transport: &dyn Transport,
        tracker: &mut JobTracker<'_>,
    ) -> Result<TransferReport, TransferError> {
        // The file may have gone away since the job was prepared.
        validate_source(job.source())?;

        let total = job.part_count();
        info!(
            job = %job.id(),
            source = %job.source().display(),
            bytes = job.total_bytes(),
            parts = total,
            kind = %job.kind(),
            "transfer started"
        );

        if job.is_single_shot() {
            self.send_whole(job, transport, tracker).await
        } else {
            self.send_chunked(job, transport, tracker, total).await
        }
    }

    /// Single-shot path: no scratch directory, no artifacts.
    async fn send_whole(
        &self,
        job: &TransferJob,
        transport: &dyn Transport,
        tracker: &mut JobTracker<'_>,
    ) -> Result<TransferReport, TransferError> {
        self.check_cancelled(1, 1)?;

        let checksum = {
            let path = job.source().to_path_buf();
            tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
                .await
                .unwrap_or_else(|e| Err(io::Error::other(format!("checksum task failed: {e}"))))
                .map_err(|source| TransferError::ChunkRead {
                    ordinal: 1,
                    total: 1,
                    source,
                })?
        };

        tracker.enter(TransferState::Uploading {
            ordinal: 1,
            total: 1,
        });
        self.upload(transport, job.source(), job.kind(), 1, 1)
            .await?;
        tracker.record_sent(job.total_bytes());

        Ok(TransferReport {
            job_id: job.id(),
            total_bytes: job.total_bytes(),
            mode: TransferMode::SingleShot,
            parts: vec![PartReceipt {
                ordinal: 1,
                offset: 0,
                len: job.total_bytes(),
                checksum,
            }],
        })
    }

    async fn send_chunked(
        &self,
        job: &TransferJob,
        transport: &dyn Transport,
        tracker: &mut JobTracker<'_>,
        total: u32,
    ) -> Result<TransferReport, TransferError> {
        let root = self.config.scratch_root();
        std::fs::create_dir_all(&root).map_err(TransferError::TempDir)?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("tubesend-{}-", job.id()))
            .tempdir_in(&root)
            .map_err(TransferError::TempDir)?;
        debug!(job = %job.id(), dir = %scratch.path().display(), "scratch directory created");

        // Shared with each blocking copy, so the directory outlives a copy
        // still running after this future is dropped.
        let scratch = Arc::new(scratch);
        let result = self
            .send_parts(job, transport, tracker, &scratch, total)
            .await;

        if let Ok(scratch) = Arc::try_unwrap(scratch) {
            let dir = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                warn!(
                    job = %job.id(),
                    dir = %dir.display(),
                    error = %e,
                    "failed to remove scratch directory"
                );
            }
        }
        result
    }

    async fn send_parts(
        &self,
        job: &TransferJob,
        transport: &dyn Transport,
        tracker: &mut JobTracker<'_>,
        scratch: &Arc<TempDir>,
        total: u32,
    ) -> Result<TransferReport, TransferError> {
        let base = job.artifact_base_name();
        let mut parts = Vec::with_capacity(total as usize);

        for chunk in job.plan() {
            let ordinal = chunk.ordinal;
            self.check_cancelled(ordinal, total)?;

            tracker.enter(TransferState::Splitting { ordinal, total });
            let artifact = self
                .materialize(job.source(), chunk, scratch, &base, total)
                .await?;

            tracker.enter(TransferState::Uploading { ordinal, total });
            debug!(job = %job.id(), ordinal, total, bytes = chunk.len, "uploading part");
            let uploaded = self
                .upload(transport, artifact.path(), job.kind(), ordinal, total)
                .await;

            // Release the disk space before deciding what happens next.
            let receipt = artifact.receipt();
            drop(artifact);
            uploaded?;

            tracker.record_sent(chunk.len);
            parts.push(receipt);
        }

        Ok(TransferReport {
            job_id: job.id(),
            total_bytes: job.total_bytes(),
            mode: TransferMode::Chunked,
            parts,
        })
    }

    async fn materialize(
        &self,
        source: &Path,
        chunk: Chunk,
        scratch: &Arc<TempDir>,
        base: &str,
        total: u32,
    ) -> Result<ChunkArtifact, TransferError> {
        let source = source.to_path_buf();
        let scratch = Arc::clone(scratch);
        let base = base.to_string();

        tokio::task::spawn_blocking(move || {
            ChunkArtifact::materialize(&source, chunk, scratch.path(), &base)
        })
        .await
        .unwrap_or_else(|e| Err(io::Error::other(format!("chunk task failed: {e}"))))
        .map_err(|source| TransferError::ChunkRead {
            ordinal: chunk.ordinal,
            total,
            source,
        })
    }

    async fn upload(
        &self,
        transport: &dyn Transport,
        path: &Path,
        kind: TransferKind,
        ordinal: u32,
        total: u32,
    ) -> Result<(), TransferError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled { ordinal, total }),
            result = transport.upload(path, kind) => {
                result.map_err(|source| TransferError::Upload {
                    ordinal,
                    total,
                    source,
                })
            }
        }
    }

    fn check_cancelled(&self, ordinal: u32, total: u32) -> Result<(), TransferError> {
        if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled { ordinal, total })
        } else {
            Ok(())
        }
    }
}

/// Uploads `source` with a default manager.
///
/// Convenience for callers that need neither progress nor cancellation.
pub async fn transfer(
    source: impl Into<PathBuf>,
    max_chunk_bytes: u64,
    kind: TransferKind,
    transport: &dyn Transport,
) -> Result<TransferReport, TransferError> {
    let manager = ChunkedTransferManager::new(TransferConfig {
        max_chunk_bytes,
        ..TransferConfig::default()
    });
    let job = manager.prepare(source, kind)?;
    manager.transfer(&job, transport).await
}

/// Renders `err` and its sources as `outer: cause: root`.
fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        next = cause.source();
    }
    text
}

/// Per-job state machine; publishes every transition to the progress channel.
struct JobTracker<'a> {
    job: &'a TransferJob,
    progress: &'a ProgressReporter,
    state: TransferState,
    bytes_sent: u64,
    speed: SpeedCalculator,
}

impl<'a> JobTracker<'a> {
    fn new(job: &'a TransferJob, progress: &'a ProgressReporter) -> Self {
        let mut speed = SpeedCalculator::default();
        speed.add_sample(0);
        Self {
            job,
            progress,
            state: TransferState::NotStarted,
            bytes_sent: 0,
            speed,
        }
    }

    fn enter(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "invalid transition {} -> {next}",
            self.state
        );
        tracing::trace!(job = %self.job.id(), from = %self.state, to = %next, "state change");
        self.state = next;
        self.progress.report(TransferProgress {
            job_id: self.job.id(),
            state: next,
            bytes_sent: self.bytes_sent,
            total_bytes: self.job.total_bytes(),
            bytes_per_second: self.speed.bytes_per_second(),
            eta: self
                .speed
                .eta(self.job.total_bytes().saturating_sub(self.bytes_sent)),
        });
    }

    fn record_sent(&mut self, bytes: u64) {
        self.bytes_sent += bytes;
        self.speed.add_sample(bytes);
    }
}
