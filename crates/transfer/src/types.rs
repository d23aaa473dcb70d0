use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TransferError;
use crate::chunked::ChunkPlan;
use crate::validation::{validate_chunk_size, validate_source};

/// Remote message type used for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Video,
    Audio,
    Document,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`TransferKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transfer kind {0:?} (expected video, audio or document)")]
pub struct ParseKindError(String);

impl FromStr for TransferKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "document" | "doc" => Ok(Self::Document),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

/// One file moving through the chunking pipeline.
///
/// The source size is measured once, when the job is created, and drives the
/// chunk plan for the rest of the job.
#[derive(Debug, Clone)]
pub struct TransferJob {
    id: Uuid,
    source: PathBuf,
    total_bytes: u64,
    max_chunk_bytes: u64,
    kind: TransferKind,
}

impl TransferJob {
    /// Creates a job for `source`, validating the file and the chunk size.
    pub fn new(
        source: impl Into<PathBuf>,
        max_chunk_bytes: u64,
        kind: TransferKind,
    ) -> Result<Self, TransferError> {
        let source = source.into();
        validate_chunk_size(max_chunk_bytes)?;
        let total_bytes = validate_source(&source)?;

        if total_bytes.div_ceil(max_chunk_bytes) > u64::from(u32::MAX) {
            return Err(TransferError::InvalidChunkSize {
                max_chunk_bytes,
                reason: "too small for this file, part count would overflow",
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            source,
            total_bytes,
            max_chunk_bytes,
            kind,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn max_chunk_bytes(&self) -> u64 {
        self.max_chunk_bytes
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Chunks of this job in upload order.
    pub fn plan(&self) -> ChunkPlan {
        ChunkPlan::new(self.total_bytes, self.max_chunk_bytes)
    }

    /// `ceil(total_bytes / max_chunk_bytes)`; zero for an empty file.
    pub fn part_count(&self) -> u32 {
        // Bounded by the check in `new`.
        u32::try_from(self.plan().part_count()).unwrap_or(u32::MAX)
    }

    /// Returns `true` when the whole file fits in one upload.
    pub fn is_single_shot(&self) -> bool {
        self.part_count() <= 1
    }

    /// Base name for chunk artifacts, taken from the source file name.
    pub(crate) fn artifact_base_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chunk".into())
    }
}

/// Lifecycle of a transfer job.
///
/// ```text
/// NotStarted -> Splitting(1) -> Uploading(1) -> Splitting(2) -> ... -> Uploading(n) -> Done
///      \________________ any non-terminal state ________________________________ -> Failed
/// ```
///
/// Single-shot jobs skip `Splitting` and go straight to `Uploading(1/1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferState {
    NotStarted,
    Splitting { ordinal: u32, total: u32 },
    Uploading { ordinal: u32, total: u32 },
    Done,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns `true` if moving from `self` to `next` follows the lifecycle.
    pub fn can_transition_to(&self, next: &TransferState) -> bool {
        use TransferState::*;

        if self.is_terminal() {
            return false;
        }
        match (*self, *next) {
            (_, Failed) => true,
            (NotStarted, Splitting { ordinal: 1, .. }) => true,
            (NotStarted, Uploading { ordinal: 1, total }) => total <= 1,
            (Splitting { .. }, Uploading { .. }) => self.part() == next.part(),
            (Uploading { .. }, Splitting { ordinal, total }) => {
                ordinal > 1 && ordinal <= total && self.part() == Some((ordinal - 1, total))
            }
            (Uploading { ordinal, total }, Done) => ordinal == total.max(1),
            _ => false,
        }
    }

    fn part(&self) -> Option<(u32, u32)> {
        match *self {
            Self::Splitting { ordinal, total } | Self::Uploading { ordinal, total } => {
                Some((ordinal, total))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Splitting { ordinal, total } => write!(f, "splitting {ordinal}/{total}"),
            Self::Uploading { ordinal, total } => write!(f, "uploading {ordinal}/{total}"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// How a job was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    /// The whole source went out in one upload.
    SingleShot,
    /// The source was split into `.partNNN` artifacts.
    Chunked,
}

/// One uploaded unit, with the digest the receiver can verify against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartReceipt {
    pub ordinal: u32,
    pub offset: u64,
    pub len: u64,
    /// SHA-256 hex digest of the uploaded bytes.
    pub checksum: String,
}

/// Summary of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub job_id: Uuid,
    pub total_bytes: u64,
    pub mode: TransferMode,
    pub parts: Vec<PartReceipt>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_parse_and_display() {
        assert_eq!("video".parse::<TransferKind>().unwrap(), TransferKind::Video);
        assert_eq!(" Audio ".parse::<TransferKind>().unwrap(), TransferKind::Audio);
        assert_eq!("doc".parse::<TransferKind>().unwrap(), TransferKind::Document);
        assert!("gif".parse::<TransferKind>().is_err());
        assert_eq!(TransferKind::Document.to_string(), "document");
    }

    #[test]
    fn kind_serde_lowercase() {
        let json = serde_json::to_string(&TransferKind::Audio).unwrap();
        assert_eq!(json, "\"audio\"");
        let parsed: TransferKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(parsed, TransferKind::Video);
    }

    #[test]
    fn job_measures_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        let job = TransferJob::new(&path, 4, TransferKind::Video).unwrap();
        assert_eq!(job.total_bytes(), 10);
        assert_eq!(job.part_count(), 3);
        assert!(!job.is_single_shot());
        assert_eq!(job.artifact_base_name(), "clip.mp4");
        assert_eq!(job.plan().count(), 3);
    }

    #[test]
    fn job_small_file_is_single_shot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.m4a");
        std::fs::write(&path, b"abc").unwrap();

        let job = TransferJob::new(&path, 4, TransferKind::Audio).unwrap();
        assert!(job.is_single_shot());
        assert_eq!(job.part_count(), 1);

        std::fs::write(&path, b"").unwrap();
        let job = TransferJob::new(&path, 4, TransferKind::Audio).unwrap();
        assert!(job.is_single_shot());
        assert_eq!(job.part_count(), 0);
    }

    #[test]
    fn job_rejects_missing_source() {
        let dir = TempDir::new().unwrap();
        let err =
            TransferJob::new(dir.path().join("nope.mp4"), 4, TransferKind::Video).unwrap_err();
        assert!(matches!(err, TransferError::SourceNotFound { .. }));
    }

    #[test]
    fn job_rejects_zero_chunk_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"x").unwrap();

        let err = TransferJob::new(&path, 0, TransferKind::Video).unwrap_err();
        assert!(matches!(err, TransferError::InvalidChunkSize { max_chunk_bytes: 0, .. }));
    }

    #[test]
    fn job_ids_are_unique() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"x").unwrap();

        let a = TransferJob::new(&path, 4, TransferKind::Video).unwrap();
        let b = TransferJob::new(&path, 4, TransferKind::Video).unwrap();
        assert_ne!(a.id(), b.id());
    }

    fn splitting(ordinal: u32, total: u32) -> TransferState {
        TransferState::Splitting { ordinal, total }
    }

    fn uploading(ordinal: u32, total: u32) -> TransferState {
        TransferState::Uploading { ordinal, total }
    }

    #[test]
    fn chunked_lifecycle_transitions() {
        use TransferState::*;

        let path = [
            NotStarted,
            splitting(1, 2),
            uploading(1, 2),
            splitting(2, 2),
            uploading(2, 2),
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn single_shot_lifecycle_transitions() {
        use TransferState::*;

        let uploading_whole = uploading(1, 1);
        assert!(NotStarted.can_transition_to(&uploading_whole));
        assert!(uploading_whole.can_transition_to(&Done));
        assert!(!NotStarted.can_transition_to(&uploading(1, 3)));
    }

    #[test]
    fn rejected_transitions() {
        use TransferState::*;

        // Skipping or repeating an ordinal.
        assert!(!uploading(1, 3).can_transition_to(&splitting(3, 3)));
        assert!(!uploading(1, 3).can_transition_to(&splitting(1, 3)));
        assert!(!splitting(1, 3).can_transition_to(&uploading(2, 3)));
        assert!(!NotStarted.can_transition_to(&splitting(2, 3)));
        // Finishing early.
        assert!(!uploading(2, 3).can_transition_to(&Done));
        // Terminal states stay terminal.
        assert!(!Done.can_transition_to(&Failed));
        assert!(!Failed.can_transition_to(&NotStarted));
        // Any live state may fail.
        assert!(splitting(2, 3).can_transition_to(&Failed));
        assert!(NotStarted.can_transition_to(&Failed));
    }

    #[test]
    fn state_display() {
        assert_eq!(uploading(2, 5).to_string(), "uploading 2/5");
        assert_eq!(splitting(1, 5).to_string(), "splitting 1/5");
        assert_eq!(TransferState::Failed.to_string(), "failed");
    }
}
