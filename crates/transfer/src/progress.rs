use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::types::TransferState;

/// Default sliding window for throughput estimates.
const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

/// Default cap on retained samples.
const DEFAULT_MAX_SAMPLES: usize = 100;

/// Snapshot emitted on every state change of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferProgress {
    pub job_id: Uuid,
    pub state: TransferState,
    /// Bytes of parts whose upload already completed.
    pub bytes_sent: u64,
    pub total_bytes: u64,
    /// Throughput over the recent window; 0.0 until a part completed.
    pub bytes_per_second: f64,
    /// Estimated time left at the current throughput.
    pub eta: Option<Duration>,
}

/// Fire-and-forget sender for [`TransferProgress`] updates.
///
/// Uses `try_send`: a full or closed channel drops the update instead of
/// blocking or failing the transfer.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::Sender<TransferProgress>>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::Sender<TransferProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a reporter and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransferProgress>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// A reporter that discards every update.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn report(&self, progress: TransferProgress) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(progress) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => {
                tracing::trace!(
                    job = %p.job_id,
                    state = %p.state,
                    "progress channel full, update dropped"
                );
            }
            Err(TrySendError::Closed(p)) => {
                tracing::trace!(
                    job = %p.job_id,
                    state = %p.state,
                    "progress receiver gone, update dropped"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
///
/// Owned by a single job, so it needs no locking.
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 30 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            max_samples: max_samples.unwrap_or(DEFAULT_MAX_SAMPLES).max(2),
            window_size: window_size.unwrap_or(DEFAULT_WINDOW),
        }
    }

    /// Records a sample of `bytes` transferred at the current instant.
    pub fn add_sample(&mut self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&mut self, bytes: u64, now: Instant) {
        self.samples.push_back(SpeedSample {
            bytes,
            timestamp: now,
        });

        // Prune samples outside the window.
        if let Some(cutoff) = now.checked_sub(self.window_size) {
            while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
                self.samples.pop_front();
            }
        }

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than 2 samples. The first sample only marks
    /// the start of the window, its bytes are not counted.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let bytes: u64 = self.samples.iter().skip(1).map(|s| s.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }
}
