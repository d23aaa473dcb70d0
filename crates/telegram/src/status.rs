//! One chat message that follows a transfer.

use std::fmt::Write as _;
use std::time::Duration;

use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tubesend_transfer::{TransferProgress, TransferState};

/// A status message edited in place as progress updates arrive.
pub struct StatusMessage {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

impl StatusMessage {
    /// Posts the initial status text.
    pub async fn send(bot: Bot, chat_id: ChatId, text: &str) -> Result<Self, RequestError> {
        let message = bot.send_message(chat_id, text).await?;
        Ok(Self {
            bot,
            chat_id,
            message_id: message.id,
        })
    }

    /// Follows `rx` on a background task until the sender side is dropped.
    pub fn spawn(self, rx: mpsc::Receiver<TransferProgress>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Edits the message for every update that changes its text.
    ///
    /// Edit failures (rate limits, deleted message) are logged and skipped;
    /// they never reach the transfer.
    pub async fn run(self, mut rx: mpsc::Receiver<TransferProgress>) {
        let mut last = String::new();
        while let Some(progress) = rx.recv().await {
            let Some(text) = render_progress(&progress) else {
                continue;
            };
            if text == last {
                continue;
            }
            if let Err(e) = self
                .bot
                .edit_message_text(self.chat_id, self.message_id, text.clone())
                .await
            {
                tracing::debug!(error = %e, "failed to update status message");
            }
            last = text;
        }
    }
}

/// Text shown for `progress`, or `None` for states not worth an edit.
pub fn render_progress(progress: &TransferProgress) -> Option<String> {
    match progress.state {
        TransferState::NotStarted | TransferState::Splitting { .. } => None,
        TransferState::Uploading { total, .. } if total <= 1 => Some(format!(
            "Uploading {}...",
            format_bytes(progress.total_bytes)
        )),
        TransferState::Uploading { ordinal, total } => {
            let mut text = format!(
                "Uploading part {ordinal}/{total} ({} of {})",
                format_bytes(progress.bytes_sent),
                format_bytes(progress.total_bytes)
            );
            if progress.bytes_per_second >= 1.0 {
                let _ = write!(text, ", {}/s", format_bytes(progress.bytes_per_second as u64));
                if let Some(eta) = progress.eta {
                    let _ = write!(text, ", {} left", format_eta(eta));
                }
            }
            Some(text)
        }
        TransferState::Done => Some(format!("Sent {}", format_bytes(progress.total_bytes))),
        TransferState::Failed => Some("Upload failed".to_string()),
    }
}

/// Remaining time in whole seconds: `45s`, `3m 05s`, `1h 02m`.
fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m {:02}s", secs / 60, secs % 60),
        _ => format!("{}h {:02}m", secs / 3600, secs % 3600 / 60),
    }
}

/// Human-readable size in binary units: `512 B`, `1.5 KB`, `49.0 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn uploading(ordinal: u32, total: u32) -> TransferState {
        TransferState::Uploading { ordinal, total }
    }

    fn progress(state: TransferState, bytes_sent: u64, bytes_per_second: f64) -> TransferProgress {
        TransferProgress {
            job_id: Uuid::nil(),
            state,
            bytes_sent,
            total_bytes: 150 * 1024 * 1024,
            bytes_per_second,
            eta: None,
        }
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(49 * 1024 * 1024), "49.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn splitting_is_not_rendered() {
        let splitting = TransferState::Splitting {
            ordinal: 1,
            total: 4,
        };
        assert_eq!(render_progress(&progress(splitting, 0, 0.0)), None);
        assert_eq!(render_progress(&progress(TransferState::NotStarted, 0, 0.0)), None);
    }

    #[test]
    fn uploading_part_with_speed() {
        let p = progress(uploading(2, 4), 49 * 1024 * 1024, 2.0 * 1024.0 * 1024.0);
        assert_eq!(
            render_progress(&p).unwrap(),
            "Uploading part 2/4 (49.0 MB of 150.0 MB), 2.0 MB/s"
        );
    }

    #[test]
    fn uploading_part_with_time_left() {
        let mut p = progress(uploading(3, 4), 98 * 1024 * 1024, 1024.0 * 1024.0);
        p.eta = Some(Duration::from_secs(52));
        assert_eq!(
            render_progress(&p).unwrap(),
            "Uploading part 3/4 (98.0 MB of 150.0 MB), 1.0 MB/s, 52s left"
        );
    }

    #[test]
    fn format_eta_units() {
        assert_eq!(format_eta(Duration::from_millis(900)), "0s");
        assert_eq!(format_eta(Duration::from_secs(185)), "3m 05s");
        assert_eq!(format_eta(Duration::from_secs(3720)), "1h 02m");
    }

    #[test]
    fn uploading_first_part_without_speed() {
        let p = progress(uploading(1, 4), 0, 0.0);
        assert_eq!(
            render_progress(&p).unwrap(),
            "Uploading part 1/4 (0 B of 150.0 MB)"
        );
    }

    #[test]
    fn single_shot_and_terminal_states() {
        let p = progress(uploading(1, 1), 0, 0.0);
        assert_eq!(render_progress(&p).unwrap(), "Uploading 150.0 MB...");
        assert_eq!(
            render_progress(&progress(TransferState::Done, 0, 0.0)).unwrap(),
            "Sent 150.0 MB"
        );
        assert_eq!(
            render_progress(&progress(TransferState::Failed, 0, 0.0)).unwrap(),
            "Upload failed"
        );
    }
}
