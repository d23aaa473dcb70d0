//! Wires the Bot API client, the status message and the transfer manager.

use std::path::Path;

use anyhow::Context;
use teloxide::types::ChatId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tubesend_telegram::{StatusMessage, TelegramTransport, build_bot, format_bytes};
use tubesend_transfer::{ChunkedTransferManager, ProgressReporter, TransferReport};

use crate::Cli;
use crate::config::Config;

/// Progress updates buffered for the status message; extra updates are dropped.
const PROGRESS_CAPACITY: usize = 32;

/// Runs one transfer and prints its report as JSON on stdout.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let token = std::env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
    let bot = build_bot(&token, &config.network)?;
    let chat_id = ChatId(cli.chat_id);
    let transport = TelegramTransport::new(bot.clone(), chat_id);

    let cancel = CancellationToken::new();
    let mut manager = ChunkedTransferManager::new(config.transfer).with_cancel(cancel.clone());
    let job = manager.prepare(&cli.file, cli.kind)?;

    let mut status_task = None;
    if !cli.no_status {
        let text = format!("Preparing {}...", format_bytes(job.total_bytes()));
        match StatusMessage::send(bot, chat_id, &text).await {
            Ok(status) => {
                let (reporter, rx) = ProgressReporter::channel(PROGRESS_CAPACITY);
                manager = manager.with_progress(reporter);
                status_task = Some(status.spawn(rx));
            }
            Err(e) => tracing::warn!(error = %e, "failed to post status message"),
        }
    }

    // Ctrl+C cancels the transfer; scratch files are removed on the way out.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling transfer");
            signal_cancel.cancel();
        }
    });

    let result = manager.transfer(&job, &transport).await;

    // Dropping the manager closes the progress channel so the status task ends.
    drop(manager);
    if let Some(task) = status_task {
        wait_for_status(task).await;
    }

    let report = result?;
    if cli.delete_source {
        delete_source(&report, &cli.file);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Waits for the status message to catch up; its failure never fails the run.
async fn wait_for_status(task: JoinHandle<()>) {
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "status message task failed");
    }
}

fn delete_source(report: &TransferReport, path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(job = %report.job_id, path = %path.display(), "source removed"),
        Err(e) => tracing::warn!(
            job = %report.job_id,
            path = %path.display(),
            error = %e,
            "failed to remove source"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_status_task_is_tolerated() {
        let task = tokio::spawn(async { panic!("edit loop crashed") });
        wait_for_status(task).await;
    }

    #[tokio::test]
    async fn finished_status_task_is_awaited() {
        let task = tokio::spawn(async {});
        wait_for_status(task).await;
    }

    #[test]
    fn delete_source_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("clip.mp4");
        std::fs::write(&path, b"x").unwrap();
        let report = TransferReport {
            job_id: Default::default(),
            total_bytes: 1,
            mode: tubesend_transfer::TransferMode::SingleShot,
            parts: Vec::new(),
        };

        delete_source(&report, &path);
        assert!(!path.exists());

        // A second attempt only logs.
        delete_source(&report, &path);
    }
}
