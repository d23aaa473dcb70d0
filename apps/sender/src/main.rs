//! tubesend: deliver a finished media file to a Telegram chat.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tubesend_transfer::TransferKind;

/// Send a file to a Telegram chat, in parts when it exceeds the upload cap.
#[derive(Debug, Parser)]
#[command(name = "tubesend", version, about)]
pub struct Cli {
    /// File to send.
    pub file: PathBuf,

    /// Destination chat id.
    #[arg(long, allow_negative_numbers = true)]
    pub chat_id: i64,

    /// How the file is presented in the chat: video, audio or document.
    #[arg(long, default_value = "video")]
    pub kind: TransferKind,

    /// Configuration file (defaults to ~/.config/tubesend/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Remove the source file after a successful transfer.
    #[arg(long)]
    pub delete_source: bool,

    /// Do not post a progress message to the chat.
    #[arg(long)]
    pub no_status: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the transfer report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting tubesend");

    let config = config::Config::load(cli.config.as_deref())?;
    tracing::debug!(
        max_chunk_bytes = config.transfer.max_chunk_bytes,
        scratch = %config.transfer.scratch_root().display(),
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli, config))
}
