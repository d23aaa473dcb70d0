//! Telegram side of tubesend.
//!
//! [`TelegramTransport`] implements the transfer crate's `Transport` on top
//! of the Bot API, and [`StatusMessage`] turns the transfer progress channel
//! into a single, continuously edited chat message.

mod client;
mod status;
mod transport;

pub use client::{NetworkConfig, TelegramError, build_bot};
pub use status::{StatusMessage, format_bytes, render_progress};
pub use transport::TelegramTransport;
