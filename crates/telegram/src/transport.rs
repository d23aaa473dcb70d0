use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::InputFile;
use tubesend_transfer::{TransferKind, Transport, TransportError, UploadFuture};

/// Sends files to one chat through the Bot API.
///
/// `Video` goes out with `sendVideo`, `Audio` with `sendAudio` and `Document`
/// with `sendDocument`. Each call waits for Telegram to acknowledge the
/// message, bounded by the client's request timeout.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramTransport {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

impl Transport for TelegramTransport {
    fn upload<'a>(&'a self, path: &'a Path, kind: TransferKind) -> UploadFuture<'a> {
        Box::pin(async move {
            let file = InputFile::file(path.to_path_buf());
            tracing::debug!(chat = self.chat_id.0, path = %path.display(), %kind, "sending file");

            let sent = match kind {
                TransferKind::Video => self.bot.send_video(self.chat_id, file).await,
                TransferKind::Audio => self.bot.send_audio(self.chat_id, file).await,
                TransferKind::Document => self.bot.send_document(self.chat_id, file).await,
            };

            match sent {
                Ok(message) => {
                    tracing::debug!(
                        chat = self.chat_id.0,
                        message = message.id.0,
                        "file delivered"
                    );
                    Ok(())
                }
                Err(e) => Err(TransportError::with_source(
                    format!("send {kind} {}", display_name(path)),
                    e,
                )),
            }
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
