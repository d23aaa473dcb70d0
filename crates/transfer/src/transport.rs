//! Boundary to the messaging platform.

use std::error::Error as StdError;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::types::TransferKind;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Future returned by [`Transport::upload`].
pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Delivers one file to the remote recipient.
///
/// Implemented by the chat client (see `tubesend-telegram`) and by test
/// doubles. The future resolves once the remote end acknowledged the file or
/// the delivery failed; how long that may take is governed by the client's
/// own timeouts.
pub trait Transport: Send + Sync {
    /// Uploads the file at `path` as a message of type `kind`.
    fn upload<'a>(&'a self, path: &'a Path, kind: TransferKind) -> UploadFuture<'a>;
}

/// Failure reported by a [`Transport`].
///
/// The client's own error is kept as the source, not folded into the message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps the client's own error.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
