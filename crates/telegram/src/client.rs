use std::time::Duration;

use serde::{Deserialize, Serialize};
use teloxide::Bot;

/// Errors produced while setting up the Bot API client.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid Bot API URL {url}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

/// HTTP settings for the Bot API client.
///
/// Large uploads take minutes, so the request timeout is measured in minutes
/// rather than the few seconds a chat command needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Self-hosted Bot API server, e.g. `http://localhost:8081`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            api_url: None,
        }
    }
}

impl NetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn parsed_api_url(&self) -> Result<Option<reqwest::Url>, TelegramError> {
        self.api_url
            .as_deref()
            .map(|url| {
                reqwest::Url::parse(url).map_err(|e| TelegramError::InvalidApiUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

/// Builds a bot whose HTTP client tolerates long uploads.
pub fn build_bot(token: &str, config: &NetworkConfig) -> Result<Bot, TelegramError> {
    let api_url = config.parsed_api_url()?;

    let client = teloxide::net::default_reqwest_settings()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .build()?;

    let bot = Bot::with_client(token, client);
    Ok(match api_url {
        Some(url) => {
            tracing::info!(url = %url, "using custom Bot API URL");
            bot.set_api_url(url)
        }
        None => bot,
    })
}
