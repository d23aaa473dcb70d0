//! Sender configuration.
//!
//! Stored as TOML:
//! - Linux: `~/.config/tubesend/config.toml`
//! - Windows: `%APPDATA%/tubesend/config.toml`
//!
//! ```toml
//! [transfer]
//! max_chunk_bytes = 51380224
//! temp_dir = "/var/tmp/tubesend"
//!
//! [network]
//! connect_timeout_secs = 60
//! request_timeout_secs = 600
//! api_url = "http://localhost:8081"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tubesend_telegram::NetworkConfig;
use tubesend_transfer::TransferConfig;

/// Sender configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Loads `path`, or the default location when `path` is `None`.
    ///
    /// An explicit path must exist; a missing file at the default location
    /// yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    tracing::debug!(
                        path = %path.display(),
                        "no configuration file, using defaults"
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        tubesend_transfer::validate_chunk_size(config.transfer.max_chunk_bytes)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("tubesend").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("tubesend")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubesend_transfer::DEFAULT_MAX_CHUNK_BYTES;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.transfer.max_chunk_bytes, DEFAULT_MAX_CHUNK_BYTES);
        assert!(config.transfer.temp_dir.is_none());
        assert_eq!(config.network.request_timeout_secs, 600);
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
            [transfer]
            max_chunk_bytes = 1048576
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.transfer.max_chunk_bytes, 1_048_576);
        assert_eq!(config.network, NetworkConfig::default());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            transfer: TransferConfig {
                max_chunk_bytes: 4096,
                temp_dir: Some("/var/tmp/tubesend".into()),
            },
            network: NetworkConfig {
                api_url: Some("http://localhost:8081".into()),
                ..NetworkConfig::default()
            },
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[network]\nconnect_timeout_secs = 5\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.network.connect_timeout_secs, 5);
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&tmp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn load_rejects_zero_chunk_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nmax_chunk_bytes = 0\n").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn config_path_not_empty() {
        assert!(config_path().to_string_lossy().contains("tubesend"));
    }
}
