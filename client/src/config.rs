use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chat_shared::API_PREFIX;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Looked up in the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "chat-client.json";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOG_FILE: &str = "chat-client.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_prefix: String,
    /// Upper bound for every request. `0` waits forever.
    pub request_timeout_secs: u64,
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: API_PREFIX.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

pub async fn load_config(path: &Path) -> Result<ClientConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: ClientConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(config)
}

/// Terminal client for the adaptive chatbot backend.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "chat", version)]
pub struct Cli {
    /// JSON config file. Defaults to ./chat-client.json when present.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Backend root URL, e.g. http://127.0.0.1:8000
    #[arg(long)]
    pub base_url: Option<String>,

    /// Request timeout in seconds (0 disables it).
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Config file (explicit or default) with command line overrides applied.
    pub async fn resolve(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path).await?,
            None if fs::try_exists(CONFIG_FILE).await.unwrap_or(false) => {
                load_config(Path::new(CONFIG_FILE)).await?
            }
            None => ClientConfig::default(),
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        Ok(config)
    }
}
