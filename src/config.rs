use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Overrides `postgres_url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Overrides `token.symmetric_key`
pub const TOKEN_SYMMETRIC_KEY_ENV: &str = "TOKEN_SYMMETRIC_KEY";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL of the ledger store
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub postgres_max_connections: u32,
    pub token: TokenConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenConfig {
    /// HS256 secret, at least 32 characters
    pub symmetric_key: String,
    pub access_token_duration_secs: i64,
}

impl TokenConfig {
    pub fn access_token_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_duration_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TransferConfig {
    /// Roll back a transfer still running after this long (0 or absent = no limit)
    #[serde(default)]
    pub unit_timeout_ms: Option<u64>,
}

impl TransferConfig {
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn default_max_connections() -> u32 {
    20
}

impl AppConfig {
    /// Load `config/{env}.yaml` and apply environment overrides
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.postgres_url = Some(url);
        }
        if let Some(key) = var(TOKEN_SYMMETRIC_KEY_ENV).filter(|v| !v.is_empty()) {
            self.token.symmetric_key = key;
        }
    }
}
