use crate::oauth::OAuth1aConsumerConfig;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete credential layer configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub autoconnect: AutoConnectConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

/// Encrypted store configuration
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Base64 encoded 32-byte administrator secret. Usually supplied via
    /// `SQUASH_CREDENTIALS_SECRET` rather than written to the file.
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_database_path() -> String {
    "credentials.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            secret: None,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database_path", &self.database_path)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Auto-connect on login
#[derive(Debug, Clone, Deserialize)]
pub struct AutoConnectConfig {
    #[serde(default = "default_autoconnect_enabled")]
    pub enabled: bool,
    /// Upper bound on concurrently running auto-connect batches
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_autoconnect_enabled() -> bool {
    true
}

fn default_max_concurrent_tasks() -> usize {
    4
}

impl Default for AutoConnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_autoconnect_enabled(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

/// OAuth1a consumers and pending exchange lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_pending_expiry")]
    pub pending_expiry_seconds: i64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    #[serde(default)]
    pub servers: Vec<OAuth1aConsumerConfig>,
}

fn default_pending_expiry() -> i64 {
    600
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            pending_expiry_seconds: default_pending_expiry(),
            cleanup_interval_seconds: default_cleanup_interval(),
            servers: Vec::new(),
        }
    }
}

impl CredentialsConfig {
    /// Applies environment variable overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = var("SQUASH_CREDENTIALS_SECRET") {
            if !secret.trim().is_empty() {
                self.store.secret = Some(secret);
            }
        }
        if let Some(path) = var("SQUASH_CREDENTIALS_DB") {
            self.store.database_path = path;
        }
        if let Some(v) = var("SQUASH_AUTOCONNECT_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                self.autoconnect.enabled = b;
            }
        }
        if let Some(v) = var("SQUASH_AUTOCONNECT_MAX_TASKS") {
            if let Ok(n) = v.parse::<usize>() {
                self.autoconnect.max_concurrent_tasks = n.max(1);
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<CredentialsConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
    let config: CredentialsConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config {}", path))?;
    Ok(config)
}
