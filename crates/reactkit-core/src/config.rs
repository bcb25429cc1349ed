use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXPIRATION_MS: u64 = 120_000; // 2 minutes of inactivity
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;

pub const LEFT_ARROW: &str = "\u{2b05}\u{fe0f}"; // ⬅️
pub const RIGHT_ARROW: &str = "\u{27a1}\u{fe0f}"; // ➡️

/// Top-level config (reactkit.toml + REACTKIT_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactkitConfig {
    pub buttons: ButtonsConfig,
    pub pagination: PaginationConfig,
    pub retry: RetryConfig,
}

/// Defaults applied to every reaction-button registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonsConfig {
    /// How long a registration lives before it is cancelled automatically.
    #[serde(default = "default_expiration_ms")]
    pub expiration_ms: u64,
    /// Remove the bot's buttons from the message when a registration ends.
    /// When false the reactions stay in place but stop doing anything.
    #[serde(default = "bool_true")]
    pub remove_on_expiry: bool,
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        Self {
            expiration_ms: DEFAULT_EXPIRATION_MS,
            remove_on_expiry: true,
        }
    }
}

impl ButtonsConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_millis(self.expiration_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Quiet window used to coalesce page edits.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "bool_true")]
    pub show_arrows: bool,
    #[serde(default = "default_left_arrow")]
    pub left_arrow: String,
    #[serde(default = "default_right_arrow")]
    pub right_arrow: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            show_arrows: true,
            left_arrow: default_left_arrow(),
            right_arrow: default_right_arrow(),
        }
    }
}

impl PaginationConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Bounded retry for transport calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_expiration_ms() -> u64 {
    DEFAULT_EXPIRATION_MS
}
fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_left_arrow() -> String {
    LEFT_ARROW.to_string()
}
fn default_right_arrow() -> String {
    RIGHT_ARROW.to_string()
}
fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}
fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}
fn default_retry_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}

impl ReactkitConfig {
    /// Load config from a TOML file with REACTKIT_* env var overrides.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `REACTKIT_BUTTONS__EXPIRATION_MS=30000`. A missing file is not an
    /// error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ReactkitConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("REACTKIT_").split("__"))
            .extract()
            .map_err(|e| {
                let err = crate::error::CoreError::Config(e.to_string());
                tracing::warn!(code = err.code(), path = %path, error = %err, "configuration rejected");
                err
            })?;

        tracing::debug!(path = %path, "configuration loaded");
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.reactkit/reactkit.toml", home)
}
