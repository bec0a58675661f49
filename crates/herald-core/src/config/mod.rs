mod defaults;


use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::HeraldError;
use defaults::*;

/// Top-level Herald configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub herald: HeraldConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Key for the session record. One deployment = one session row;
    /// distinct ids keep co-hosted deployments from clobbering each other.
    #[serde(default = "default_deployment_id")]
    pub deployment_id: String,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            deployment_id: default_deployment_id(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub whatsapp: Option<WhatsAppConfig>,
}

/// WhatsApp channel config.
///
/// Protocol session data is stored at `{data_dir}/whatsapp_session/`.
/// Pairing is done by scanning a QR code or entering a pairing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Country code prepended by the number formatter (e.g. `"94"`).
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Device name shown under Linked Devices on the phone.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Delay before a reconnect attempt after a non-logout close.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Cap on consecutive reconnect attempts. Absent = retry forever.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// How long a freshly issued pairing code stays valid.
    #[serde(default = "default_pairing_expiry_secs")]
    pub pairing_expiry_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            country_code: default_country_code(),
            device_name: default_device_name(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_attempts: None,
            pairing_expiry_secs: default_pairing_expiry_secs(),
        }
    }
}

/// Persistence config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for API authentication. Empty = no auth (local-only use).
    #[serde(default)]
    pub api_key: String,
    /// Origins allowed by the CORS layer. Empty = allow any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Bulk-send defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Inter-message delay when the request doesn't specify one.
    #[serde(default = "default_bulk_delay_ms")]
    pub default_delay_ms: u64,
    /// Verify each destination is registered before sending.
    #[serde(default)]
    pub verify_numbers: bool,
    /// Max numbers processed per detection sweep.
    #[serde(default = "default_detection_limit")]
    pub detection_limit: usize,
    /// Delay between registration checks in a detection sweep.
    #[serde(default = "default_detection_delay_ms")]
    pub detection_delay_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_bulk_delay_ms(),
            verify_numbers: false,
            detection_limit: default_detection_limit(),
            detection_delay_ms: default_detection_delay_ms(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, falling back to defaults when the
/// file doesn't exist.
pub fn load(path: &str) -> Result<Config, HeraldError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| HeraldError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| HeraldError::Config(format!("failed to parse config: {e}")))?;

    Ok(config)
}
