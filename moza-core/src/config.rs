//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "server": { "host": "0.0.0.0", "port": 3000 },
//!   "auth": { "jwtSecret": "...", "tokenTtlHours": 72 },
//!   "ledger": { "identifierAttempts": 5, "rejectNonPositiveAmounts": true },
//!   "logging": { "level": "info", "format": "text" }
//! }
//! ```
//! Environment variables override the file: `MOZA_SECRET`, `MOZA_HOST`,
//! `MOZA_PORT`, `MOZA_LOG_LEVEL`, `MOZA_LOG_FORMAT`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "settings.json";

/// Longest token lifetime accepted in `auth.tokenTtlHours` (ten years)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    auth: AuthSettings,
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(default)]
    logging: LoggingSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Token signing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret; the server refuses to start while empty
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: 72,
        }
    }
}

/// Transfer and identifier policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSettings {
    /// How many identifier candidates to try before giving up
    pub identifier_attempts: u32,
    pub reject_non_positive_amounts: bool,
    pub reject_currency_mismatch: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            identifier_attempts: 5,
            reject_non_positive_amounts: true,
            reject_currency_mismatch: false,
        }
    }
}

/// Process log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Moza configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub ledger: LedgerSettings,
    pub logging: LoggingSettings,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the data directory, then apply environment overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(data_dir)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `settings.json` only
    pub fn load_file(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        Ok(Self {
            server: raw.server.clone(),
            auth: raw.auth.clone(),
            ledger: raw.ledger.clone(),
            logging: raw.logging.clone(),
            _raw_settings: raw,
        })
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("MOZA_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(host) = lookup("MOZA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MOZA_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("MOZA_PORT is not a valid port: {}", port))?;
        }
        if let Some(level) = lookup("MOZA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("MOZA_LOG_FORMAT") {
            self.logging.format = format;
        }
        Ok(())
    }

    /// Reject settings the services cannot run with
    pub fn validate(&self) -> Result<()> {
        let ttl = self.auth.token_ttl_hours;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl) {
            bail!(
                "auth.tokenTtlHours must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS,
                ttl
            );
        }
        Ok(())
    }

    /// Save config to the data directory
    /// Preserves other settings that Moza doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.server = self.server.clone();
        settings.auth = self.auth.clone();
        settings.ledger = self.ledger.clone();
        settings.logging = self.logging.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
