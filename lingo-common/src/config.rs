//! Configuration loading
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LINGO_<KEY>`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error; the service starts on defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable prefix for all settings
pub const ENV_PREFIX: &str = "LINGO_";

/// Default bind address for the HTTP service
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default webhook timestamp tolerance (seconds)
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Raw contents of the TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub jwt_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: Option<i64>,
    pub payments_base_url: Option<String>,
    pub payments_api_key: Option<String>,
    pub individual_price_id: Option<String>,
    pub organization_price_id: Option<String>,
    pub app_domain: Option<String>,
    pub dashboard_domain: Option<String>,
    pub speech_base_url: Option<String>,
    pub speech_api_key: Option<String>,
    pub storage_root: Option<PathBuf>,
    pub generator_base_url: Option<String>,
    pub generator_api_key: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }
}

/// Command-line overrides shared by the Lingo binaries
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub bind: Option<String>,
}

/// Payment provider settings
#[derive(Debug, Clone, Default)]
pub struct PaymentsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub individual_price_id: String,
    pub organization_price_id: String,
    /// Return URL base for individual checkouts
    pub app_domain: String,
    /// Return URL base for organization checkouts
    pub dashboard_domain: String,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub jwt_secret: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    pub payments: PaymentsConfig,
    pub speech_base_url: String,
    pub speech_api_key: Option<String>,
    pub storage_root: PathBuf,
    pub generator_base_url: String,
    pub generator_api_key: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from CLI overrides, the process environment and the
    /// first TOML file found.
    pub fn load(cli: &CliOverrides) -> Result<Self> {
        let toml = match locate_config_file(cli.config.as_deref())? {
            Some(path) => {
                info!("Loading config file: {}", path.display());
                TomlConfig::from_file(&path)?
            }
            None => {
                warn!("No config file found, using environment and defaults");
                TomlConfig::default()
            }
        };

        Self::resolve(cli, |key| std::env::var(key).ok(), toml)
    }

    /// Resolve every setting from its sources.
    ///
    /// `env` looks up a fully prefixed variable name (e.g. `LINGO_BIND_ADDR`).
    pub fn resolve<F>(cli: &CliOverrides, env: F, toml: TomlConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| -> Option<String> {
            env(&format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase()))
                .filter(|v| !v.trim().is_empty())
        };

        let database_path = cli
            .database
            .clone()
            .or_else(|| lookup("database_path").map(PathBuf::from))
            .or(toml.database_path)
            .unwrap_or_else(|| default_data_dir().join("lingo.db"));

        let bind_addr = cli
            .bind
            .clone()
            .or_else(|| lookup("bind_addr"))
            .or(toml.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let webhook_tolerance_secs = match lookup("webhook_tolerance_secs") {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                Error::Config(format!("Invalid webhook_tolerance_secs: {}", raw))
            })?,
            None => toml
                .webhook_tolerance_secs
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS),
        };
        if webhook_tolerance_secs <= 0 {
            return Err(Error::Config(
                "webhook_tolerance_secs must be positive".to_string(),
            ));
        }

        let payments = PaymentsConfig {
            base_url: lookup("payments_base_url")
                .or(toml.payments_base_url)
                .unwrap_or_else(|| "http://127.0.0.1:12111".to_string()),
            api_key: lookup("payments_api_key").or(toml.payments_api_key),
            individual_price_id: lookup("individual_price_id")
                .or(toml.individual_price_id)
                .unwrap_or_default(),
            organization_price_id: lookup("organization_price_id")
                .or(toml.organization_price_id)
                .unwrap_or_default(),
            app_domain: lookup("app_domain")
                .or(toml.app_domain)
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            dashboard_domain: lookup("dashboard_domain")
                .or(toml.dashboard_domain)
                .unwrap_or_else(|| "http://localhost:3001".to_string()),
        };

        Ok(Self {
            database_path,
            bind_addr,
            jwt_secret: lookup("jwt_secret").or(toml.jwt_secret),
            webhook_secret: lookup("webhook_secret").or(toml.webhook_secret),
            webhook_tolerance_secs,
            payments,
            speech_base_url: lookup("speech_base_url")
                .or(toml.speech_base_url)
                .unwrap_or_else(|| "http://127.0.0.1:8090".to_string()),
            speech_api_key: lookup("speech_api_key").or(toml.speech_api_key),
            storage_root: lookup("storage_root")
                .map(PathBuf::from)
                .or(toml.storage_root)
                .unwrap_or_else(|| default_data_dir().join("content")),
            generator_base_url: lookup("generator_base_url")
                .or(toml.generator_base_url)
                .unwrap_or_else(|| "http://127.0.0.1:8091".to_string()),
            generator_api_key: lookup("generator_api_key").or(toml.generator_api_key),
        })
    }

    /// JWT secret for bearer token validation; the API cannot start without it
    pub fn require_jwt_secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| Error::Config("jwt_secret is not configured".to_string()))
    }
}

/// Find the TOML config file.
///
/// An explicit path must exist; otherwise the user config directory is
/// tried before `/etc/lingo/config.toml`.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join("lingo").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let system_config = PathBuf::from("/etc/lingo/config.toml");
    if system_config.exists() {
        return Ok(Some(system_config));
    }

    Ok(None)
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("lingo"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lingo"))
    } else {
        // ~/.local/share/lingo on Linux, ~/Library/Application Support/lingo on macOS
        dirs::data_local_dir()
            .map(|d| d.join("lingo"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lingo"))
    }
}
