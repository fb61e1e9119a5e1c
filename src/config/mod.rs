//! Configuration for the fragment server and widgets
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/speakersheet/config.toml)
//! 3. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod logging;
mod serialization;
mod widgets;

#[cfg(test)]
mod tests;

pub use logging::{FileLogging, LogFormat, LogRotation, LoggingConfig};
pub use widgets::{FileWidgets, WidgetsConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_SEARCH_LIMIT: usize = 20;

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the fragment server binds to
    pub bind_addr: SocketAddr,

    /// Origin that relative template and search URLs resolve against
    pub origin: String,

    /// Root of `{kind}/{name}/{name}.{html,css,js}` component files
    pub components_dir: PathBuf,

    /// Directory of `{collection}.json` search data
    pub data_dir: PathBuf,

    /// Maximum results returned by the search API
    pub search_limit: usize,

    pub widgets: WidgetsConfig,

    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        let bind_addr: SocketAddr = ([127, 0, 0, 1], 3000).into();
        Self {
            bind_addr,
            origin: format!("http://{bind_addr}"),
            components_dir: PathBuf::from("./components"),
            data_dir: PathBuf::from("./data"),
            search_limit: DEFAULT_SEARCH_LIMIT,
            widgets: WidgetsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub bind_addr: Option<String>,
    pub origin: Option<String>,
    pub components_dir: Option<String>,
    pub data_dir: Option<String>,
    pub search_limit: Option<usize>,

    /// Optional [widgets] section
    pub widgets: Option<FileWidgets>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

/// Errors that make a configuration unusable
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bind address {value:?}: {source}")]
    BindAddr {
        value: String,
        source: std::net::AddrParseError,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/speakersheet/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("speakersheet").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };
        if path.exists() {
            return;
        }
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Config is optional
            }
        }
        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Overwrite the config file with defaults, returning its path
    pub fn reset() -> anyhow::Result<PathBuf> {
        use anyhow::Context;

        let path = Self::config_path().context("No home directory to store config in")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, Self::default().to_toml())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Load file config if it exists
    ///
    /// A config file that exists but cannot be read or parsed is an error:
    /// silently falling back to defaults would hide the typo.
    fn load_file_config() -> Result<FileConfig, ConfigError> {
        let Some(path) = Self::config_path() else {
            return Ok(FileConfig::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = Self::load_file_config()?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with an environment lookup
    pub(crate) fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // Bind address: SPEAKERSHEET_BIND > PORT (all interfaces) > file > default
        let bind = env("SPEAKERSHEET_BIND")
            .or_else(|| env("PORT").map(|port| format!("0.0.0.0:{port}")))
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                value: bind.clone(),
                source,
            })?;

        // Origin: env > file > derived from the bind address
        let origin = env("SPEAKERSHEET_ORIGIN")
            .or(file.origin)
            .unwrap_or_else(|| {
                let host = if bind_addr.ip().is_unspecified() {
                    "127.0.0.1".to_string()
                } else {
                    bind_addr.ip().to_string()
                };
                format!("http://{host}:{}", bind_addr.port())
            });

        let components_dir = env("SPEAKERSHEET_COMPONENTS_DIR")
            .or(file.components_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./components"));

        let data_dir = env("SPEAKERSHEET_DATA_DIR")
            .or(file.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let search_limit = file.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1);

        Ok(Self {
            bind_addr,
            origin,
            components_dir,
            data_dir,
            search_limit,
            widgets: WidgetsConfig::from_file(file.widgets),
            logging: LoggingConfig::from_file(file.logging),
        })
    }
}
