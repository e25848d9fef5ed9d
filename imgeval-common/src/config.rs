//! Bootstrap configuration loading and root folder resolution
//!
//! Resolution priority for every key:
//! 1. Command-line argument / environment variable (collected by the binary)
//! 2. TOML config file
//! 3. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5730;

/// Default bind address (loopback; the upstream auth proxy sits in front)
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default URL prefix under which image files are served
pub const DEFAULT_MEDIA_URL: &str = "/media/";

const APP_DIR: &str = "imgeval";
const DATABASE_FILE: &str = "imgeval.db";

/// Bootstrap configuration as read from TOML
///
/// Every key is optional; missing keys fall through to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database and media by default
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Folder that stored image paths are relative to
    #[serde(default)]
    pub media_root: Option<PathBuf>,

    /// URL prefix prepended to stored image paths
    #[serde(default)]
    pub media_url: Option<String>,

    /// HTTP bind address
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{} ({})", e, path.display())))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load the config file at `explicit` if given, else the platform default
    ///
    /// A missing default file is not an error; an explicit path must exist.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    pub media_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub media_root: PathBuf,
    pub media_url: String,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides over TOML over defaults
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Self {
        let root_folder = overrides
            .root_folder
            .or(file.root_folder)
            .unwrap_or_else(get_default_root_folder);

        let database_path = overrides
            .database_path
            .or(file.database_path)
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE));

        let media_root = overrides
            .media_root
            .or(file.media_root)
            .unwrap_or_else(|| root_folder.join("media"));

        let media_url = normalize_media_url(
            overrides
                .media_url
                .or(file.media_url)
                .as_deref()
                .unwrap_or(DEFAULT_MEDIA_URL),
        );

        Self {
            root_folder,
            database_path,
            media_root,
            media_url,
            bind_address: overrides
                .bind_address
                .or(file.bind_address)
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            log_level: overrides
                .log_level
                .or(file.logging.level)
                .unwrap_or_else(|| "info".to_string()),
        }
    }

    /// `host:port` string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Ensure the media URL starts and ends with a slash
pub fn normalize_media_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Platform config file location (`<config_dir>/imgeval/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/imgeval (or /var/lib/imgeval for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/var/lib/imgeval"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/imgeval"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\imgeval"))
    } else {
        PathBuf::from("./imgeval_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_media_url() {
        assert_eq!(normalize_media_url("media"), "/media/");
        assert_eq!(normalize_media_url("/media"), "/media/");
        assert_eq!(normalize_media_url("/static/img/"), "/static/img/");
        assert_eq!(normalize_media_url(""), "/");
    }

    #[test]
    fn test_database_defaults_under_root_folder() {
        let overrides = ConfigOverrides {
            root_folder: Some(PathBuf::from("/srv/eval")),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(overrides, TomlConfig::default());
        assert_eq!(config.database_path, PathBuf::from("/srv/eval/imgeval.db"));
        assert_eq!(config.media_root, PathBuf::from("/srv/eval/media"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.listen_address(), "127.0.0.1:5730");
    }
}
