//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/usagebar/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/usagebar/` (~/.config/usagebar/)
//! - Data: `$XDG_DATA_HOME/usagebar/` (~/.local/share/usagebar/)
//! - State/Logs: `$XDG_STATE_HOME/usagebar/` (~/.local/state/usagebar/)
//!
//! The TOML file holds deployment-level settings (endpoints, timeouts, log
//! level). User-facing settings such as the refresh interval or icon style
//! live in the preference store instead, see [`crate::store::Preferences`].

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Remote endpoints
    #[serde(default)]
    pub api: ApiConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Usage notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Icon output settings
    #[serde(default)]
    pub icon: IconConfig,

    /// Legacy install compatibility
    #[serde(default)]
    pub legacy: LegacyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Base URLs of the three remote services
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Web app base URL (usage + organizations)
    #[serde(default = "default_web_base_url")]
    pub web_base_url: String,

    /// Developer console base URL (API credit usage)
    #[serde(default = "default_console_base_url")]
    pub console_base_url: String,

    /// Status page summary endpoint
    #[serde(default = "default_status_url")]
    pub status_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            web_base_url: default_web_base_url(),
            console_base_url: default_console_base_url(),
            status_url: default_status_url(),
        }
    }
}

fn default_web_base_url() -> String {
    "https://claude.ai".to_string()
}

fn default_console_base_url() -> String {
    "https://console.anthropic.com".to_string()
}

fn default_status_url() -> String {
    "https://status.claude.com/api/v2/status.json".to_string()
}

/// HTTP client settings
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("usagebar/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Usage notification settings
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Percentages that trigger a notification when crossed upward
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u8>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
        }
    }
}

fn default_thresholds() -> Vec<u8> {
    crate::notify::DEFAULT_THRESHOLDS.to_vec()
}

/// Icon output settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct IconConfig {
    /// Where the latest rendered icon is written (defaults to the state dir)
    pub output_path: Option<PathBuf>,
}

/// Legacy install compatibility
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LegacyConfig {
    /// Override for the pre-store credential file
    pub session_key_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(Error::Config(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(bad) = self.notifications.thresholds.iter().find(|t| **t > 100) {
            return Err(Error::Config(format!(
                "notifications.thresholds must be within 0-100, got {}",
                bad
            )));
        }
        for (name, url) in [
            ("api.web_base_url", &self.api.web_base_url),
            ("api.console_base_url", &self.api.console_base_url),
            ("api.status_url", &self.api.status_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got {:?}",
                    name, url
                )));
            }
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/usagebar/config.toml` (~/.config/usagebar/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("usagebar").join("config.toml")
    }

    /// Returns the data directory path (for the preference store)
    ///
    /// `$XDG_DATA_HOME/usagebar/` (~/.local/share/usagebar/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("usagebar")
    }

    /// Returns the state directory path (for logs and the rendered icon)
    ///
    /// `$XDG_STATE_HOME/usagebar/` (~/.local/state/usagebar/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("usagebar")
    }

    /// Returns the preference store path
    ///
    /// `$XDG_DATA_HOME/usagebar/preferences.db`
    pub fn preferences_path() -> PathBuf {
        Self::data_dir().join("preferences.db")
    }

    /// Where the latest icon PNG is written
    pub fn icon_path(&self) -> PathBuf {
        self.icon
            .output_path
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("icon.png"))
    }

    /// Location of the credential file written by pre-store releases
    pub fn legacy_session_key_path(&self) -> PathBuf {
        self.legacy
            .session_key_path
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude-session-key"))
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.web_base_url, "https://claude.ai");
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.notifications.thresholds, vec![75, 90, 95]);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[api]
web_base_url = "http://localhost:8080"

[http]
timeout_secs = 5

[notifications]
thresholds = [80, 95]

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.api.web_base_url, "http://localhost:8080");
        // Unset keys in a present section still pick up defaults
        assert_eq!(
            config.api.status_url,
            "https://status.claude.com/api/v2/status.json"
        );
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.notifications.thresholds, vec![80, 95]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.notifications.thresholds = vec![50, 120];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.status_url = "status.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_overrides() {
        let toml = r#"
[icon]
output_path = "/tmp/usagebar-icon.png"

[legacy]
session_key_path = "/tmp/legacy-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.icon_path(), PathBuf::from("/tmp/usagebar-icon.png"));
        assert_eq!(
            config.legacy_session_key_path(),
            PathBuf::from("/tmp/legacy-key")
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.logging.level, "warn");

        std::fs::write(&path, "[logging\nlevel = ").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
