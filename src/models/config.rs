//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SelectorConfig;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the portal lives
    #[serde(default)]
    pub portal: PortalConfig,

    /// HTTP settings for the browsing context
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Element wait behavior
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Log level and event log retention
    #[serde(default)]
    pub logging: LoggingConfig,

    /// CSS selectors for every page the engine reads
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.portal.base_url.trim().is_empty() {
            return Err(AppError::validation("portal.base_url is empty"));
        }
        Url::parse(&self.portal.base_url)
            .map_err(|e| AppError::validation(format!("portal.base_url: {e}")))?;
        Url::parse(&self.portal.landing_url)
            .map_err(|e| AppError::validation(format!("portal.landing_url: {e}")))?;
        if self.browser.user_agent.trim().is_empty() {
            return Err(AppError::validation("browser.user_agent is empty"));
        }
        if self.browser.timeout_secs == 0 {
            return Err(AppError::validation("browser.timeout_secs must be > 0"));
        }
        if self.navigation.wait_timeout_ms == 0 {
            return Err(AppError::validation(
                "navigation.wait_timeout_ms must be > 0",
            ));
        }
        if self.navigation.poll_interval_ms == 0 {
            return Err(AppError::validation(
                "navigation.poll_interval_ms must be > 0",
            ));
        }
        if self.navigation.poll_interval_ms > self.navigation.wait_timeout_ms {
            return Err(AppError::validation(
                "navigation.poll_interval_ms must not exceed wait_timeout_ms",
            ));
        }
        if self.logging.max_entries == 0 {
            return Err(AppError::validation("logging.max_entries must be > 0"));
        }
        self.selectors.compile()?;
        Ok(())
    }
}

/// Portal location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Pages under this prefix qualify for a sync run
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Page listing the enrolled courses
    #[serde(default = "defaults::landing_url")]
    pub landing_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            landing_url: defaults::landing_url(),
        }
    }
}

impl PortalConfig {
    /// Whether `url` belongs to the portal.
    pub fn is_portal_page(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Cookie header of an already authenticated session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            cookie: None,
        }
    }
}

/// Element wait settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// How long to wait for an element before giving up
    #[serde(default = "defaults::wait_timeout")]
    pub wait_timeout_ms: u64,

    /// Delay between presence checks
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: defaults::wait_timeout(),
            poll_interval_ms: defaults::poll_interval(),
        }
    }
}

impl NavigationConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `env_logger` filter
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Number of event log entries kept in storage
    #[serde(default = "defaults::max_entries")]
    pub max_entries: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            max_entries: defaults::max_entries(),
        }
    }
}

mod defaults {
    // Portal defaults
    pub fn base_url() -> String {
        "https://bb.cuhk.edu.cn/".into()
    }
    pub fn landing_url() -> String {
        "https://bb.cuhk.edu.cn/webapps/portal/execute/tabs/tabAction?tab_tab_group_id=_1_1".into()
    }

    // Browser defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; coursesync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Navigation defaults
    pub fn wait_timeout() -> u64 {
        15_000
    }
    pub fn poll_interval() -> u64 {
        500
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn max_entries() -> usize {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.portal.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_interval_above_timeout() {
        let mut config = Config::default();
        config.navigation.poll_interval_ms = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.selectors.course_items.container = "[[".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_portal_page_prefix() {
        let portal = PortalConfig::default();
        assert!(portal.is_portal_page("https://bb.cuhk.edu.cn/webapps/portal"));
        assert!(!portal.is_portal_page("chrome://newtab"));
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[navigation]\nwait_timeout_ms = 2000\n[browser]\ncookie = \"s=1\"\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.navigation.wait_timeout_ms, 2000);
        assert_eq!(config.navigation.poll_interval_ms, 500);
        assert_eq!(config.browser.cookie.as_deref(), Some("s=1"));
        assert_eq!(config.logging.max_entries, 100);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default("/definitely/not/here.toml");
        assert_eq!(config.navigation.wait_timeout_ms, 15_000);
    }
}
