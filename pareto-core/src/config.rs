//! Client configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.pareto/
//!   config.yaml   (mode 0600, optional: defaults apply when absent)
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Environment variables override file values: `PARETO_API_ENDPOINT`,
//! `PARETO_WSS_ENDPOINT`, `PARETO_TOKEN`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_API_ENDPOINT: &str = "PARETO_API_ENDPOINT";
pub const ENV_WSS_ENDPOINT: &str = "PARETO_WSS_ENDPOINT";
pub const ENV_TOKEN: &str = "PARETO_TOKEN";

/// Reconnect policy of the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Consecutive failed attempts before giving up. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// A dial that has not completed by then counts as a failed attempt.
    pub connect_timeout_ms: u64,
    /// A connection with no inbound traffic (pongs included) for this long
    /// is dropped and redialed.
    pub idle_timeout_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_attempts: None,
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 45_000,
        }
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Keepalive ping period: a third of the idle timeout, so two pings can
    /// be lost before the connection is declared dead.
    pub fn ping_interval(&self) -> Duration {
        self.idle_timeout() / 3
    }
}

/// Root of `~/.pareto/config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST gateway, e.g. `https://api.example.com/prod`.
    pub api_endpoint: String,
    /// Push channel endpoint, e.g. `wss://push.example.com/prod`.
    pub wss_endpoint: String,
    /// Bearer token forwarded verbatim to the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: "http://localhost:3000".to_string(),
            wss_endpoint: "ws://localhost:3001".to_string(),
            token: None,
            request_timeout_secs: 30,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api) = lookup(ENV_API_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.api_endpoint = api;
        }
        if let Some(wss) = lookup(ENV_WSS_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.wss_endpoint = wss;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.token = Some(token);
        }
    }

    /// YAML rendering for display; the token is redacted.
    pub fn to_display_yaml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.token.is_some() {
            shown.token = Some("********".to_string());
        }
        Ok(serde_yaml::to_string(&shown)?)
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_scheme(&self.api_endpoint, &["http://", "https://"]) {
            return Err(ConfigError::Invalid(format!(
                "api_endpoint must start with http:// or https://, got '{}'",
                self.api_endpoint
            )));
        }
        if !has_scheme(&self.wss_endpoint, &["ws://", "wss://"]) {
            return Err(ConfigError::Invalid(format!(
                "wss_endpoint must start with ws:// or wss://, got '{}'",
                self.wss_endpoint
            )));
        }
        if self.wss_endpoint.contains('?') {
            return Err(ConfigError::Invalid(
                "wss_endpoint must not carry a query string; subscription keys are appended to it"
                    .to_string(),
            ));
        }
        if self.reconnect.multiplier.is_nan() || self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "reconnect.multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::Invalid(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms".to_string(),
            ));
        }
        if self.reconnect.connect_timeout_ms == 0 || self.reconnect.idle_timeout_ms < 3 {
            return Err(ConfigError::Invalid(
                "reconnect.connect_timeout_ms and reconnect.idle_timeout_ms must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.pareto/`
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".pareto")
}

/// `<home>/.pareto/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the config file under `home`, falling back to defaults when absent.
///
/// Does not apply environment overrides; see [`load_at`].
pub fn load_file_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Load the config file, apply environment overrides and validate.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let mut config = load_file_at(home)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, ConfigError> {
    load_at(&home()?)
}

/// Atomically write `config` to `<home>/.pareto/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = config_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|s| url.len() > s.len() && url.get(..s.len()).is_some_and(|p| p.eq_ignore_ascii_case(s)))
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
