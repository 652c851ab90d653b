//! Engine configuration.
//!
//! Values come from defaults, optionally a TOML file, then `CFGRAB_*`
//! environment variables, in that order.
//!
//! ```toml
//! concurrency_limit = 20
//! fetch_timeout_secs = 15
//!
//! [shell]
//! host_key_verification = "disabled"
//!
//! [rest]
//! use_https = true
//! accept_invalid_certs = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::transport::{RestOptions, ShellOptions};

/// Default number of devices fetched at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Default per-fetch deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_CONCURRENCY_LIMIT: &str = "CFGRAB_CONCURRENCY_LIMIT";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "CFGRAB_FETCH_TIMEOUT_SECS";
pub const ENV_REST_USE_HTTPS: &str = "CFGRAB_REST_USE_HTTPS";
pub const ENV_REST_VERIFY_TLS: &str = "CFGRAB_REST_VERIFY_TLS";

/// Retrieval engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of devices fetched at once.
    pub concurrency_limit: usize,

    /// Deadline for one fetch, connect through disconnect.
    #[serde(with = "secs", rename = "fetch_timeout_secs")]
    pub fetch_timeout: Duration,

    pub shell: ShellOptions,
    pub rest: RestOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            shell: ShellOptions::default(),
            rest: RestOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Override fields from `CFGRAB_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from variables supplied by `lookup`.
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_CONCURRENCY_LIMIT) {
            self.concurrency_limit = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_CONCURRENCY_LIMIT, format!("'{value}' is not a count")))?;
        }
        if let Some(value) = lookup(ENV_FETCH_TIMEOUT_SECS) {
            let secs: f64 = value
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_FETCH_TIMEOUT_SECS, format!("'{value}' is not a number")))?;
            self.fetch_timeout = secs::from_f64(secs)
                .map_err(|message| invalid(ENV_FETCH_TIMEOUT_SECS, message))?;
        }
        if let Some(value) = lookup(ENV_REST_USE_HTTPS) {
            self.rest.use_https = parse_flag(ENV_REST_USE_HTTPS, &value)?;
        }
        if let Some(value) = lookup(ENV_REST_VERIFY_TLS) {
            self.rest.accept_invalid_certs = !parse_flag(ENV_REST_VERIFY_TLS, &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(invalid("concurrency_limit", "must be at least 1"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(invalid("fetch_timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_shell(mut self, shell: ShellOptions) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_rest(mut self, rest: RestOptions) -> Self {
        self.rest = rest;
        self
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, format!("'{value}' is not a boolean"))),
    }
}

/// Durations written as (possibly fractional) seconds.
pub(crate) mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        from_f64(secs).map_err(de::Error::custom)
    }

    pub fn from_f64(secs: f64) -> Result<Duration, String> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("{secs} is not a valid number of seconds"));
        }
        Duration::try_from_secs_f64(secs).map_err(|e| format!("{secs} seconds: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::transport::HostKeyVerification;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency_limit, 10);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            concurrency_limit = 25
            fetch_timeout_secs = 2.5

            [shell]
            host_key_verification = "strict"
            known_hosts_path = "/tmp/known_hosts"

            [rest]
            use_https = true
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency_limit, 25);
        assert_eq!(config.fetch_timeout, Duration::from_millis(2500));
        assert_eq!(config.shell.host_key_verification, HostKeyVerification::Strict);
        assert!(config.rest.use_https);
        assert!(config.rest.accept_invalid_certs);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = EngineConfig::from_toml_str("concurrency_limit = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "concurrency_limit"));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("fetch_timeout_secs = -1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overflowing_timeout_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("fetch_timeout_secs = 1e20"),
            Err(ConfigError::Parse(_))
        ));

        let err = EngineConfig::default()
            .apply_vars(|key| (key == ENV_FETCH_TIMEOUT_SECS).then(|| "1e20".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == ENV_FETCH_TIMEOUT_SECS));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_CONCURRENCY_LIMIT, "4"),
            (ENV_FETCH_TIMEOUT_SECS, "30"),
            (ENV_REST_USE_HTTPS, "yes"),
            (ENV_REST_VERIFY_TLS, "true"),
        ]);
        let config = EngineConfig::default()
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert!(config.rest.use_https);
        assert!(!config.rest.accept_invalid_certs);
    }

    #[test]
    fn test_bad_env_value() {
        let err = EngineConfig::default()
            .apply_vars(|key| (key == ENV_REST_USE_HTTPS).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REST_USE_HTTPS));
    }

    #[test]
    fn test_from_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/cfgrab.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
