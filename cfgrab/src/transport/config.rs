//! Transport options shared by every device in a batch.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Shell (SSH) client options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellOptions {
    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file. `None` uses `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,

    /// Idle time after which russh drops the session.
    #[serde(with = "crate::config::secs", rename = "inactivity_timeout_secs")]
    pub inactivity_timeout: Duration,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            inactivity_timeout: Duration::from_secs(30),
        }
    }
}

/// REST client options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RestOptions {
    /// Use `https` when building a device base URL.
    pub use_https: bool,

    /// Skip certificate verification. Lab devices mostly carry self-signed
    /// certificates, so this is on unless configured otherwise.
    pub accept_invalid_certs: bool,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for RestOptions {
    fn default() -> Self {
        Self {
            use_https: false,
            accept_invalid_certs: true,
            user_agent: concat!("cfgrab/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RestOptions {
    /// URL scheme for device base URLs.
    pub fn scheme(&self) -> &'static str {
        if self.use_https { "https" } else { "http" }
    }
}
