//! Device descriptors and their builder.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::DeviceModel;
use crate::error::{InventoryError, Result};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Which transports to use when fetching a device's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Interactive command shell over SSH.
    #[default]
    #[serde(rename = "ssh", alias = "shell")]
    Shell,

    /// HTTP REST call.
    Rest,

    /// Shell and REST, fetched independently.
    Both,
}

impl Protocol {
    /// The wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "ssh",
            Self::Rest => "rest",
            Self::Both => "both",
        }
    }

    /// The transports this choice expands to, shell first.
    pub fn sources(self) -> &'static [Source] {
        match self {
            Self::Shell => &[Source::Shell],
            Self::Rest => &[Source::Rest],
            Self::Both => &[Source::Shell, Source::Rest],
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = InventoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" | "shell" => Ok(Self::Shell),
            "rest" => Ok(Self::Rest),
            "both" => Ok(Self::Both),
            other => Err(InventoryError::InvalidDescriptor {
                message: format!("unknown retrieval method '{other}' (expected ssh, rest or both)"),
            }),
        }
    }
}

/// The transport that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "ssh")]
    Shell,
    #[serde(rename = "rest")]
    Rest,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "ssh",
            Self::Rest => "rest",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for a device. Secrets are only exposed at the transport.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Password authentication (also used as HTTP basic auth for REST).
    Password(SecretString),

    /// Private key authentication.
    Key {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
        /// Optional password, tried after the key and used for REST basic auth.
        password: Option<SecretString>,
    },
}

impl AuthMethod {
    /// The password, if one was supplied.
    pub fn password(&self) -> Option<&SecretString> {
        match self {
            Self::Password(password) => Some(password),
            Self::Key { password, .. } => password.as_ref(),
        }
    }

    /// The private key path, for key authentication.
    pub fn key_path(&self) -> Option<&Path> {
        match self {
            Self::Password(_) => None,
            Self::Key { path, .. } => Some(path),
        }
    }
}

/// Immutable description of one device and how to reach it.
///
/// Identity within an inventory is the `host`, compared exactly.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    host: String,
    port: Option<u16>,
    username: String,
    auth: AuthMethod,
    device_model: DeviceModel,
    protocol: Protocol,
    rest_endpoint_override: Option<String>,
    rest_port: Option<u16>,
}

impl DeviceDescriptor {
    /// Start building a descriptor for `host`.
    pub fn builder(host: impl Into<String>) -> DeviceBuilder {
        DeviceBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port given at construction, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Port used for the shell session.
    pub fn ssh_port(&self) -> u16 {
        match self.protocol {
            Protocol::Rest => DEFAULT_SSH_PORT,
            Protocol::Shell | Protocol::Both => self.port.unwrap_or(DEFAULT_SSH_PORT),
        }
    }

    /// Port used for REST calls; `None` means the scheme default.
    ///
    /// A REST-only device uses its main port. A `both` device keeps the main
    /// port for SSH and needs a separate `rest_port`.
    pub fn rest_port(&self) -> Option<u16> {
        match self.protocol {
            Protocol::Rest => self.port.or(self.rest_port),
            Protocol::Shell | Protocol::Both => self.rest_port,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn auth(&self) -> &AuthMethod {
        &self.auth
    }

    pub fn device_model(&self) -> &DeviceModel {
        &self.device_model
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn rest_endpoint_override(&self) -> Option<&str> {
        self.rest_endpoint_override.as_deref()
    }
}

/// Builder for [`DeviceDescriptor`].
///
/// # Example
///
/// ```rust
/// use cfgrab::device::{DeviceDescriptor, DeviceModel, Protocol};
///
/// # fn example() -> Result<(), cfgrab::Error> {
/// let device = DeviceDescriptor::builder("10.0.0.1")
///     .username("admin")
///     .password("secret")
///     .model(DeviceModel::Sonic)
///     .protocol(Protocol::Shell)
///     .build()?;
/// assert_eq!(device.ssh_port(), 22);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceBuilder {
    host: String,
    port: Option<u16>,
    username: Option<String>,
    password: Option<SecretString>,
    key: Option<(PathBuf, Option<SecretString>)>,
    device_model: DeviceModel,
    protocol: Protocol,
    rest_endpoint_override: Option<String>,
    rest_port: Option<u16>,
}

impl DeviceBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            username: None,
            password: None,
            key: None,
            device_model: DeviceModel::default(),
            protocol: Protocol::default(),
            rest_endpoint_override: None,
            rest_port: None,
        }
    }

    /// Set the port (SSH port, or the REST port for REST-only devices).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key = Some((key_path.into(), None));
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.key = Some((key_path.into(), Some(SecretString::from(passphrase.into()))));
        self
    }

    /// Set the device model tag.
    pub fn model(mut self, model: DeviceModel) -> Self {
        self.device_model = model;
        self
    }

    /// Set the retrieval protocol.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Fetch REST configuration from this path or absolute URL instead of
    /// the registry endpoint.
    pub fn rest_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.rest_endpoint_override = Some(endpoint.into());
        self
    }

    /// Set the REST port used in `both` mode.
    pub fn rest_port(mut self, port: u16) -> Self {
        self.rest_port = Some(port);
        self
    }

    /// Validate and build the descriptor.
    pub fn build(self) -> Result<DeviceDescriptor> {
        let host = self.host.trim().to_string();
        if host.is_empty() {
            return Err(invalid("host must not be empty"));
        }

        let username = self
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| invalid(format!("username is required for {host}")))?;

        if self.port == Some(0) || self.rest_port == Some(0) {
            return Err(invalid(format!("port 0 is not valid for {host}")));
        }

        let auth = match (self.key, self.password) {
            (Some((path, passphrase)), password) => AuthMethod::Key {
                path,
                passphrase,
                password,
            },
            (None, Some(password)) => AuthMethod::Password(password),
            (None, None) => {
                return Err(invalid(format!(
                    "either a password or a private key is required for {host}"
                )));
            }
        };

        Ok(DeviceDescriptor {
            host,
            port: self.port,
            username,
            auth,
            device_model: self.device_model,
            protocol: self.protocol,
            rest_endpoint_override: self.rest_endpoint_override.filter(|e| !e.trim().is_empty()),
            rest_port: self.rest_port,
        })
    }
}

fn invalid(message: impl Into<String>) -> crate::Error {
    InventoryError::InvalidDescriptor {
        message: message.into(),
    }
    .into()
}
