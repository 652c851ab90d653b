//! Wire form of a device descriptor.

use std::path::PathBuf;

use serde::Deserialize;

use super::{DeviceDescriptor, DeviceModel, Protocol};
use crate::error::{Error, Result};

/// A device as submitted by a caller (JSON object).
///
/// Field names follow the request model callers already send:
///
/// ```json
/// {"host": "10.0.0.1", "username": "admin", "password": "secret",
///  "device_model": "sonic", "method": "ssh"}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSpec {
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Read as given; `~` is not expanded.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub device_model: Option<DeviceModel>,
    #[serde(default, alias = "protocol")]
    pub method: Option<String>,
    #[serde(default, alias = "rest_endpoint_override")]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub rest_port: Option<u16>,
}

impl TryFrom<DeviceSpec> for DeviceDescriptor {
    type Error = Error;

    fn try_from(spec: DeviceSpec) -> Result<Self> {
        let protocol = match spec.method.as_deref() {
            Some(method) => method.parse::<Protocol>()?,
            None => Protocol::default(),
        };

        let mut builder = DeviceDescriptor::builder(spec.host)
            .username(spec.username)
            .model(spec.device_model.unwrap_or_default())
            .protocol(protocol);

        if let Some(port) = spec.port {
            builder = builder.port(port);
        }
        if let Some(password) = spec.password.filter(|p| !p.is_empty()) {
            builder = builder.password(password);
        }
        if let Some(path) = spec.private_key {
            builder = match spec.passphrase {
                Some(passphrase) => builder.private_key_with_passphrase(path, passphrase),
                None => builder.private_key(path),
            };
        }
        if let Some(url) = spec.rest_url {
            builder = builder.rest_endpoint_override(url);
        }
        if let Some(port) = spec.rest_port {
            builder = builder.rest_port(port);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<DeviceDescriptor> {
        let spec: DeviceSpec = serde_json::from_str(json).unwrap();
        DeviceDescriptor::try_from(spec)
    }

    #[test]
    fn test_minimal_spec_defaults() {
        let device = parse(r#"{"host": "10.0.0.1", "username": "admin", "password": "pw"}"#)
            .unwrap();
        assert_eq!(device.device_model(), &DeviceModel::Sonic);
        assert_eq!(device.protocol(), Protocol::Shell);
        assert_eq!(device.ssh_port(), 22);
    }

    #[test]
    fn test_full_spec() {
        let device = parse(
            r#"{"host": "sw1", "username": "admin", "password": "pw", "port": 8080,
                "device_model": "Arista", "method": "REST", "rest_url": "/custom"}"#,
        )
        .unwrap();
        assert_eq!(device.device_model(), &DeviceModel::Arista);
        assert_eq!(device.protocol(), Protocol::Rest);
        assert_eq!(device.rest_port(), Some(8080));
        assert_eq!(device.rest_endpoint_override(), Some("/custom"));
    }

    #[test]
    fn test_unknown_model_is_accepted() {
        let device = parse(
            r#"{"host": "x", "username": "u", "password": "p", "device_model": "acme"}"#,
        )
        .unwrap();
        assert!(!device.device_model().is_builtin());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = parse(r#"{"host": "x", "username": "u", "password": "p", "method": "gnmi"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("gnmi"));
    }

    #[test]
    fn test_key_only_spec() {
        let device = parse(
            r#"{"host": "x", "username": "u", "private_key": "/home/u/.ssh/id_rsa"}"#,
        )
        .unwrap();
        assert!(device.auth().key_path().is_some());
        assert!(device.auth().password().is_none());
    }
}
