//! Request and response shapes exchanged with the request-handling layer.
//!
//! Bodies arrive as JSON: a single device object or an array of them.
//! Responses serialise to the envelopes callers already consume.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::{DeviceDescriptor, DeviceSpec, Protocol};
use crate::error::{Error, InventoryError, Result};
use crate::inventory::DEFAULT_INVENTORY;
use crate::retrieval::RetrievalOutcome;

/// Normalise an inventory name; empty or missing means `"default"`.
pub fn inventory_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_INVENTORY.to_string(),
    }
}

/// Host filter: one host or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HostFilter {
    One(String),
    Many(Vec<String>),
}

impl HostFilter {
    /// The hosts named, without duplicates, in the order given.
    pub fn hosts(&self) -> Vec<String> {
        match self {
            Self::One(host) => vec![host.clone()],
            Self::Many(hosts) => {
                let mut unique: Vec<String> = Vec::with_capacity(hosts.len());
                for host in hosts {
                    if !unique.contains(host) {
                        unique.push(host.clone());
                    }
                }
                unique
            }
        }
    }
}

impl From<&str> for HostFilter {
    fn from(host: &str) -> Self {
        Self::One(host.to_string())
    }
}

impl From<Vec<String>> for HostFilter {
    fn from(hosts: Vec<String>) -> Self {
        Self::Many(hosts)
    }
}

/// Devices submitted in a request body.
#[derive(Debug, Clone)]
pub struct DevicesBody(Vec<DeviceSpec>);

impl DevicesBody {
    /// Parse a JSON object or array of objects.
    pub fn from_json(body: &str) -> Result<Self> {
        match parse_body(body)? {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    serde_json::from_value(item).map_err(|e| invalid_descriptor(format!("device {index}: {e}")))
                })
                .collect::<Result<Vec<_>>>()
                .map(Self),
            item => serde_json::from_value(item)
                .map(|spec| Self(vec![spec]))
                .map_err(|e| invalid_descriptor(e.to_string())),
        }
    }

    pub fn specs(&self) -> &[DeviceSpec] {
        &self.0
    }

    /// Validate every entry. Fails on the first malformed descriptor, so a
    /// bad body changes nothing.
    pub fn into_descriptors(self) -> Result<Vec<DeviceDescriptor>> {
        self.0.into_iter().map(DeviceDescriptor::try_from).collect()
    }
}

impl From<Vec<DeviceSpec>> for DevicesBody {
    fn from(specs: Vec<DeviceSpec>) -> Self {
        Self(specs)
    }
}

impl From<DeviceSpec> for DevicesBody {
    fn from(spec: DeviceSpec) -> Self {
        Self(vec![spec])
    }
}

/// Hosts named in a removal body.
///
/// Removal matches on host alone, so entries need only a `host` field; bare
/// host strings are accepted too.
pub fn hosts_from_json(body: &str) -> Result<Vec<String>> {
    let items = match parse_body(body)? {
        Value::Array(items) => items,
        item => vec![item],
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(host) if !host.trim().is_empty() => Ok(host),
            Value::Object(mut fields) => match fields.remove("host") {
                Some(Value::String(host)) if !host.trim().is_empty() => Ok(host),
                _ => Err(invalid_descriptor(format!("device {index}: missing 'host'"))),
            },
            _ => Err(invalid_descriptor(format!("device {index}: expected an object with 'host'"))),
        })
        .collect()
}

fn parse_body(body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body).map_err(|e| invalid_body(e.to_string()))?;
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        _ => Err(invalid_body("expected a device object or a list of devices")),
    }
}

fn invalid_body(message: impl Into<String>) -> Error {
    InventoryError::InvalidRequestBody {
        message: message.into(),
    }
    .into()
}

fn invalid_descriptor(message: impl Into<String>) -> Error {
    InventoryError::InvalidDescriptor {
        message: message.into(),
    }
    .into()
}

/// Response to an inventory mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryResponse {
    pub success: bool,
    pub message: String,
    pub inventory: String,
    pub affected_hosts: Vec<String>,
    /// Duplicates on add, unknown hosts on remove.
    pub skipped_hosts: Vec<String>,
}

/// Response to a configuration retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub message: String,
    pub inventory: String,
    pub results: Vec<RetrievalOutcome>,
    /// One line per outcome plus one per filtered host not in the inventory.
    pub messages: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
}

/// A descriptor as listed back to callers. Credentials are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub host: String,
    /// Omitted for a REST-only device using the scheme default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub username: String,
    pub device_model: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_port: Option<u16>,
}

impl From<&DeviceDescriptor> for DeviceSummary {
    fn from(device: &DeviceDescriptor) -> Self {
        Self {
            host: device.host().to_string(),
            port: match device.protocol() {
                Protocol::Rest => device.rest_port(),
                Protocol::Shell | Protocol::Both => Some(device.ssh_port()),
            },
            username: device.username().to_string(),
            device_model: device.device_model().to_string(),
            method: device.protocol().to_string(),
            rest_url: device.rest_endpoint_override().map(str::to_string),
            rest_port: device.rest_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_name_defaults() {
        assert_eq!(inventory_name(None), "default");
        assert_eq!(inventory_name(Some("  ")), "default");
        assert_eq!(inventory_name(Some("lab")), "lab");
    }

    #[test]
    fn test_host_filter_untagged() {
        let one: HostFilter = serde_json::from_str(r#""10.0.0.1""#).unwrap();
        assert_eq!(one.hosts(), vec!["10.0.0.1"]);

        let many: HostFilter = serde_json::from_str(r#"["r1", "r2", "r1"]"#).unwrap();
        assert_eq!(many.hosts(), vec!["r1", "r2"]);
    }

    #[test]
    fn test_single_object_body() {
        let body = DevicesBody::from_json(
            r#"{"host": "10.0.0.1", "username": "admin", "password": "pw"}"#,
        )
        .unwrap();
        assert_eq!(body.specs().len(), 1);
        assert_eq!(body.into_descriptors().unwrap()[0].host(), "10.0.0.1");
    }

    #[test]
    fn test_array_body() {
        let body = DevicesBody::from_json(
            r#"[{"host": "r1", "username": "a", "password": "p"},
                {"host": "r2", "username": "a", "password": "p", "method": "both"}]"#,
        )
        .unwrap();
        let devices = body.into_descriptors().unwrap();
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn test_scalar_body_rejected() {
        let err = DevicesBody::from_json("42").unwrap_err();
        assert!(matches!(
            err,
            Error::Inventory(InventoryError::InvalidRequestBody { .. })
        ));
        let err = DevicesBody::from_json("{not json").unwrap_err();
        assert!(matches!(
            err,
            Error::Inventory(InventoryError::InvalidRequestBody { .. })
        ));
    }

    #[test]
    fn test_missing_field_is_invalid_descriptor() {
        let err = DevicesBody::from_json(r#"[{"host": "r1"}]"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Inventory(InventoryError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_hosts_from_json() {
        assert_eq!(hosts_from_json(r#"{"host": "r1"}"#).unwrap(), vec!["r1"]);
        assert_eq!(
            hosts_from_json(r#"[{"host": "r1", "username": "x"}, "r2"]"#).unwrap(),
            vec!["r1", "r2"]
        );
        assert!(hosts_from_json(r#"[{"username": "x"}]"#).is_err());
    }

    #[test]
    fn test_summary_hides_credentials() {
        let device = DeviceDescriptor::builder("r1")
            .username("admin")
            .password("secret")
            .build()
            .unwrap();
        let value = serde_json::to_value(DeviceSummary::from(&device)).unwrap();
        assert_eq!(value["method"], "ssh");
        assert_eq!(value["port"], 22);
        assert!(!value.to_string().contains("secret"));
    }

    #[test]
    fn test_rest_summary_port() {
        let device = DeviceDescriptor::builder("10.0.0.1")
            .username("admin")
            .password("secret")
            .protocol(Protocol::Rest)
            .build()
            .unwrap();
        let value = serde_json::to_value(DeviceSummary::from(&device)).unwrap();
        assert_eq!(value["method"], "rest");
        assert!(value.get("port").is_none());

        let device = DeviceDescriptor::builder("10.0.0.1")
            .port(8443)
            .username("admin")
            .password("secret")
            .protocol(Protocol::Rest)
            .build()
            .unwrap();
        assert_eq!(DeviceSummary::from(&device).port, Some(8443));
    }
}
