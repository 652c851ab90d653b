//! Per-model retrieval definition.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::device::{DeviceDescriptor, DeviceModel};
use crate::error::PlatformError;

/// Placeholder syntax in REST path templates: `{name}`.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// How a REST endpoint is called and how its body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestDialect {
    /// `GET` the path; the body is the configuration.
    Plain,

    /// Arista eAPI: JSON-RPC `POST` running `commands` in text format; the
    /// configuration is the first result's `output`.
    Eapi { commands: Vec<String> },
}

/// REST endpoint for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestEndpoint {
    /// Path template, e.g. `/restconf/data/Cisco-IOS-XE-native:native`.
    pub path_template: String,

    /// Call style.
    pub dialect: RestDialect,
}

impl RestEndpoint {
    /// A plain `GET` endpoint.
    pub fn get(path_template: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
            dialect: RestDialect::Plain,
        }
    }

    /// An eAPI JSON-RPC endpoint.
    pub fn eapi(path_template: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
            dialect: RestDialect::Eapi {
                commands: vec![command.into()],
            },
        }
    }

    /// Render the path template for `device`.
    ///
    /// `{host}` and `{username}` are substituted. Any other placeholder
    /// cannot be filled from a descriptor, so the model is unsupported over
    /// REST unless the device carries an endpoint override.
    pub fn render_path(&self, device: &DeviceDescriptor) -> Result<String, PlatformError> {
        let unresolved: Vec<&str> = PLACEHOLDER
            .captures_iter(&self.path_template)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|name| !matches!(*name, "host" | "username"))
            .collect();

        if !unresolved.is_empty() {
            return Err(PlatformError::UnsupportedDeviceModel {
                model: device.device_model().to_string(),
                reason: format!(
                    "REST path '{}' needs {} which a descriptor cannot supply; set a REST endpoint override",
                    self.path_template,
                    unresolved
                        .iter()
                        .map(|n| format!("{{{n}}}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        let rendered = PLACEHOLDER.replace_all(&self.path_template, |caps: &regex::Captures<'_>| {
            match caps.get(1).map(|m| m.as_str()) {
                Some("host") => device.host().to_string(),
                Some("username") => device.username().to_string(),
                _ => String::new(),
            }
        });
        Ok(rendered.into_owned())
    }
}

/// Everything needed to retrieve a running configuration from one model.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    /// The model this definition serves.
    pub model: DeviceModel,

    /// Shell command that prints the running configuration.
    pub shell_command: String,

    /// Commands tried in order, in the same session, when the primary
    /// command prints nothing.
    pub fallback_commands: Vec<String>,

    /// Output substrings that mean the command failed.
    pub failed_when_contains: Vec<String>,

    /// REST endpoint.
    pub rest: RestEndpoint,
}

impl ModelDefinition {
    /// Create a definition with a shell command and a plain `GET` endpoint.
    pub fn new(
        model: DeviceModel,
        shell_command: impl Into<String>,
        rest_path_template: impl Into<String>,
    ) -> Self {
        Self {
            model,
            shell_command: shell_command.into(),
            fallback_commands: vec![],
            failed_when_contains: vec![],
            rest: RestEndpoint::get(rest_path_template),
        }
    }

    /// Add a fallback shell command.
    pub fn with_fallback_command(mut self, command: impl Into<String>) -> Self {
        self.fallback_commands.push(command.into());
        self
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add several failure patterns.
    pub fn with_failure_patterns(mut self, patterns: &[&str]) -> Self {
        self.failed_when_contains
            .extend(patterns.iter().map(|p| (*p).to_string()));
        self
    }

    /// Replace the REST endpoint.
    pub fn with_rest(mut self, rest: RestEndpoint) -> Self {
        self.rest = rest;
        self
    }

    /// The REST path template.
    pub fn rest_path_template(&self) -> &str {
        &self.rest.path_template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(model: DeviceModel) -> DeviceDescriptor {
        DeviceDescriptor::builder("10.1.1.1")
            .username("netops")
            .password("pw")
            .model(model)
            .build()
            .unwrap()
    }

    #[test]
    fn test_render_plain_path() {
        let endpoint = RestEndpoint::get("/api/config");
        assert_eq!(
            endpoint.render_path(&device(DeviceModel::Sonic)).unwrap(),
            "/api/config"
        );
    }

    #[test]
    fn test_render_known_placeholders() {
        let endpoint = RestEndpoint::get("/devices/{host}/users/{username}");
        assert_eq!(
            endpoint.render_path(&device(DeviceModel::Linux)).unwrap(),
            "/devices/10.1.1.1/users/netops"
        );
    }

    #[test]
    fn test_render_unknown_placeholder_is_unsupported() {
        let endpoint = RestEndpoint::get("/api/v1/networks/{networkId}/devices/{serial}/configuration");
        let err = endpoint.render_path(&device(DeviceModel::Meraki)).unwrap_err();
        let PlatformError::UnsupportedDeviceModel { model, reason } = err;
        assert_eq!(model, "meraki");
        assert!(reason.contains("{networkId}"));
        assert!(reason.contains("{serial}"));
    }

    #[test]
    fn test_definition_builder() {
        let def = ModelDefinition::new(DeviceModel::Sonic, "show running-configuration", "/api/config")
            .with_fallback_command("cat /etc/sonic/config_db.json")
            .with_failure_pattern("Error: No such command");

        assert_eq!(def.shell_command, "show running-configuration");
        assert_eq!(def.fallback_commands.len(), 1);
        assert_eq!(def.rest_path_template(), "/api/config");
        assert_eq!(def.rest.dialect, RestDialect::Plain);
    }
}
