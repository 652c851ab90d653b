//! Device model registry.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use super::definition::ModelDefinition;
use super::vendors;
use crate::device::{DeviceDescriptor, DeviceModel, Source};
use crate::error::PlatformError;
use crate::transport::{ConfigRequest, RestRequest, RestTarget, ShellRequest};

/// Global registry, built once from the built-in vendor table.
static REGISTRY: Lazy<Arc<ModelRegistry>> = Lazy::new(|| Arc::new(ModelRegistry::builtin()));

/// Read-only mapping from device model to retrieval definition.
///
/// The global instance is never mutated after startup; supporting a new
/// model means adding it to the vendor table. Separate instances can be
/// assembled for tests.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: IndexMap<DeviceModel, ModelDefinition>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            models: IndexMap::new(),
        }
    }

    /// Create a registry holding every built-in model.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for definition in vendors::builtin() {
            registry.models.insert(definition.model.clone(), definition);
        }
        registry
    }

    /// Get the global registry.
    pub fn global() -> Arc<ModelRegistry> {
        Arc::clone(&REGISTRY)
    }

    /// Add a definition, replacing any previous one for the same model.
    pub fn with_definition(mut self, definition: ModelDefinition) -> Self {
        self.models.insert(definition.model.clone(), definition);
        self
    }

    /// Look up a model.
    pub fn get(&self, model: &DeviceModel) -> Result<&ModelDefinition, PlatformError> {
        self.models
            .get(model)
            .ok_or_else(|| PlatformError::UnsupportedDeviceModel {
                model: model.to_string(),
                reason: "no command or endpoint is registered for this model".to_string(),
            })
    }

    /// Check if a model is registered.
    pub fn contains(&self, model: &DeviceModel) -> bool {
        self.models.contains_key(model)
    }

    /// List all registered models.
    pub fn models(&self) -> impl Iterator<Item = &DeviceModel> {
        self.models.keys()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Resolve the request used to fetch `device` over `source`.
    ///
    /// A REST endpoint override bypasses the registry, so a device of an
    /// unregistered model can still be fetched over REST when it names its
    /// own endpoint.
    pub fn resolve(
        &self,
        device: &DeviceDescriptor,
        source: Source,
    ) -> Result<ConfigRequest, PlatformError> {
        match source {
            Source::Shell => {
                let definition = self.get(device.device_model())?;
                Ok(ConfigRequest::Shell(ShellRequest {
                    command: definition.shell_command.clone(),
                    fallback_commands: definition.fallback_commands.clone(),
                    failed_when_contains: definition.failed_when_contains.clone(),
                }))
            }
            Source::Rest => {
                if let Some(endpoint) = device.rest_endpoint_override() {
                    return Ok(ConfigRequest::Rest(RestRequest::override_endpoint(endpoint)));
                }
                let definition = self.get(device.device_model())?;
                let path = definition.rest.render_path(device)?;
                Ok(ConfigRequest::Rest(RestRequest {
                    target: RestTarget::Path(path),
                    dialect: definition.rest.dialect.clone(),
                }))
            }
        }
    }
}
