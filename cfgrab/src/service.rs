//! Service facade wiring the inventory store to the orchestrator.
//!
//! Each method corresponds to one operation of the request-handling layer
//! and returns its response envelope. Only caller-input errors (malformed
//! bodies or descriptors) are returned as `Err`; per-device failures are
//! reported inside the response.

use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::api::{
    ConfigResponse, DeviceSummary, DevicesBody, HostFilter, InventoryResponse, hosts_from_json,
    inventory_name,
};
use crate::config::EngineConfig;
use crate::device::{DeviceDescriptor, DeviceSpec};
use crate::error::Result;
use crate::inventory::{InventoryStats, InventoryStore};
use crate::retrieval::{AggregatedResult, ConnectivityReport, Orchestrator};
use crate::transport::{ConfigFetcher, ProtocolClients};

/// Label used in responses for ad-hoc single-device fetches.
pub const SINGLE_DEVICE_INVENTORY: &str = "single-device";

/// Inventory management and configuration retrieval.
pub struct ConfigService<F = ProtocolClients> {
    store: Arc<InventoryStore>,
    orchestrator: Orchestrator<F>,
}

impl ConfigService<ProtocolClients> {
    /// A service with an empty store and the production protocol clients.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(InventoryStore::new()),
            Orchestrator::from_engine_config(config)?,
        ))
    }
}

impl<F: ConfigFetcher> ConfigService<F> {
    pub fn new(store: Arc<InventoryStore>, orchestrator: Orchestrator<F>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    pub fn store(&self) -> &Arc<InventoryStore> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator<F> {
        &self.orchestrator
    }

    /// Add devices. The whole body is validated before anything is stored.
    pub fn add_devices(
        &self,
        inventory: Option<&str>,
        body: impl Into<DevicesBody>,
    ) -> Result<InventoryResponse> {
        let inventory = inventory_name(inventory);
        let devices = body.into().into_descriptors()?;
        let report = self.store.add(&inventory, devices);

        let message = if report.added.is_empty() {
            "No new devices were added (all devices already exist)".to_string()
        } else {
            format!(
                "Successfully added {} device(s) to inventory",
                report.added.len()
            )
        };

        Ok(InventoryResponse {
            success: true,
            message,
            inventory,
            affected_hosts: report.added,
            skipped_hosts: report.skipped_duplicates,
        })
    }

    /// [`add_devices`](Self::add_devices) from a JSON body.
    pub fn add_devices_json(&self, inventory: Option<&str>, body: &str) -> Result<InventoryResponse> {
        self.add_devices(inventory, DevicesBody::from_json(body)?)
    }

    /// Remove devices by host.
    pub fn remove_devices<I, S>(&self, inventory: Option<&str>, hosts: I) -> InventoryResponse
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inventory = inventory_name(inventory);
        let report = self.store.remove(&inventory, hosts);

        InventoryResponse {
            success: true,
            message: format!(
                "Successfully removed {} device(s) from inventory",
                report.removed.len()
            ),
            inventory,
            affected_hosts: report.removed,
            skipped_hosts: report.not_found,
        }
    }

    /// [`remove_devices`](Self::remove_devices) from a JSON body of device
    /// objects; only their `host` fields are read.
    pub fn remove_devices_json(
        &self,
        inventory: Option<&str>,
        body: &str,
    ) -> Result<InventoryResponse> {
        let hosts = hosts_from_json(body)?;
        Ok(self.remove_devices(inventory, hosts))
    }

    pub fn clear_inventory(&self, inventory: Option<&str>) -> InventoryResponse {
        let inventory = inventory_name(inventory);
        let removed = self.store.clear(&inventory);

        InventoryResponse {
            success: true,
            message: format!("Successfully cleared {removed} device(s) from inventory"),
            inventory,
            affected_hosts: vec![],
            skipped_hosts: vec![],
        }
    }

    pub fn list_devices(
        &self,
        inventory: Option<&str>,
        filter: Option<&HostFilter>,
    ) -> Vec<DeviceSummary> {
        let hosts = filter.map(HostFilter::hosts);
        self.store
            .list(&inventory_name(inventory), hosts.as_deref())
            .iter()
            .map(|device| DeviceSummary::from(device.as_ref()))
            .collect()
    }

    pub fn inventory_names(&self) -> Vec<String> {
        self.store.names()
    }

    pub fn inventory_stats(&self, inventory: Option<&str>) -> InventoryStats {
        self.store.stats(&inventory_name(inventory))
    }

    /// Fetch configurations for an inventory, optionally restricted to
    /// some hosts, with an optional per-fetch deadline override.
    ///
    /// Nothing to fetch is not an error: the response succeeds with no
    /// results and says why.
    pub async fn retrieve(
        &self,
        inventory: Option<&str>,
        filter: Option<HostFilter>,
        timeout: Option<Duration>,
    ) -> ConfigResponse {
        let inventory = inventory_name(inventory);
        let hosts = filter.as_ref().map(HostFilter::hosts);
        let devices = self.store.list(&inventory, hosts.as_deref());

        let mut missing: Vec<String> = match &hosts {
            Some(hosts) => hosts
                .iter()
                .filter(|host| !devices.iter().any(|d| d.host() == host.as_str()))
                .map(|host| format!("No device found with host '{host}' in inventory '{inventory}'"))
                .collect(),
            None => vec![],
        };

        if devices.is_empty() {
            let message = match hosts.as_deref() {
                Some([host]) => {
                    format!("No device found with host '{host}' in inventory '{inventory}'")
                }
                Some(_) => format!("No matching devices found in inventory '{inventory}'"),
                None => format!("No devices found in inventory '{inventory}'"),
            };
            if missing.is_empty() {
                missing.push(message.clone());
            }
            return ConfigResponse {
                success: true,
                message,
                inventory,
                results: vec![],
                messages: missing,
                succeeded: 0,
                failed: 0,
            };
        }

        let timeout = self.effective_timeout(timeout);
        let result = self
            .orchestrator
            .retrieve_with_timeout(&devices, timeout)
            .await;

        let message = format!(
            "Retrieved configurations for {} device(s) ({})",
            devices.len(),
            result.summary()
        );
        config_response(inventory, message, result, missing)
    }

    /// A per-call override, or the configured timeout. Zero is not a usable
    /// override.
    fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        let configured = self.orchestrator.fetch_timeout();
        match requested {
            Some(timeout) if timeout.is_zero() => {
                warn!("Ignoring zero timeout override, using {configured:?}");
                configured
            }
            Some(timeout) => timeout,
            None => configured,
        }
    }

    /// Fetch one device that is not in any inventory.
    pub async fn fetch_device(
        &self,
        spec: DeviceSpec,
        timeout: Option<Duration>,
    ) -> Result<ConfigResponse> {
        let device = Arc::new(DeviceDescriptor::try_from(spec)?);
        let timeout = self.effective_timeout(timeout);
        let result = self
            .orchestrator
            .retrieve_with_timeout(std::slice::from_ref(&device), timeout)
            .await;

        let message = match result.iter().find_map(|o| o.error()) {
            Some(error) => format!("Failed to fetch config from {}: {error}", device.host()),
            None => format!(
                "Configuration fetched from {} via {}",
                device.host(),
                device.protocol()
            ),
        };
        Ok(config_response(
            SINGLE_DEVICE_INVENTORY.to_string(),
            message,
            result,
            vec![],
        ))
    }

    /// Probe the devices of an inventory.
    pub async fn check_connectivity(
        &self,
        inventory: Option<&str>,
        filter: Option<HostFilter>,
    ) -> Vec<ConnectivityReport> {
        let hosts = filter.as_ref().map(HostFilter::hosts);
        let devices = self.store.list(&inventory_name(inventory), hosts.as_deref());
        self.orchestrator.check_connectivity(&devices).await
    }
}

fn config_response(
    inventory: String,
    message: String,
    result: AggregatedResult,
    extra_messages: Vec<String>,
) -> ConfigResponse {
    let mut messages: Vec<String> = result
        .iter()
        .map(|outcome| match outcome.error() {
            Some(error) => format!("Failed to fetch config for {}: {error}", outcome.host),
            None => format!(
                "Configuration fetched for {} via {}",
                outcome.host, outcome.source
            ),
        })
        .collect();
    messages.extend(extra_messages);

    ConfigResponse {
        success: true,
        message,
        inventory,
        succeeded: result.succeeded(),
        failed: result.failed(),
        results: result.into_outcomes(),
        messages,
    }
}
