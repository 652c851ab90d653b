//! Named device inventories.
//!
//! An [`InventoryStore`] holds any number of inventories, each an
//! insertion-ordered set of descriptors keyed by host. Inventories come into
//! existence the first time their name is used and are never dropped, even
//! when emptied.
//!
//! Every operation takes the store lock once and does no I/O while holding
//! it, so readers always see a state between two whole mutations.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use indexmap::map::Entry;
use log::info;
use serde::Serialize;

use crate::device::DeviceDescriptor;

/// Inventory name used when none is given.
pub const DEFAULT_INVENTORY: &str = "default";

type Inventory = IndexMap<String, Arc<DeviceDescriptor>>;

/// Result of [`InventoryStore::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddReport {
    pub added: Vec<String>,
    pub skipped_duplicates: Vec<String>,
}

/// Result of [`InventoryStore::remove`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveReport {
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
}

/// Device counts for one inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub total: usize,
    /// Count per model tag, in order of first appearance.
    pub by_device_model: IndexMap<String, usize>,
}

/// Process-wide collection of named inventories.
///
/// Cheap to share behind an `Arc`; tests create their own instances.
#[derive(Debug, Default)]
pub struct InventoryStore {
    inventories: RwLock<IndexMap<String, Inventory>>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, Inventory>> {
        self.inventories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, Inventory>> {
        self.inventories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add devices. A host already present, or repeated within `devices`,
    /// is reported as a duplicate and left unchanged.
    pub fn add(
        &self,
        inventory: &str,
        devices: impl IntoIterator<Item = DeviceDescriptor>,
    ) -> AddReport {
        let mut report = AddReport::default();
        {
            let mut inventories = self.write();
            let entries = inventories.entry(inventory.to_string()).or_default();
            for device in devices {
                match entries.entry(device.host().to_string()) {
                    Entry::Occupied(entry) => report.skipped_duplicates.push(entry.key().clone()),
                    Entry::Vacant(entry) => {
                        report.added.push(entry.key().clone());
                        entry.insert(Arc::new(device));
                    }
                }
            }
        }

        info!(
            "Inventory '{inventory}': added {}, skipped {} duplicate(s)",
            report.added.len(),
            report.skipped_duplicates.len()
        );
        report
    }

    /// Remove devices by host. Unknown hosts are reported, not errors.
    pub fn remove<I, S>(&self, inventory: &str, hosts: I) -> RemoveReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = RemoveReport::default();
        {
            let mut inventories = self.write();
            let entries = inventories.entry(inventory.to_string()).or_default();
            for host in hosts {
                let host = host.as_ref();
                match entries.shift_remove(host) {
                    Some(_) => report.removed.push(host.to_string()),
                    None => report.not_found.push(host.to_string()),
                }
            }
        }

        info!(
            "Inventory '{inventory}': removed {}, {} not found",
            report.removed.len(),
            report.not_found.len()
        );
        report
    }

    /// Devices in insertion order, optionally restricted to `hosts`.
    ///
    /// An unknown inventory yields nothing and is registered under its name.
    pub fn list(&self, inventory: &str, hosts: Option<&[String]>) -> Vec<Arc<DeviceDescriptor>> {
        {
            let inventories = self.read();
            if let Some(entries) = inventories.get(inventory) {
                return select(entries, hosts);
            }
        }

        let mut inventories = self.write();
        let entries = inventories.entry(inventory.to_string()).or_default();
        select(entries, hosts)
    }

    /// Look up one device.
    pub fn get(&self, inventory: &str, host: &str) -> Option<Arc<DeviceDescriptor>> {
        self.read()
            .get(inventory)
            .and_then(|entries| entries.get(host))
            .cloned()
    }

    /// Remove every device, keeping the (now empty) inventory.
    pub fn clear(&self, inventory: &str) -> usize {
        let removed = {
            let mut inventories = self.write();
            let entries = inventories.entry(inventory.to_string()).or_default();
            let count = entries.len();
            entries.clear();
            count
        };

        info!("Inventory '{inventory}': cleared {removed} device(s)");
        removed
    }

    /// Names of every inventory ever referenced, in order of first use.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Device totals for an inventory.
    pub fn stats(&self, inventory: &str) -> InventoryStats {
        let inventories = self.read();
        let Some(entries) = inventories.get(inventory) else {
            return InventoryStats::default();
        };

        let mut by_device_model = IndexMap::new();
        for device in entries.values() {
            *by_device_model
                .entry(device.device_model().to_string())
                .or_insert(0) += 1;
        }
        InventoryStats {
            total: entries.len(),
            by_device_model,
        }
    }

    /// Number of devices in an inventory.
    pub fn len(&self, inventory: &str) -> usize {
        self.read().get(inventory).map_or(0, IndexMap::len)
    }
}

fn select(entries: &Inventory, hosts: Option<&[String]>) -> Vec<Arc<DeviceDescriptor>> {
    match hosts {
        None => entries.values().cloned().collect(),
        Some(hosts) => entries
            .iter()
            .filter(|(host, _)| hosts.iter().any(|h| h == *host))
            .map(|(_, device)| Arc::clone(device))
            .collect(),
    }
}
