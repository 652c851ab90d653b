//! Linux host definitions.
//!
//! Plain Linux hosts have no running configuration as such; the network
//! configuration files stand in for it. Distributions differ in where they
//! keep them.

use crate::device::DeviceModel;
use crate::platform::ModelDefinition;

const FAILURE_PATTERNS: &[&str] = &[
    "command not found",
    "No such file or directory",
    "Permission denied",
    "Operation not permitted",
];

/// Create the Linux host definitions.
pub fn definitions() -> Vec<ModelDefinition> {
    vec![
        host(DeviceModel::Linux, "cat /etc/network/interfaces", "/api/config/network"),
        host(DeviceModel::Ubuntu, "cat /etc/netplan/*.yaml", "/api/config/netplan"),
        host(DeviceModel::Debian, "cat /etc/network/interfaces", "/api/config/network"),
        host(
            DeviceModel::RedHat,
            "cat /etc/sysconfig/network-scripts/ifcfg-*",
            "/api/config/network-scripts",
        ),
        host(
            DeviceModel::CentOs,
            "cat /etc/sysconfig/network-scripts/ifcfg-*",
            "/api/config/network-scripts",
        ),
        host(DeviceModel::OpenWrt, "cat /etc/config/network", "/api/config/network"),
    ]
}

fn host(model: DeviceModel, command: &str, rest_path: &str) -> ModelDefinition {
    ModelDefinition::new(model, command, rest_path).with_failure_patterns(FAILURE_PATTERNS)
}
