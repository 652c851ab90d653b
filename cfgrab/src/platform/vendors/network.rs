//! Network operating system definitions.
//!
//! Failure markers are the error banners each CLI prints in place of
//! output when a command is rejected.

use crate::device::DeviceModel;
use crate::platform::{ModelDefinition, RestEndpoint};

/// IOS-style `%` banners shared by Cisco, Arista, Aruba and friends.
const PERCENT_BANNERS: &[&str] = &[
    "% Invalid input",
    "% Ambiguous command",
    "% Incomplete command",
    "% Unknown command",
    "% Unavailable command",
];

/// Junos-style CLI errors, also used by VyOS and EdgeOS.
const JUNOS_ERRORS: &[&str] = &["unknown command", "syntax error", "is ambiguous"];

/// Create the network OS definitions.
pub fn definitions() -> Vec<ModelDefinition> {
    let restconf_native = "/restconf/data/Cisco-IOS-XE-native:native";

    vec![
        ModelDefinition::new(DeviceModel::Sonic, "show running-configuration", "/api/config")
            .with_fallback_command("cat /etc/sonic/config_db.json")
            .with_failure_pattern("Error: No such command"),
        ios(DeviceModel::Cisco, restconf_native),
        ios(DeviceModel::Arista, "/command-api")
            .with_rest(RestEndpoint::eapi("/command-api", "show running-config")),
        ModelDefinition::new(
            DeviceModel::Nokia,
            "show running-configuration",
            "/api/running-config",
        )
        .with_failure_patterns(&["MINOR: CLI", "MAJOR: CLI", "Bad Command:"]),
        ModelDefinition::new(DeviceModel::Juniper, "show configuration", "/rpc/get-configuration")
            .with_failure_patterns(JUNOS_ERRORS),
        ModelDefinition::new(
            DeviceModel::Huawei,
            "display current-configuration",
            "/restconf/data/huawei-configuration:configuration",
        )
        .with_failure_patterns(&["Error: Unrecognized command", "Error: Wrong parameter"]),
        ModelDefinition::new(DeviceModel::Mikrotik, "export", "/rest/configuration/export")
            .with_failure_patterns(&["bad command name", "syntax error"]),
        ModelDefinition::new(
            DeviceModel::Fortinet,
            "show full-configuration",
            "/api/v2/monitor/system/config/backup",
        )
        .with_failure_patterns(&["Unknown action", "Command fail."]),
        ModelDefinition::new(
            DeviceModel::PaloAlto,
            "show config running",
            "/api/?type=export&category=configuration",
        )
        .with_failure_patterns(&["Invalid syntax.", "Unknown command:"]),
        ModelDefinition::new(
            DeviceModel::Checkpoint,
            "show configuration",
            "/web_api/show-configuration",
        )
        .with_failure_pattern("CLINFR0329  Invalid command"),
        ModelDefinition::new(DeviceModel::F5, "tmsh show running-config", "/mgmt/tm/sys/config")
            .with_failure_pattern("Syntax Error:"),
        ios(DeviceModel::Aruba, "/v1/configuration/running-config"),
        ModelDefinition::new(
            DeviceModel::Cumulus,
            "show running-config",
            "/api/config/running-config",
        )
        .with_failure_patterns(&["% Unknown command", "ERROR: "]),
        ModelDefinition::new(DeviceModel::Vyos, "show configuration", "/rest/configuration")
            .with_failure_patterns(JUNOS_ERRORS),
        ModelDefinition::new(DeviceModel::Ubiquiti, "show configuration", "/api/configuration")
            .with_failure_patterns(JUNOS_ERRORS),
        ios(
            DeviceModel::Meraki,
            "/api/v1/networks/{networkId}/devices/{serial}/configuration",
        ),
        ios(DeviceModel::CiscoIos, restconf_native),
        ios(DeviceModel::CiscoNxos, "/ins"),
        ios(DeviceModel::CiscoXe, restconf_native),
        ios(DeviceModel::CiscoIosXe, restconf_native),
        ios(DeviceModel::CiscoAsa, "/api/config")
            .with_failure_pattern("ERROR: % Invalid input detected"),
    ]
}

fn ios(model: DeviceModel, rest_path: &str) -> ModelDefinition {
    ModelDefinition::new(model, "show running-config", rest_path)
        .with_failure_patterns(PERCENT_BANNERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::RestDialect;

    fn find(model: DeviceModel) -> ModelDefinition {
        definitions().into_iter().find(|d| d.model == model).unwrap()
    }

    #[test]
    fn test_network_definition_count() {
        assert_eq!(definitions().len(), 21);
    }

    #[test]
    fn test_sonic_definition() {
        let sonic = find(DeviceModel::Sonic);
        assert_eq!(sonic.shell_command, "show running-configuration");
        assert_eq!(sonic.rest_path_template(), "/api/config");
        assert_eq!(sonic.fallback_commands, vec!["cat /etc/sonic/config_db.json"]);
    }

    #[test]
    fn test_cisco_family_shares_ios_banners() {
        for model in [
            DeviceModel::Cisco,
            DeviceModel::CiscoIos,
            DeviceModel::CiscoNxos,
            DeviceModel::CiscoXe,
            DeviceModel::CiscoIosXe,
            DeviceModel::CiscoAsa,
        ] {
            let def = find(model);
            assert_eq!(def.shell_command, "show running-config");
            assert!(
                def.failed_when_contains
                    .contains(&"% Invalid input".to_string())
            );
        }
        assert_eq!(find(DeviceModel::CiscoNxos).rest_path_template(), "/ins");
    }

    #[test]
    fn test_arista_uses_eapi() {
        let arista = find(DeviceModel::Arista);
        assert_eq!(arista.rest_path_template(), "/command-api");
        assert_eq!(
            arista.rest.dialect,
            RestDialect::Eapi {
                commands: vec!["show running-config".to_string()]
            }
        );
    }

    #[test]
    fn test_vendor_commands() {
        assert_eq!(find(DeviceModel::Huawei).shell_command, "display current-configuration");
        assert_eq!(find(DeviceModel::Mikrotik).shell_command, "export");
        assert_eq!(find(DeviceModel::Fortinet).shell_command, "show full-configuration");
        assert_eq!(find(DeviceModel::PaloAlto).shell_command, "show config running");
        assert_eq!(find(DeviceModel::F5).shell_command, "tmsh show running-config");
    }
}
