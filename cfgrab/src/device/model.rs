//! Device model tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! device_models {
    ($($variant:ident => $tag:literal,)+) => {
        /// Device model tag used to select the retrieval command or endpoint.
        ///
        /// The built-in variants all have registry entries. Any other tag is
        /// kept verbatim in [`DeviceModel::Other`] so that an unfamiliar device
        /// can sit in an inventory and be reported as unsupported when fetched.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum DeviceModel {
            $(
                #[doc = concat!("`", $tag, "`")]
                $variant,
            )+
            /// A tag with no built-in registry entry.
            Other(String),
        }

        impl DeviceModel {
            /// The lowercase wire tag.
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $tag,)+
                    Self::Other(tag) => tag,
                }
            }

            /// Parse a tag, case-insensitively. Never fails.
            pub fn from_tag(tag: &str) -> Self {
                let tag = tag.trim().to_ascii_lowercase();
                match tag.as_str() {
                    $($tag => Self::$variant,)+
                    _ => Self::Other(tag),
                }
            }

            /// All built-in models, in declaration order.
            pub fn builtin() -> impl Iterator<Item = DeviceModel> {
                [$(Self::$variant,)+].into_iter()
            }
        }
    };
}

device_models! {
    Sonic => "sonic",
    Cisco => "cisco",
    Arista => "arista",
    Nokia => "nokia",
    Juniper => "juniper",
    Huawei => "huawei",
    Mikrotik => "mikrotik",
    Fortinet => "fortinet",
    PaloAlto => "paloalto",
    Checkpoint => "checkpoint",
    F5 => "f5",
    Linux => "linux",
    Ubuntu => "ubuntu",
    Debian => "debian",
    RedHat => "redhat",
    CentOs => "centos",
    Aruba => "aruba",
    Cumulus => "cumulus",
    Vyos => "vyos",
    OpenWrt => "openwrt",
    Ubiquiti => "ubiquiti",
    Meraki => "meraki",
    CiscoIos => "cisco_ios",
    CiscoNxos => "cisco_nxos",
    CiscoXe => "cisco_xe",
    CiscoIosXe => "cisco_iosxe",
    CiscoAsa => "cisco_asa",
}

impl DeviceModel {
    /// Whether this tag is one of the built-in models.
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self::Sonic
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceModel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

impl Serialize for DeviceModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceModel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}
