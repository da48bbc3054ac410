// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! System configuration: the JSON mapping from EEPROM device paths to
//! inventory objects, publication interfaces, and redundancy.
//!
//! The map is loaded once at startup and read-only afterwards.

use crate::error::VpdManagerError;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// interface → property → how to populate it.
pub type InterfaceSpecs = IndexMap<String, IndexMap<String, PropertySpec>>;

/// Inventory property published from a FRU's location-code interface.
pub const LOCATION_CODE_PROPERTY: &str = "LocationCode";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    /// EEPROM device path → the FRUs stored on it.
    #[serde(default)]
    pub frus: IndexMap<String, Vec<FruEntry>>,

    /// Interfaces published for every FRU.
    #[serde(default)]
    pub common_interfaces: InterfaceSpecs,

    /// Device-tree tag the firmware environment must match.
    #[serde(default)]
    pub dev_tree: Option<DevTree>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FruEntry {
    /// Inventory object representing this FRU.
    pub inventory_path: String,

    /// Offset of the VPD within the EEPROM.
    #[serde(default)]
    pub offset: u64,

    /// Optional second EEPROM mirroring this FRU's VPD.
    #[serde(default)]
    pub redundant_eeprom: Option<String>,

    /// Whether the parsed record map is republished under the FRU's
    /// object.
    #[serde(default = "default_inherit")]
    pub inherit: bool,

    /// Records whose raw keywords are published even when `inherit` is
    /// off.
    #[serde(default)]
    pub copy_records: Vec<String>,

    /// Extra interfaces published for this FRU only.
    #[serde(default)]
    pub extra_interfaces: InterfaceSpecs,
}

fn default_inherit() -> bool {
    true
}

/// One property of a published interface: either sourced from a VPD
/// keyword or a literal value carried verbatim from the configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PropertySpec {
    Keyword(KeywordSource),
    Literal(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSource {
    pub record_name: String,
    pub keyword_name: String,
    #[serde(default)]
    pub encoding: Option<Encoding>,
}

/// Display encodings applied when publishing a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Encoding {
    #[serde(rename = "MAC")]
    Mac,
    #[serde(rename = "DATE")]
    Date,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevTree {
    pub value: String,
}

impl SystemConfig {
    pub fn load(path: &Path) -> Result<Self, VpdManagerError> {
        let raw = fs::read(path)
            .map_err(|err| VpdManagerError::io(path.display().to_string(), err))?;
        serde_json::from_slice(&raw).map_err(|err| {
            VpdManagerError::Config(format!(
                "failed to parse {}: {err}",
                path.display()
            ))
        })
    }

    /// Find the FRU declared for an inventory object path.
    pub fn fru_by_inventory_path(
        &self,
        object_path: &str,
    ) -> Option<(&str, &FruEntry)> {
        self.frus.iter().find_map(|(eeprom, entries)| {
            entries
                .iter()
                .find(|entry| entry.inventory_path == object_path)
                .map(|entry| (eeprom.as_str(), entry))
        })
    }

    pub fn entries_for_eeprom(&self, eeprom: &str) -> &[FruEntry] {
        self.frus.get(eeprom).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first FRU declared on an EEPROM, which carries the offset and
    /// redundancy settings.
    pub fn primary_entry(&self, eeprom: &str) -> Option<&FruEntry> {
        self.entries_for_eeprom(eeprom).first()
    }

    /// VPD start offset for an EEPROM; 0 when unconfigured.
    pub fn vpd_offset(&self, eeprom: &str) -> u64 {
        self.primary_entry(eeprom).map(|entry| entry.offset).unwrap_or(0)
    }

    pub fn redundant_eeprom(&self, eeprom: &str) -> Option<&str> {
        self.primary_entry(eeprom)?.redundant_eeprom.as_deref()
    }

    /// The EEPROM behind an inventory object.
    pub fn hardware_path_for(&self, object_path: &str) -> Option<&str> {
        self.fru_by_inventory_path(object_path).map(|(eeprom, _)| eeprom)
    }

    /// Inventory objects whose configured `LocationCode` literal matches
    /// `code`.
    pub fn frus_by_location_code(&self, code: &str) -> Vec<String> {
        let mut paths = Vec::new();
        for entries in self.frus.values() {
            for entry in entries {
                let matches = entry.extra_interfaces.values().any(|props| {
                    matches!(
                        props.get(LOCATION_CODE_PROPERTY),
                        Some(PropertySpec::Literal(serde_json::Value::String(
                            s,
                        ))) if s == code
                    )
                });
                if matches {
                    paths.push(entry.inventory_path.clone());
                }
            }
        }
        paths
    }

    /// Verify the configured device-tree tag matches the firmware
    /// environment. A mismatch is a configuration error; acting on it is
    /// someone else's job.
    pub fn devtree_matches(&self, tag: &str) -> Result<(), VpdManagerError> {
        match &self.dev_tree {
            Some(dev_tree) if dev_tree.value != tag => {
                Err(VpdManagerError::Config(format!(
                    "device tree mismatch: configured {:?}, running {tag:?}",
                    dev_tree.value
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "commonInterfaces": {
            "xyz.openbmc_project.Inventory.Decorator.Asset": {
                "SerialNumber": {
                    "recordName": "VINI",
                    "keywordName": "SN"
                }
            }
        },
        "devTree": { "value": "system-2u.dtb" },
        "frus": {
            "/sys/bus/i2c/drivers/at24/8-0050/eeprom": [
                {
                    "inventoryPath": "/system/chassis/motherboard",
                    "offset": 1024,
                    "redundantEeprom": "/sys/bus/i2c/drivers/at24/9-0050/eeprom",
                    "extraInterfaces": {
                        "com.ibm.ipzvpd.Location": {
                            "LocationCode": "Ufcs-P0"
                        },
                        "xyz.openbmc_project.Inventory.Item.NetworkInterface": {
                            "MACAddress": {
                                "recordName": "VCFG",
                                "keywordName": "B1",
                                "encoding": "MAC"
                            }
                        }
                    }
                }
            ],
            "/sys/bus/i2c/drivers/at24/4-0051/eeprom": [
                {
                    "inventoryPath": "/system/chassis/motherboard/dimm0",
                    "inherit": false,
                    "copyRecords": ["VINI"],
                    "extraInterfaces": {
                        "com.ibm.ipzvpd.Location": {
                            "LocationCode": "Ufcs-P0-C12"
                        }
                    }
                }
            ]
        }
    }"#;

    pub(crate) fn sample_config() -> SystemConfig {
        serde_json::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn parses_the_sample() {
        let config = sample_config();
        assert_eq!(config.frus.len(), 2);
        assert_eq!(config.common_interfaces.len(), 1);
        assert_eq!(config.dev_tree.as_ref().unwrap().value, "system-2u.dtb");
    }

    #[test]
    fn fru_lookup_by_inventory_path() {
        let config = sample_config();
        let (eeprom, entry) = config
            .fru_by_inventory_path("/system/chassis/motherboard")
            .unwrap();
        assert_eq!(eeprom, "/sys/bus/i2c/drivers/at24/8-0050/eeprom");
        assert_eq!(entry.offset, 1024);
        assert!(entry.inherit);
        assert_eq!(
            entry.redundant_eeprom.as_deref(),
            Some("/sys/bus/i2c/drivers/at24/9-0050/eeprom")
        );
    }

    #[test]
    fn inherit_defaults_to_true_and_can_be_disabled() {
        let config = sample_config();
        let (_, dimm) = config
            .fru_by_inventory_path("/system/chassis/motherboard/dimm0")
            .unwrap();
        assert!(!dimm.inherit);
        assert_eq!(dimm.copy_records, ["VINI"]);
        assert_eq!(dimm.offset, 0);
    }

    #[test]
    fn keyword_sources_and_literals_both_deserialize() {
        let config = sample_config();
        let (_, entry) = config
            .fru_by_inventory_path("/system/chassis/motherboard")
            .unwrap();
        let net = &entry.extra_interfaces
            ["xyz.openbmc_project.Inventory.Item.NetworkInterface"];
        match &net["MACAddress"] {
            PropertySpec::Keyword(src) => {
                assert_eq!(src.record_name, "VCFG");
                assert_eq!(src.keyword_name, "B1");
                assert_eq!(src.encoding, Some(Encoding::Mac));
            }
            other => panic!("expected keyword source, got {other:?}"),
        }
        let loc = &entry.extra_interfaces["com.ibm.ipzvpd.Location"];
        assert!(matches!(
            &loc[LOCATION_CODE_PROPERTY],
            PropertySpec::Literal(serde_json::Value::String(s))
                if s == "Ufcs-P0"
        ));
    }

    #[test]
    fn location_code_scan_finds_matching_frus() {
        let config = sample_config();
        assert_eq!(
            config.frus_by_location_code("Ufcs-P0-C12"),
            ["/system/chassis/motherboard/dimm0"]
        );
        assert!(config.frus_by_location_code("Ufcs-P9").is_empty());
    }

    #[test]
    fn devtree_mismatch_is_a_config_error() {
        let config = sample_config();
        assert!(config.devtree_matches("system-2u.dtb").is_ok());
        assert!(matches!(
            config.devtree_matches("other.dtb"),
            Err(VpdManagerError::Config(_))
        ));
    }
}
