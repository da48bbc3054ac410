// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The published inventory view and the collaborator seams.
//!
//! The object broker, platform state source, and reboot inhibitor are
//! external to this service; only the narrow traits below are specified.
//! Production wires them to the real transport, tests use in-memory
//! fakes.

use crate::config::Encoding;
use crate::error::VpdManagerError;
use async_trait::async_trait;
use indexmap::IndexMap;

/// Interface prefix under which IPZ records are published; the record
/// name is appended.
pub const IPZ_VPD_INTERFACE_PREFIX: &str = "com.ibm.ipzvpd.";

/// Interface under which flat keyword VPD and DDIMM identity keywords
/// are published.
pub const KW_VPD_INTERFACE: &str = "com.ibm.ipzvpd.VINI";

/// Property carrying a DDIMM's computed capacity.
pub const MEMORY_SIZE_PROPERTY: &str = "MemorySizeInKB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Bytes(Vec<u8>),
    Text(String),
    Size(u64),
}

pub type PropertyMap = IndexMap<String, PropertyValue>;
pub type InterfaceMap = IndexMap<String, PropertyMap>;
pub type ObjectMap = IndexMap<String, InterfaceMap>;

/// The object broker's inventory surface.
#[async_trait]
pub trait InventoryClient: Send + Sync + 'static {
    /// Publish (merge) object views onto the inventory.
    async fn notify(&self, objects: ObjectMap) -> Result<(), VpdManagerError>;

    /// Clear everything published for one object.
    async fn clear_object(
        &self,
        object_path: &str,
    ) -> Result<(), VpdManagerError>;

    /// Whether the system VPD has appeared on the broker yet.
    async fn system_vpd_published(&self) -> bool;
}

/// Platform readiness, gating FRU collection.
#[async_trait]
pub trait PlatformState: Send + Sync + 'static {
    async fn is_ready(&self) -> bool;
}

/// Host reboot inhibitor held around every EEPROM write.
#[async_trait]
pub trait RebootGuard: Send + Sync + 'static {
    async fn inhibit(&self) -> Result<(), VpdManagerError>;
    async fn release(&self) -> Result<(), VpdManagerError>;
}

/// Apply a configured display encoding to a keyword value.
///
/// Unknown or inapplicable inputs pass through as raw bytes.
pub fn encode_keyword(
    value: &[u8],
    encoding: Option<Encoding>,
) -> PropertyValue {
    match encoding {
        Some(Encoding::Mac) => PropertyValue::Text(encode_mac(value)),
        Some(Encoding::Date) => match encode_date(value) {
            Some(date) => PropertyValue::Text(date),
            None => PropertyValue::Bytes(value.to_vec()),
        },
        None => PropertyValue::Bytes(value.to_vec()),
    }
}

/// Colon-separated lowercase hex pairs.
fn encode_mac(value: &[u8]) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for (i, byte) in value.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// `YYYY-MM-DD HH:MM`, skipping the 3-byte prefix ahead of the digits.
fn encode_date(value: &[u8]) -> Option<String> {
    const PREFIX: usize = 3;
    const DIGITS: usize = 12;
    let digits = value.get(PREFIX..PREFIX + DIGITS)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    Some(format!(
        "{}-{}-{} {}:{}",
        &s[..4],
        &s[4..6],
        &s[6..8],
        &s[8..10],
        &s[10..12]
    ))
}
