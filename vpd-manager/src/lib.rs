// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! VPD service layer: configured EEPROMs, transactional keyword writes,
//! FRU collection onto the inventory, and location codes.
//!
//! The byte-level formats live in `vpd-codec`; this crate owns files,
//! configuration, and the collaborator seams (object broker, platform
//! state, reboot inhibitor).

pub mod config;
pub mod eeprom;
pub mod editor;
pub mod manager;
pub mod publish;

mod error;

pub use config::SystemConfig;
pub use error::VpdManagerError;
pub use manager::CollectionStatus;
pub use manager::ReadRequest;
pub use manager::VpdManager;
pub use manager::WriteRequest;
