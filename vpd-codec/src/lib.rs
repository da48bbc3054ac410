// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte-level codec for the two VPD wire formats carried on FRU EEPROMs:
//! the record-oriented IPZ container and the flat keyword container, plus
//! the DDR5 DDIMM SPD decoder and the ECC engine protecting IPZ records.
//!
//! Everything in this crate operates on in-memory byte buffers. Parsers
//! that repair correctable ECC damage do so in place and report the
//! repaired windows so the file-owning layer can persist them; no file
//! I/O happens here.

pub mod cursor;
pub mod ddimm;
pub mod ecc;
pub mod fixture;
pub mod ipz;
pub mod keyword_vpd;

mod error;

pub use error::VpdError;

use indexmap::IndexMap;

/// Keyword name → value bytes, insertion-ordered, unique keys.
pub type KeywordMap = IndexMap<String, Vec<u8>>;

/// Record name → keyword map, insertion-ordered, unique keys.
pub type RecordMap = IndexMap<String, KeywordMap>;

/// A byte window of a VPD buffer, identified by offset and length.
///
/// Windows are how parsers tell the file layer which buffer ranges were
/// modified (correctable-ECC repairs, keyword updates, refreshed ECC) and
/// therefore need to be written back to the EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub len: usize,
}

impl Window {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }
}

/// Leading tag of a keyword-VPD blob (large resource type).
pub const KW_VPD_START_TAG: u8 = 0x84;
/// Vendor-defined keyword pair start tag.
pub const KW_VPD_PAIR_START_TAG: u8 = 0x90;
/// Alternate accepted keyword pair start tag.
pub const ALT_KW_VPD_PAIR_START_TAG: u8 = 0x91;
/// Small-resource tag ending the keyword pair section.
pub const KW_VAL_PAIR_END_TAG: u8 = 0x78;
/// Final tag of a keyword-VPD blob.
pub const KW_VPD_END_TAG: u8 = 0x79;

/// Offset of the "VHDR" record name within an IPZ blob.
pub const VHDR_NAME_OFFSET: usize = 17;

/// Low nibble of SPD byte 2 identifying DDR5 DRAM.
pub const SPD_DDR5_NIBBLE: u8 = 0x02;

/// The concrete VPD formats a blob can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpdKind {
    Ipz,
    KwVpd,
    DdimmSpd,
}

/// Select the parser for a blob from its leading bytes.
///
/// Deterministic and total: every input maps to exactly one kind or to
/// `MalformedData`.
pub fn identify(blob: &[u8]) -> Result<VpdKind, VpdError> {
    if blob.len() >= VHDR_NAME_OFFSET + ipz::RECORD_NAME_LEN
        && &blob[VHDR_NAME_OFFSET..VHDR_NAME_OFFSET + ipz::RECORD_NAME_LEN]
            == b"VHDR"
    {
        return Ok(VpdKind::Ipz);
    }
    if blob.first() == Some(&KW_VPD_START_TAG) {
        return Ok(VpdKind::KwVpd);
    }
    if blob.len() > 2 && blob[2] & 0x0f == SPD_DDR5_NIBBLE {
        return Ok(VpdKind::DdimmSpd);
    }
    Err(VpdError::MalformedData("unrecognized VPD format"))
}
