// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DDR5 DDIMM SPD decoder.
//!
//! Computes the module capacity from the organization bitfields and pulls
//! the identity keywords out of the 11S barcode block. DDR4 modules are
//! rejected; a capacity that evaluates to zero (any bitfield outside its
//! validity window) fails the parse.

use crate::cursor::Cursor;
use crate::KeywordMap;
use crate::VpdError;

const SPD_BYTE_2: usize = 2;
const SPD_BYTE_4: usize = 4;
const SPD_BYTE_6: usize = 6;
const SPD_BYTE_234: usize = 234;
const SPD_BYTE_235: usize = 235;

const SPD_DRAM_TYPE_DDR5: u8 = 0x12;

/// Start of the 11S barcode block and its field lengths.
const BARCODE_OFFSET: usize = 416;
const BARCODE_MARKER: &[u8; 3] = b"11S";
const PART_NUMBER_LEN: usize = 7;
const SERIAL_NUMBER_LEN: usize = 12;
const CCIN_LEN: usize = 4;

/// Decoded DDIMM SPD: capacity plus identity keywords (PN/FN, SN, CC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdimmVpd {
    pub size_kb: u64,
    pub keywords: KeywordMap,
}

/// SDRAM density per die in Gb, from SPD byte 4 bits 0-4.
fn density_per_die(encoded: u8) -> u64 {
    match encoded {
        1..=4 => 4 * u64::from(encoded),
        5 => 24,
        6 => 32,
        7 => 48,
        8 => 64,
        _ => 0,
    }
}

/// Die per package, from SPD byte 4 bits 5-7.
fn die_per_package(encoded: u8) -> u64 {
    match encoded {
        0..=1 => u64::from(encoded) + 1,
        2..=5 => 1 << (encoded - 1),
        _ => 0,
    }
}

/// Capacity in kilobytes, or 0 when any organization field is outside
/// its validity window.
pub fn ddr5_size_kb(blob: &[u8]) -> Result<u64, VpdError> {
    if blob.len() <= SPD_BYTE_235 {
        return Err(VpdError::MalformedData("truncated SPD data"));
    }

    let byte4 = blob[SPD_BYTE_4];
    let byte6 = blob[SPD_BYTE_6];
    let byte234 = blob[SPD_BYTE_234];
    let byte235 = blob[SPD_BYTE_235];

    let channels =
        u64::from(byte235 & 0x01 != 0) + u64::from(byte235 & 0x08 != 0);
    if channels == 0 {
        return Ok(0);
    }

    let bus_width = match byte235 & 0x07 {
        1..=3 => 32u64,
        _ => return Ok(0),
    };

    let die = die_per_package((byte4 & 0xe0) >> 5);
    if die == 0 {
        return Ok(0);
    }

    let density = density_per_die(byte4 & 0x1f);
    if density == 0 {
        return Ok(0);
    }

    let ranks = u64::from((byte234 & 0x38) >> 3) + u64::from(byte234 & 0x07) + 2;

    let dram_width = match (byte6 & 0xe0) >> 5 {
        v @ 0..=3 => 4u64 << v,
        _ => return Ok(0),
    };

    let size_mb = channels * bus_width * die * density * ranks
        / (8 * dram_width);
    Ok(size_mb * 1024)
}

/// Decode a DDR5 SPD image: capacity plus the identity keywords behind
/// the 11S barcode marker.
pub fn parse(blob: &[u8]) -> Result<DdimmVpd, VpdError> {
    if blob.len() <= SPD_BYTE_2 {
        return Err(VpdError::MalformedData("truncated SPD data"));
    }
    if blob[SPD_BYTE_2] != SPD_DRAM_TYPE_DDR5 {
        // DDR4 and friends are not decoded.
        return Err(VpdError::MalformedData("SPD is not DDR5"));
    }

    let size_kb = ddr5_size_kb(blob)?;
    if size_kb == 0 {
        return Err(VpdError::MalformedData("dimm capacity computed as zero"));
    }

    let mut cur = Cursor::at(blob, BARCODE_OFFSET)?;
    if cur.take(BARCODE_MARKER.len())? != BARCODE_MARKER {
        return Err(VpdError::MalformedData("11S barcode marker not found"));
    }
    let part_number = cur.take(PART_NUMBER_LEN)?.to_vec();
    let serial_number = cur.take(SERIAL_NUMBER_LEN)?.to_vec();
    let ccin = cur.take(CCIN_LEN)?.to_vec();

    let mut keywords = KeywordMap::new();
    keywords.insert("FN".to_string(), part_number.clone());
    keywords.insert("PN".to_string(), part_number);
    keywords.insert("SN".to_string(), serial_number);
    keywords.insert("CC".to_string(), ccin);

    Ok(DdimmVpd { size_kb, keywords })
}
