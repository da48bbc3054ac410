// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flat keyword VPD container.
//!
//! Layout: start tag (0x84), 2-byte LE header size, header bytes, pair
//! start tag (0x90 or 0x91), 2-byte LE payload size, then {2-byte keyword
//! name, 1-byte length, value} pairs, the pair end tag (0x78), a 1-byte
//! checksum, 2 reserved bytes, and the final tag (0x79). The checksum is
//! the two's complement of the byte sum from the pair start tag up to but
//! not including the end tag.

use crate::cursor::Cursor;
use crate::ipz::KeywordSlot;
use crate::KeywordMap;
use crate::VpdError;
use crate::Window;
use crate::ALT_KW_VPD_PAIR_START_TAG;
use crate::KW_VAL_PAIR_END_TAG;
use crate::KW_VPD_END_TAG;
use crate::KW_VPD_PAIR_START_TAG;

/// Keyword name length.
const KW_NAME_LEN: usize = 2;
/// Reserved bytes between the checksum and the final tag.
const TRAILER_RESERVED: usize = 2;

/// Outcome of an in-buffer keyword-VPD update.
#[derive(Debug)]
pub struct KwVpdUpdate {
    pub bytes_written: usize,
    pub value_window: Window,
    pub checksum_window: Window,
}

/// Skip the start tag and header, leaving the cursor on the pair start
/// tag.
fn seek_pair_start(blob: &[u8]) -> Result<Cursor<'_>, VpdError> {
    let mut cur = Cursor::new(blob);
    if cur.u8()? != crate::KW_VPD_START_TAG {
        return Err(VpdError::MalformedData("invalid keyword VPD start tag"));
    }
    let header_len = cur.u16_le()? as usize;
    cur.skip(header_len)?;
    Ok(cur)
}

/// Decode the keyword pairs, verifying the checksum and both trailer
/// tags.
pub fn parse(blob: &[u8]) -> Result<KeywordMap, VpdError> {
    if blob.is_empty() {
        return Err(VpdError::MalformedData("empty keyword VPD"));
    }
    let mut cur = seek_pair_start(blob)?;
    let pair_start = cur.pos();

    let tag = cur.u8()?;
    if tag != KW_VPD_PAIR_START_TAG && tag != ALT_KW_VPD_PAIR_START_TAG {
        return Err(VpdError::MalformedData("invalid keyword pair start tag"));
    }

    let payload = cur.u16_le()? as usize;
    if payload == 0 {
        return Err(VpdError::MalformedData("zero keyword payload size"));
    }

    let mut map = KeywordMap::new();
    let mut remaining = payload;
    while remaining > 0 {
        let name = cur.take(KW_NAME_LEN)?;
        if !name.iter().all(|b| b.is_ascii_graphic()) {
            return Err(VpdError::MalformedData(
                "keyword name is not printable",
            ));
        }
        let len = cur.u8()? as usize;
        let value = cur.take(len)?;
        let consumed = KW_NAME_LEN + 1 + len;
        if consumed > remaining {
            return Err(VpdError::MalformedData(
                "keyword overruns the payload",
            ));
        }
        remaining -= consumed;
        map.entry(String::from_utf8_lossy(name).into_owned())
            .or_insert_with(|| value.to_vec());
    }

    let end_tag = cur.pos();
    if cur.u8()? != KW_VAL_PAIR_END_TAG {
        return Err(VpdError::MalformedData("invalid keyword pair end tag"));
    }
    let checksum = cur.u8()?;
    let sum = blob[pair_start..end_tag]
        .iter()
        .fold(checksum, |acc, &b| acc.wrapping_add(b));
    if sum != 0 {
        return Err(VpdError::MalformedData("keyword VPD checksum mismatch"));
    }

    cur.skip(TRAILER_RESERVED)?;
    if cur.u8()? != KW_VPD_END_TAG {
        return Err(VpdError::MalformedData("invalid keyword VPD end tag"));
    }

    Ok(map)
}

/// Locate a keyword's value slot by linear scan.
pub fn keyword_slot(
    blob: &[u8],
    keyword: &str,
) -> Result<KeywordSlot, VpdError> {
    let mut cur = seek_pair_start(blob)?;
    let tag = cur.u8()?;
    if tag != KW_VPD_PAIR_START_TAG && tag != ALT_KW_VPD_PAIR_START_TAG {
        return Err(VpdError::MalformedData("invalid keyword pair start tag"));
    }
    let payload = cur.u16_le()? as usize;
    if payload == 0 {
        return Err(VpdError::MalformedData("zero keyword payload size"));
    }

    let mut remaining = payload;
    while remaining > 0 {
        let name = cur.take(KW_NAME_LEN)?;
        let len = cur.u8()? as usize;
        let offset = cur.pos();
        cur.skip(len)?;
        let consumed = KW_NAME_LEN + 1 + len;
        if consumed > remaining {
            return Err(VpdError::MalformedData(
                "keyword overruns the payload",
            ));
        }
        remaining -= consumed;
        if name == keyword.as_bytes() {
            return Ok(KeywordSlot { offset, len });
        }
    }
    Err(VpdError::KeywordNotFound(keyword.to_string()))
}

/// Overwrite one keyword's value, truncating to the existing slot, and
/// refresh the stored checksum.
pub fn update_keyword(
    blob: &mut [u8],
    keyword: &str,
    value: &[u8],
) -> Result<KwVpdUpdate, VpdError> {
    let slot = keyword_slot(blob, keyword)?;
    let n = usize::min(value.len(), slot.len);
    blob[slot.offset..slot.offset + n].copy_from_slice(&value[..n]);

    // Re-derive the checksum region: pair start tag through the byte
    // before the end tag.
    let pair_start = {
        let cur = seek_pair_start(blob)?;
        cur.pos()
    };
    let mut cur = Cursor::at(blob, pair_start + 1)?;
    let payload = cur.u16_le()? as usize;
    let end_tag = cur.pos() + payload;
    let checksum_pos = end_tag + 1;
    if blob.get(end_tag) != Some(&KW_VAL_PAIR_END_TAG)
        || checksum_pos >= blob.len()
    {
        return Err(VpdError::MalformedData("invalid keyword pair end tag"));
    }
    let sum = blob[pair_start..end_tag]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    blob[checksum_pos] = sum.wrapping_neg();

    Ok(KwVpdUpdate {
        bytes_written: n,
        value_window: Window::new(slot.offset, n),
        checksum_window: Window::new(checksum_pos, 1),
    })
}
