// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Record-oriented IPZ VPD container.
//!
//! An IPZ blob opens with the VHDR header record (ECC in bytes [0..11),
//! record body in [11..55), name "VHDR" at byte 17). Byte 35 of the blob
//! holds a little-endian offset to the VTOC record, whose single PT
//! keyword is the table of records: 14-byte entries naming each record
//! and the offsets/lengths of its data and ECC windows. Records hold
//! keyword entries terminated by the "PF" keyword; keywords whose name
//! starts with '#' carry a 2-byte little-endian length, all others a
//! 1-byte length.
//!
//! All functions take `&mut [u8]` because ECC validation repairs
//! correctable damage in place; repaired windows are reported so the file
//! layer can persist them.

use crate::cursor::Cursor;
use crate::ecc;
use crate::ecc::EccVerdict;
use crate::KeywordMap;
use crate::RecordMap;
use crate::VpdError;
use crate::Window;
use core::mem;
use zerocopy::byteorder::LittleEndian;
use zerocopy::byteorder::U16;
use zerocopy::AsBytes;
use zerocopy::FromBytes;

/// Minimum length of a plausible IPZ blob.
pub const RECORD_MIN_LEN: usize = 44;
/// Length of a record name.
pub const RECORD_NAME_LEN: usize = 4;
/// Length of a keyword name.
pub const KW_NAME_LEN: usize = 2;

/// VHDR geometry: ECC window then record body.
const VHDR_ECC_OFFSET: usize = 0;
const VHDR_ECC_LEN: usize = 11;
const VHDR_RECORD_OFFSET: usize = 11;
const VHDR_RECORD_LEN: usize = 44;

/// Offsets of the VTOC descriptor fields inside the VHDR record.
const VTOC_PTR_OFFSET: usize = 35;
const VTOC_LEN_OFFSET: usize = 37;
const VTOC_ECC_OFF_OFFSET: usize = 39;
const VTOC_ECC_LEN_OFFSET: usize = 41;

/// Record body prefix: record id (1), record size (2), "RT" keyword name
/// (2), its length byte (1). The record name follows, then the keywords.
const RECORD_NAME_OFFSET: usize = 6;
const RECORD_KEYWORDS_OFFSET: usize = RECORD_NAME_OFFSET + RECORD_NAME_LEN;

/// Keyword terminating every record.
const LAST_KEYWORD: &[u8; 2] = b"PF";
/// Keywords starting with this byte carry a 2-byte LE length.
const POUND: u8 = b'#';

/// Records whose keywords are not exposed through lookup.
pub const PROTECTED_RECORDS: [&str; 2] = ["VHDR", "VTOC"];

/// One entry of the VTOC PT keyword.
#[derive(Debug, Clone, Copy, FromBytes, AsBytes)]
#[repr(C)]
struct PtEntry {
    name: [u8; RECORD_NAME_LEN],
    record_type: U16<LittleEndian>,
    offset: U16<LittleEndian>,
    length: U16<LittleEndian>,
    ecc_offset: U16<LittleEndian>,
    ecc_length: U16<LittleEndian>,
}

pub const PT_ENTRY_LEN: usize = mem::size_of::<PtEntry>();

/// Where a record's data and ECC live, per its PT entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLocation {
    pub name: String,
    pub data_offset: usize,
    pub data_len: usize,
    pub ecc_offset: usize,
    pub ecc_len: usize,
}

/// The physical slot of one keyword's value inside the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordSlot {
    pub offset: usize,
    pub len: usize,
}

/// Result of a full parse.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedIpz {
    pub records: RecordMap,
    /// Data windows repaired by correctable ECC; the caller must write
    /// these back to the EEPROM.
    pub repaired: Vec<Window>,
}

/// A validated plan for updating one keyword: all lookups and ECC checks
/// done, nothing written yet.
#[derive(Debug)]
pub struct WritePlan {
    pub record: RecordLocation,
    pub slot: KeywordSlot,
    pub repaired: Vec<Window>,
}

/// Outcome of an in-buffer keyword update.
#[derive(Debug)]
pub struct IpzUpdate {
    pub bytes_written: usize,
    pub value_window: Window,
    pub ecc_window: Window,
    pub repaired: Vec<Window>,
}

fn check_window(
    blob: &mut [u8],
    data: Window,
    ecc: Window,
) -> Result<EccVerdict, VpdError> {
    let truncated = VpdError::MalformedData("truncated VPD data");
    let ecc_end =
        ecc.offset.checked_add(ecc.len).ok_or(truncated.clone())?;
    let ecc_bytes = blob
        .get(ecc.offset..ecc_end)
        .ok_or(truncated.clone())?
        .to_vec();
    let data_end =
        data.offset.checked_add(data.len).ok_or(truncated.clone())?;
    let data_bytes = blob.get_mut(data.offset..data_end).ok_or(truncated)?;
    Ok(ecc::check(data_bytes, &ecc_bytes))
}

/// Validate the VHDR record: name match and ECC.
fn validate_header(
    blob: &mut [u8],
    repaired: &mut Vec<Window>,
) -> Result<(), VpdError> {
    if blob.len() < RECORD_MIN_LEN {
        return Err(VpdError::MalformedData("malformed VPD"));
    }
    let mut cur = Cursor::at(blob, crate::VHDR_NAME_OFFSET)?;
    if cur.take(RECORD_NAME_LEN)? != b"VHDR" {
        return Err(VpdError::MalformedData("VHDR record not found"));
    }

    let data = Window::new(VHDR_RECORD_OFFSET, VHDR_RECORD_LEN);
    let ecc = Window::new(VHDR_ECC_OFFSET, VHDR_ECC_LEN);
    match check_window(blob, data, ecc)? {
        EccVerdict::Ok => Ok(()),
        EccVerdict::Correctable => {
            repaired.push(data);
            Ok(())
        }
        EccVerdict::Fail => {
            Err(VpdError::EccFailure("VHDR ECC check failed"))
        }
    }
}

/// The PT keyword's value region inside the VTOC record.
#[derive(Debug, Clone, Copy)]
struct PtRegion {
    offset: usize,
    len: usize,
}

/// Validate the VTOC record (name and ECC) and locate its PT keyword.
fn validate_vtoc(
    blob: &mut [u8],
    repaired: &mut Vec<Window>,
) -> Result<PtRegion, VpdError> {
    let mut cur = Cursor::at(blob, VTOC_PTR_OFFSET)?;
    let vtoc_offset = cur.u16_le()? as usize;
    debug_assert_eq!(cur.pos(), VTOC_LEN_OFFSET);
    let vtoc_len = cur.u16_le()? as usize;
    debug_assert_eq!(cur.pos(), VTOC_ECC_OFF_OFFSET);
    let vtoc_ecc_offset = cur.u16_le()? as usize;
    debug_assert_eq!(cur.pos(), VTOC_ECC_LEN_OFFSET);
    let vtoc_ecc_len = cur.u16_le()? as usize;

    let mut cur = Cursor::at(blob, vtoc_offset + RECORD_NAME_OFFSET)?;
    if cur.take(RECORD_NAME_LEN)? != b"VTOC" {
        return Err(VpdError::MalformedData("VTOC record not found"));
    }

    let data = Window::new(vtoc_offset, vtoc_len);
    let ecc = Window::new(vtoc_ecc_offset, vtoc_ecc_len);
    match check_window(blob, data, ecc)? {
        EccVerdict::Ok => {}
        EccVerdict::Correctable => repaired.push(data),
        EccVerdict::Fail => {
            return Err(VpdError::EccFailure("VTOC ECC check failed"))
        }
    }

    // The PT keyword follows the record name; its length is one byte.
    let mut cur = Cursor::at(blob, vtoc_offset + RECORD_KEYWORDS_OFFSET)?;
    if cur.take(KW_NAME_LEN)? != b"PT" {
        return Err(VpdError::MalformedData("PT keyword not found"));
    }
    let pt_len = cur.u8()? as usize;
    if pt_len == 0 || pt_len % PT_ENTRY_LEN != 0 {
        return Err(VpdError::MalformedData(
            "PT length not a multiple of the entry size",
        ));
    }
    let region = PtRegion { offset: cur.pos(), len: pt_len };
    // The whole table must be inside the blob.
    Cursor::at(blob, region.offset + region.len)?;
    Ok(region)
}

fn read_pt_entry(blob: &[u8], pos: usize) -> Result<PtEntry, VpdError> {
    blob.get(pos..)
        .and_then(PtEntry::read_from_prefix)
        .ok_or(VpdError::MalformedData("truncated VPD data"))
}

/// Validate the structural fields of a PT entry, returning its location.
fn entry_location(entry: &PtEntry) -> Result<RecordLocation, VpdError> {
    let data_offset = entry.offset.get() as usize;
    let data_len = entry.length.get() as usize;
    if data_offset == 0 || data_len == 0 {
        return Err(VpdError::MalformedData(
            "invalid record offset or length",
        ));
    }
    let ecc_offset = entry.ecc_offset.get() as usize;
    let ecc_len = entry.ecc_length.get() as usize;
    if ecc_offset == 0 || ecc_len == 0 {
        return Err(VpdError::EccFailure("invalid ECC offset or length"));
    }
    Ok(RecordLocation {
        name: String::from_utf8_lossy(&entry.name).into_owned(),
        data_offset,
        data_len,
        ecc_offset,
        ecc_len,
    })
}

/// Walk keyword entries until the "PF" terminator or `end`, emitting each
/// first occurrence.
fn walk_keywords(
    blob: &[u8],
    start: usize,
    end: usize,
) -> Result<KeywordMap, VpdError> {
    let mut map = KeywordMap::new();
    let mut cur = Cursor::at(blob, start)?;
    while cur.pos() < end {
        let name = cur.take(KW_NAME_LEN)?;
        if name == LAST_KEYWORD {
            break;
        }
        let len = if name[0] == POUND {
            cur.u16_le()? as usize
        } else {
            cur.u8()? as usize
        };
        let value = cur.take(len)?;
        map.entry(String::from_utf8_lossy(name).into_owned())
            .or_insert_with(|| value.to_vec());
    }
    Ok(map)
}

/// Find one keyword's physical slot within a record's data window.
fn find_keyword_slot(
    blob: &[u8],
    record: &RecordLocation,
    keyword: &str,
) -> Result<KeywordSlot, VpdError> {
    let start = record.data_offset + RECORD_KEYWORDS_OFFSET;
    let end = record.data_offset + record.data_len;
    let mut cur = Cursor::at(blob, start)?;
    while cur.pos() < end {
        let name = cur.take(KW_NAME_LEN)?;
        if name == LAST_KEYWORD {
            break;
        }
        let len = if name[0] == POUND {
            cur.u16_le()? as usize
        } else {
            cur.u8()? as usize
        };
        let offset = cur.pos();
        cur.skip(len)?;
        if name == keyword.as_bytes() {
            return Ok(KeywordSlot { offset, len });
        }
    }
    Err(VpdError::KeywordNotFound(keyword.to_string()))
}

/// Scan the PT for `record`, ECC-checking every entry along the way.
///
/// `strict` determines what a hard ECC failure on some record means: the
/// editor path refuses to touch a degraded blob, while the parse path
/// tolerates it and still emits the record.
fn scan_pt(
    blob: &mut [u8],
    pt: PtRegion,
    record: Option<&str>,
    strict: bool,
    repaired: &mut Vec<Window>,
) -> Result<Option<RecordLocation>, VpdError> {
    let mut found = None;
    let mut pos = pt.offset;
    let end = pt.offset + pt.len;
    while pos < end {
        let entry = read_pt_entry(blob, pos)?;
        let loc = entry_location(&entry)?;
        let data = Window::new(loc.data_offset, loc.data_len);
        let ecc = Window::new(loc.ecc_offset, loc.ecc_len);
        match check_window(blob, data, ecc)? {
            EccVerdict::Ok => {}
            EccVerdict::Correctable => repaired.push(data),
            EccVerdict::Fail if strict => {
                return Err(VpdError::EccFailure(
                    "record ECC check failed",
                ))
            }
            EccVerdict::Fail => {}
        }
        if found.is_none() && record == Some(loc.name.as_str()) {
            found = Some(loc);
        }
        pos += PT_ENTRY_LEN;
    }
    Ok(found)
}

/// Decode the whole container into a record map.
pub fn parse(blob: &mut [u8]) -> Result<ParsedIpz, VpdError> {
    let mut repaired = Vec::new();
    validate_header(blob, &mut repaired)?;
    let pt = validate_vtoc(blob, &mut repaired)?;

    let mut records = RecordMap::new();
    let mut pos = pt.offset;
    let end = pt.offset + pt.len;
    while pos < end {
        let entry = read_pt_entry(blob, pos)?;
        let loc = entry_location(&entry)?;
        let data = Window::new(loc.data_offset, loc.data_len);
        let ecc = Window::new(loc.ecc_offset, loc.ecc_len);
        match check_window(blob, data, ecc)? {
            EccVerdict::Ok => {}
            EccVerdict::Correctable => repaired.push(data),
            // A degraded record is still emitted; only VHDR and VTOC
            // damage aborts the parse.
            EccVerdict::Fail => {}
        }

        // Use the name embedded in the record body, which the RT keyword
        // also carries.
        let mut cur =
            Cursor::at(blob, loc.data_offset + RECORD_NAME_OFFSET)?;
        let name =
            String::from_utf8_lossy(cur.take(RECORD_NAME_LEN)?).into_owned();
        let keywords = walk_keywords(
            blob,
            loc.data_offset + RECORD_KEYWORDS_OFFSET,
            loc.data_offset + loc.data_len,
        )?;
        records.entry(name).or_insert(keywords);
        pos += PT_ENTRY_LEN;
    }

    Ok(ParsedIpz { records, repaired })
}

/// Read one keyword's value.
///
/// VHDR and VTOC are protected and refuse keyword lookup. Returns the
/// value bytes plus any windows repaired by correctable ECC, which the
/// caller must persist.
pub fn read_keyword(
    blob: &mut [u8],
    record: &str,
    keyword: &str,
) -> Result<(Vec<u8>, Vec<Window>), VpdError> {
    if PROTECTED_RECORDS.contains(&record) {
        return Err(VpdError::InvalidArgument(
            "keywords of protected records cannot be read",
        ));
    }
    let mut repaired = Vec::new();
    validate_header(blob, &mut repaired)?;
    let pt = validate_vtoc(blob, &mut repaired)?;
    let loc = scan_pt(blob, pt, Some(record), true, &mut repaired)?
        .ok_or_else(|| VpdError::RecordNotFound(record.to_string()))?;
    let slot = find_keyword_slot(blob, &loc, keyword)?;
    let value = blob[slot.offset..slot.offset + slot.len].to_vec();
    Ok((value, repaired))
}

/// Locate a record by scanning the VTOC PT, never by reparsing records.
pub fn record_location(
    blob: &mut [u8],
    record: &str,
) -> Result<(RecordLocation, Vec<Window>), VpdError> {
    let mut repaired = Vec::new();
    validate_header(blob, &mut repaired)?;
    let pt = validate_vtoc(blob, &mut repaired)?;
    let loc = scan_pt(blob, pt, Some(record), true, &mut repaired)?
        .ok_or_else(|| VpdError::RecordNotFound(record.to_string()))?;
    Ok((loc, repaired))
}

/// Validate the blob and locate the target keyword slot without writing
/// anything.
pub fn plan_write(
    blob: &mut [u8],
    record: &str,
    keyword: &str,
) -> Result<WritePlan, VpdError> {
    if PROTECTED_RECORDS.contains(&record) {
        return Err(VpdError::InvalidArgument(
            "protected records cannot be written",
        ));
    }
    let (loc, repaired) = record_location(blob, record)?;
    let slot = find_keyword_slot(blob, &loc, keyword)?;
    Ok(WritePlan { record: loc, slot, repaired })
}

/// Copy `value` over the keyword slot, truncating to the slot length.
/// Shorter values leave the slot's trailing bytes unchanged; the slot's
/// physical length never changes.
pub fn apply_value(
    blob: &mut [u8],
    slot: &KeywordSlot,
    value: &[u8],
) -> Window {
    let n = usize::min(value.len(), slot.len);
    blob[slot.offset..slot.offset + n].copy_from_slice(&value[..n]);
    Window::new(slot.offset, n)
}

/// Regenerate a record's ECC from its current data window.
pub fn refresh_record_ecc(
    blob: &mut [u8],
    record: &RecordLocation,
) -> Result<Window, VpdError> {
    let data = blob
        .get(record.data_offset..record.data_offset + record.data_len)
        .ok_or(VpdError::MalformedData("truncated VPD data"))?
        .to_vec();
    let ecc = blob
        .get_mut(record.ecc_offset..record.ecc_offset + record.ecc_len)
        .ok_or(VpdError::MalformedData("truncated VPD data"))?;
    ecc::create(&data, ecc)?;
    Ok(Window::new(record.ecc_offset, record.ecc_len))
}

/// Update one keyword entirely in the buffer: locate, overwrite, refresh
/// the record's ECC.
pub fn update_keyword(
    blob: &mut [u8],
    record: &str,
    keyword: &str,
    value: &[u8],
) -> Result<IpzUpdate, VpdError> {
    let plan = plan_write(blob, record, keyword)?;
    let value_window = apply_value(blob, &plan.slot, value);
    let ecc_window = refresh_record_ecc(blob, &plan.record)?;
    Ok(IpzUpdate {
        bytes_written: value_window.len,
        value_window,
        ecc_window,
        repaired: plan.repaired,
    })
}
