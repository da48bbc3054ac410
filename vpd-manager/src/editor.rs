// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transactional keyword writes against an EEPROM file.
//!
//! The editor owns three locals for the duration of a write: the scratch
//! buffer, the open file handle, and the VPD base offset. All lookups and
//! ECC checks run before the first byte lands on the file, so a failure
//! raised during planning leaves the EEPROM untouched. Once the value
//! bytes are written, an ECC regeneration failure is surfaced and the
//! caller is responsible for re-driving the operation.
//!
//! The editor is not internally synchronized; callers serialize writes
//! per EEPROM path.

use crate::eeprom;
use crate::error::VpdManagerError;
use slog::debug;
use slog::Logger;
use std::path::Path;
use vpd_codec::ipz;
use vpd_codec::keyword_vpd;

/// Update one keyword of an IPZ-format EEPROM and refresh the record's
/// ECC. Returns the number of bytes actually written to the value slot.
pub fn write_ipz_keyword(
    log: &Logger,
    path: &Path,
    base_offset: u64,
    record: &str,
    keyword: &str,
    value: &[u8],
) -> Result<usize, VpdManagerError> {
    let mut file = eeprom::open_rw(path)?;
    let mut blob = eeprom::read_vpd_slice_from(&mut file, path, base_offset)?;

    let plan = ipz::plan_write(&mut blob, record, keyword)?;
    eeprom::write_back_repairs(
        log,
        &mut file,
        path,
        base_offset,
        &blob,
        &plan.repaired,
    );

    let value_window = ipz::apply_value(&mut blob, &plan.slot, value);
    eeprom::write_window(&mut file, path, base_offset, &blob, value_window)?;

    // From here on the data bytes have landed; an ECC failure is
    // surfaced so the caller can re-drive the write.
    let ecc_window = ipz::refresh_record_ecc(&mut blob, &plan.record)?;
    eeprom::write_window(&mut file, path, base_offset, &blob, ecc_window)?;

    debug!(
        log, "updated keyword on hardware";
        "path" => %path.display(),
        "record" => record,
        "keyword" => keyword,
        "bytes" => value_window.len,
    );
    Ok(value_window.len)
}

/// Update one keyword of a keyword-VPD-format EEPROM, refreshing the
/// stored checksum.
pub fn write_kw_vpd_keyword(
    log: &Logger,
    path: &Path,
    base_offset: u64,
    keyword: &str,
    value: &[u8],
) -> Result<usize, VpdManagerError> {
    let mut file = eeprom::open_rw(path)?;
    let mut blob = eeprom::read_vpd_slice_from(&mut file, path, base_offset)?;

    let update = keyword_vpd::update_keyword(&mut blob, keyword, value)?;
    eeprom::write_window(
        &mut file,
        path,
        base_offset,
        &blob,
        update.value_window,
    )?;
    eeprom::write_window(
        &mut file,
        path,
        base_offset,
        &blob,
        update.checksum_window,
    )?;

    debug!(
        log, "updated keyword on hardware";
        "path" => %path.display(),
        "keyword" => keyword,
        "bytes" => update.bytes_written,
    );
    Ok(update.bytes_written)
}
