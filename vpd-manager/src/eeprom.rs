// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronous EEPROM file access.
//!
//! VPD slices are small by contract (capped at 65504 bytes) so reads and
//! writes happen inline on the event loop. Byte windows reported by the
//! codec are written back at `base_offset + window.offset`.

use crate::error::VpdManagerError;
use slog::warn;
use slog::Logger;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use vpd_codec::Window;

/// Largest VPD slice read from an EEPROM.
pub const MAX_VPD_BYTES: u64 = 65504;

/// Where blobs that failed to parse are dumped for offline inspection.
pub const BAD_VPD_DIR: &str = "/tmp/bad-vpd";

/// Open an EEPROM for read+write.
pub fn open_rw(path: &Path) -> Result<File, VpdManagerError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|err| VpdManagerError::io(path.display().to_string(), err))
}

/// Read the VPD slice starting at `offset`, capped at [`MAX_VPD_BYTES`].
pub fn read_vpd_slice(
    path: &Path,
    offset: u64,
) -> Result<Vec<u8>, VpdManagerError> {
    let mut file = File::open(path)
        .map_err(|err| VpdManagerError::io(path.display().to_string(), err))?;
    read_vpd_slice_from(&mut file, path, offset)
}

/// Read the VPD slice through an already-open handle.
pub fn read_vpd_slice_from(
    file: &mut File,
    path: &Path,
    offset: u64,
) -> Result<Vec<u8>, VpdManagerError> {
    let io_err =
        |err| VpdManagerError::io(path.display().to_string(), err);
    file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
    let mut blob = Vec::new();
    std::io::Read::by_ref(file)
        .take(MAX_VPD_BYTES)
        .read_to_end(&mut blob)
        .map_err(io_err)?;
    Ok(blob)
}

/// Write one buffer window to the file at `base_offset + window.offset`.
pub fn write_window(
    file: &mut File,
    path: &Path,
    base_offset: u64,
    blob: &[u8],
    window: Window,
) -> Result<(), VpdManagerError> {
    let io_err =
        |err| VpdManagerError::io(path.display().to_string(), err);
    file.seek(SeekFrom::Start(base_offset + window.offset as u64))
        .map_err(io_err)?;
    file.write_all(&blob[window.offset..window.offset + window.len])
        .map_err(io_err)?;
    file.flush().map_err(io_err)
}

/// Persist windows repaired by correctable ECC.
///
/// Best-effort: a failed write-back is logged and suppressed, and the
/// read that produced the repair still succeeds with corrected data in
/// memory.
pub fn write_back_repairs(
    log: &Logger,
    file: &mut File,
    path: &Path,
    base_offset: u64,
    blob: &[u8],
    repaired: &[Window],
) {
    for &window in repaired {
        if let Err(err) = write_window(file, path, base_offset, blob, window)
        {
            warn!(
                log, "failed to write back corrected VPD bytes";
                "path" => %path.display(),
                "offset" => window.offset,
                "len" => window.len,
                "err" => %err,
            );
        }
    }
}

/// Like [`write_back_repairs`] but opening the file itself; used by read
/// paths that only hold a read handle.
pub fn write_back_repairs_at(
    log: &Logger,
    path: &Path,
    base_offset: u64,
    blob: &[u8],
    repaired: &[Window],
) {
    if repaired.is_empty() {
        return;
    }
    match open_rw(path) {
        Ok(mut file) => write_back_repairs(
            log,
            &mut file,
            path,
            base_offset,
            blob,
            repaired,
        ),
        Err(err) => warn!(
            log, "cannot open EEPROM to write back corrected bytes";
            "path" => %path.display(),
            "err" => %err,
        ),
    }
}

/// Dump a blob that failed to parse, named after its EEPROM path.
pub fn dump_bad_vpd(log: &Logger, dir: &Path, eeprom: &Path, blob: &[u8]) {
    let name: String = eeprom
        .display()
        .to_string()
        .trim_start_matches('/')
        .chars()
        .map(|c| if c == '/' { '-' } else { c })
        .collect();
    let target: PathBuf = dir.join(name);
    let result = fs::create_dir_all(dir)
        .and_then(|()| fs::write(&target, blob));
    if let Err(err) = result {
        warn!(
            log, "failed to dump bad VPD";
            "target" => %target.display(),
            "err" => %err,
        );
    }
}
