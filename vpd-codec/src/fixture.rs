// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders for well-formed VPD blobs, shared by this crate's tests and
//! by downstream crates that exercise the file-backed paths.

use crate::ecc;
use crate::ipz;
use crate::ALT_KW_VPD_PAIR_START_TAG;
use crate::KW_VAL_PAIR_END_TAG;
use crate::KW_VPD_END_TAG;
use crate::KW_VPD_PAIR_START_TAG;
use crate::KW_VPD_START_TAG;

struct RecordSpec {
    name: [u8; 4],
    keywords: Vec<(String, Vec<u8>, bool)>,
}

/// Builds a minimal valid IPZ blob: VHDR, VTOC with one PT entry per
/// record, records with their ECC windows placed right after the data.
#[derive(Default)]
pub struct IpzBlobBuilder {
    records: Vec<RecordSpec>,
}

/// Offset the builder places the VTOC record at.
const VTOC_OFFSET: usize = 64;

impl IpzBlobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Each keyword is (name, value, pound); pound keywords
    /// get a 2-byte little-endian length field.
    pub fn record(
        mut self,
        name: &str,
        keywords: &[(&str, &[u8], bool)],
    ) -> Self {
        let mut record_name = [0u8; 4];
        record_name.copy_from_slice(name.as_bytes());
        self.records.push(RecordSpec {
            name: record_name,
            keywords: keywords
                .iter()
                .map(|(kw, value, pound)| {
                    (kw.to_string(), value.to_vec(), *pound)
                })
                .collect(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        // Record body: id(1) + size(2) + RT keyword(2+1+4), keywords,
        // then the PF terminator (2+1+1).
        let record_len = |spec: &RecordSpec| {
            10 + spec
                .keywords
                .iter()
                .map(|(_, v, pound)| 2 + if *pound { 2 } else { 1 } + v.len())
                .sum::<usize>()
                + 4
        };

        let pt_len = self.records.len() * ipz::PT_ENTRY_LEN;
        let vtoc_len = 13 + pt_len + 4;
        let vtoc_ecc_offset = VTOC_OFFSET + vtoc_len;
        let vtoc_ecc_len = ecc::ecc_len_for(vtoc_len);

        // Lay the records out after the VTOC ECC.
        let mut offsets = Vec::new();
        let mut next = vtoc_ecc_offset + vtoc_ecc_len;
        for spec in &self.records {
            let len = record_len(spec);
            let ecc_len = ecc::ecc_len_for(len);
            offsets.push((next, len, next + len, ecc_len));
            next += len + ecc_len;
        }
        let mut blob = vec![0u8; next];

        // VHDR record body.
        blob[12..14].copy_from_slice(&40u16.to_le_bytes());
        blob[14..16].copy_from_slice(b"RT");
        blob[16] = 4;
        blob[17..21].copy_from_slice(b"VHDR");
        blob[35..37].copy_from_slice(&(VTOC_OFFSET as u16).to_le_bytes());
        blob[37..39].copy_from_slice(&(vtoc_len as u16).to_le_bytes());
        blob[39..41]
            .copy_from_slice(&(vtoc_ecc_offset as u16).to_le_bytes());
        blob[41..43].copy_from_slice(&(vtoc_ecc_len as u16).to_le_bytes());

        // VTOC record: header, PT keyword, PF terminator.
        let mut pos = VTOC_OFFSET;
        blob[pos + 1..pos + 3]
            .copy_from_slice(&(vtoc_len as u16).to_le_bytes());
        blob[pos + 3..pos + 5].copy_from_slice(b"RT");
        blob[pos + 5] = 4;
        blob[pos + 6..pos + 10].copy_from_slice(b"VTOC");
        blob[pos + 10..pos + 12].copy_from_slice(b"PT");
        blob[pos + 12] = pt_len as u8;
        pos += 13;
        for (spec, (offset, len, ecc_offset, ecc_len)) in
            self.records.iter().zip(&offsets)
        {
            blob[pos..pos + 4].copy_from_slice(&spec.name);
            blob[pos + 6..pos + 8]
                .copy_from_slice(&(*offset as u16).to_le_bytes());
            blob[pos + 8..pos + 10]
                .copy_from_slice(&(*len as u16).to_le_bytes());
            blob[pos + 10..pos + 12]
                .copy_from_slice(&(*ecc_offset as u16).to_le_bytes());
            blob[pos + 12..pos + 14]
                .copy_from_slice(&(*ecc_len as u16).to_le_bytes());
            pos += ipz::PT_ENTRY_LEN;
        }
        blob[pos..pos + 2].copy_from_slice(b"PF");
        blob[pos + 2] = 1;

        // Records.
        for (spec, (offset, len, ecc_offset, ecc_len)) in
            self.records.iter().zip(&offsets)
        {
            let mut pos = *offset;
            blob[pos + 1..pos + 3]
                .copy_from_slice(&(*len as u16).to_le_bytes());
            blob[pos + 3..pos + 5].copy_from_slice(b"RT");
            blob[pos + 5] = 4;
            blob[pos + 6..pos + 10].copy_from_slice(&spec.name);
            pos += 10;
            for (kw, value, pound) in &spec.keywords {
                blob[pos..pos + 2].copy_from_slice(kw.as_bytes());
                pos += 2;
                if *pound {
                    blob[pos..pos + 2]
                        .copy_from_slice(&(value.len() as u16).to_le_bytes());
                    pos += 2;
                } else {
                    blob[pos] = value.len() as u8;
                    pos += 1;
                }
                blob[pos..pos + value.len()].copy_from_slice(value);
                pos += value.len();
            }
            blob[pos..pos + 2].copy_from_slice(b"PF");
            blob[pos + 2] = 1;

            let (data, rest) = blob.split_at_mut(*ecc_offset);
            ecc::create(
                &data[*offset..*offset + *len],
                &mut rest[..*ecc_len],
            )
            .unwrap();
        }

        // VTOC ECC, then VHDR ECC over the finished header bytes.
        let (data, rest) = blob.split_at_mut(vtoc_ecc_offset);
        ecc::create(
            &data[VTOC_OFFSET..VTOC_OFFSET + vtoc_len],
            &mut rest[..vtoc_ecc_len],
        )
        .unwrap();

        let (ecc_area, data) = blob.split_at_mut(11);
        ecc::create(&data[..44], &mut ecc_area[..11]).unwrap();

        blob
    }
}

/// Build a keyword-VPD blob with the given pairs and header bytes, with a
/// valid checksum and trailer.
pub fn kw_vpd_blob(pairs: &[(&str, &[u8])], header: &[u8]) -> Vec<u8> {
    kw_vpd_blob_with_tag(pairs, header, KW_VPD_PAIR_START_TAG)
}

/// Same as [`kw_vpd_blob`] but using the alternate pair-start tag.
pub fn kw_vpd_blob_alt_tag(
    pairs: &[(&str, &[u8])],
    header: &[u8],
) -> Vec<u8> {
    kw_vpd_blob_with_tag(pairs, header, ALT_KW_VPD_PAIR_START_TAG)
}

fn kw_vpd_blob_with_tag(
    pairs: &[(&str, &[u8])],
    header: &[u8],
    pair_tag: u8,
) -> Vec<u8> {
    let mut blob = vec![KW_VPD_START_TAG];
    blob.extend_from_slice(&(header.len() as u16).to_le_bytes());
    blob.extend_from_slice(header);

    let pair_start = blob.len();
    blob.push(pair_tag);
    let payload: usize =
        pairs.iter().map(|(_, value)| 3 + value.len()).sum();
    blob.extend_from_slice(&(payload as u16).to_le_bytes());
    for (name, value) in pairs {
        blob.extend_from_slice(name.as_bytes());
        blob.push(value.len() as u8);
        blob.extend_from_slice(value);
    }

    let sum = blob[pair_start..]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    blob.push(KW_VAL_PAIR_END_TAG);
    blob.push(sum.wrapping_neg());
    blob.extend_from_slice(&[0, 0]);
    blob.push(KW_VPD_END_TAG);
    blob
}

/// Builds a DDR5 DDIMM SPD image with a valid capacity encoding and the
/// 11S barcode block.
pub struct Ddr5SpdBuilder {
    bytes: Vec<u8>,
}

/// Start of the 11S barcode within the SPD image.
const BARCODE_OFFSET: usize = 416;

impl Default for Ddr5SpdBuilder {
    fn default() -> Self {
        let mut bytes = vec![0u8; 512];
        bytes[2] = 0x12; // DDR5
        bytes[4] = 0x02; // 1 die per package, 8 Gb density per die
        bytes[6] = 0x00; // x4 DRAM width
        bytes[234] = 0x00; // 2 ranks per channel
        bytes[235] = 0x09; // 2 channels, 32-bit bus per channel
        bytes[BARCODE_OFFSET..BARCODE_OFFSET + 3].copy_from_slice(b"11S");
        bytes[BARCODE_OFFSET + 3..BARCODE_OFFSET + 10]
            .copy_from_slice(b"PN12345");
        bytes[BARCODE_OFFSET + 10..BARCODE_OFFSET + 22]
            .copy_from_slice(b"SN0123456789");
        bytes[BARCODE_OFFSET + 22..BARCODE_OFFSET + 26]
            .copy_from_slice(b"CC01");
        Self { bytes }
    }
}

impl Ddr5SpdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_byte(mut self, index: usize, value: u8) -> Self {
        self.bytes[index] = value;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}
