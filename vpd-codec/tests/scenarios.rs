// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios over full blobs: writes land byte-exactly, ECC
//! revalidates, and the two lookup paths agree.

use vpd_codec::ecc;
use vpd_codec::ecc::EccVerdict;
use vpd_codec::fixture::IpzBlobBuilder;
use vpd_codec::ipz;
use vpd_codec::{identify, VpdKind};

fn inventory_blob() -> Vec<u8> {
    IpzBlobBuilder::new()
        .record(
            "VINI",
            &[
                ("SN", b"OLD123      ".as_slice(), false),
                ("FN", b"FRU0001".as_slice(), false),
            ],
        )
        .record("VCEN", &[("#D", &[0u8; 300], true)])
        .build()
}

#[test]
fn write_that_fits_leaves_trailing_bytes() {
    let mut blob = inventory_blob();
    let update =
        ipz::update_keyword(&mut blob, "VINI", "SN", b"NEW456").unwrap();
    assert_eq!(update.bytes_written, 6);

    // The slot now holds the new prefix followed by the untouched tail.
    let slot = update.value_window;
    assert_eq!(
        &blob[slot.offset..slot.offset + 12],
        &[0x4e, 0x45, 0x57, 0x34, 0x35, 0x36, 0x20, 0x20, 0x20, 0x20, 0x20,
          0x20]
    );

    // The regenerated record ECC validates cleanly.
    let (loc, _) = ipz::record_location(&mut blob, "VINI").unwrap();
    let ecc_bytes = blob[loc.ecc_offset..loc.ecc_offset + loc.ecc_len]
        .to_vec();
    let mut data =
        blob[loc.data_offset..loc.data_offset + loc.data_len].to_vec();
    assert_eq!(ecc::check(&mut data, &ecc_bytes), EccVerdict::Ok);
}

#[test]
fn write_that_overflows_truncates_to_the_slot() {
    let mut blob = inventory_blob();
    let update =
        ipz::update_keyword(&mut blob, "VINI", "SN", b"0123456789ABCDEFGH")
            .unwrap();
    assert_eq!(update.bytes_written, 12);
    let (value, _) = ipz::read_keyword(&mut blob, "VINI", "SN").unwrap();
    assert_eq!(value, b"0123456789AB");
}

#[test]
fn pound_keyword_write_honors_the_two_byte_length() {
    let mut blob = inventory_blob();
    let payload = vec![0x11u8; 500];
    let update =
        ipz::update_keyword(&mut blob, "VCEN", "#D", &payload).unwrap();
    assert_eq!(update.bytes_written, 300);
    let (value, _) = ipz::read_keyword(&mut blob, "VCEN", "#D").unwrap();
    assert_eq!(value.len(), 300);
    assert!(value.iter().all(|&b| b == 0x11));
}

#[test]
fn parse_and_read_keyword_agree_after_a_write() {
    let mut blob = inventory_blob();
    ipz::update_keyword(&mut blob, "VINI", "FN", b"FRU9").unwrap();

    let parsed = ipz::parse(&mut blob.clone()).unwrap();
    for (record, keywords) in &parsed.records {
        for (keyword, value) in keywords {
            let (read, repaired) =
                ipz::read_keyword(&mut blob, record, keyword).unwrap();
            assert_eq!(&read, value, "{record}:{keyword}");
            assert!(repaired.is_empty());
        }
    }
}

#[test]
fn dispatcher_still_recognizes_an_edited_blob() {
    let mut blob = inventory_blob();
    ipz::update_keyword(&mut blob, "VINI", "SN", b"X").unwrap();
    assert_eq!(identify(&blob).unwrap(), VpdKind::Ipz);
}
