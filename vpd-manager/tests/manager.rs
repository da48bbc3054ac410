// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service-level tests: the write pipeline, FRU collection, and location
//! codes, with in-memory fakes standing in for the object broker,
//! platform state, and reboot inhibitor.

use async_trait::async_trait;
use slog::o;
use slog::Discard;
use slog::Logger;
use std::fs;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use vpd_codec::fixture::IpzBlobBuilder;
use vpd_codec::ipz;
use vpd_manager::manager::is_valid_unexpanded_location_code;
use vpd_manager::publish::InventoryClient;
use vpd_manager::publish::ObjectMap;
use vpd_manager::publish::PlatformState;
use vpd_manager::publish::PropertyValue;
use vpd_manager::publish::RebootGuard;
use vpd_manager::CollectionStatus;
use vpd_manager::ReadRequest;
use vpd_manager::SystemConfig;
use vpd_manager::VpdManager;
use vpd_manager::VpdManagerError;
use vpd_manager::WriteRequest;

#[derive(Default)]
struct FakeInventory {
    notifications: Mutex<Vec<ObjectMap>>,
    cleared: Mutex<Vec<String>>,
    system_vpd_published: AtomicBool,
}

#[async_trait]
impl InventoryClient for FakeInventory {
    async fn notify(
        &self,
        objects: ObjectMap,
    ) -> Result<(), VpdManagerError> {
        self.notifications.lock().unwrap().push(objects);
        Ok(())
    }

    async fn clear_object(
        &self,
        object_path: &str,
    ) -> Result<(), VpdManagerError> {
        self.cleared.lock().unwrap().push(object_path.to_string());
        Ok(())
    }

    async fn system_vpd_published(&self) -> bool {
        self.system_vpd_published.load(Ordering::SeqCst)
    }
}

struct FakePlatform {
    ready: AtomicBool,
}

#[async_trait]
impl PlatformState for FakePlatform {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct FakeGuard {
    inhibits: AtomicUsize,
    releases: AtomicUsize,
}

#[async_trait]
impl RebootGuard for FakeGuard {
    async fn inhibit(&self) -> Result<(), VpdManagerError> {
        self.inhibits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<(), VpdManagerError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn discard() -> Logger {
    Logger::root(Discard, o!())
}

fn motherboard_blob() -> Vec<u8> {
    IpzBlobBuilder::new()
        .record("VINI", &[("SN", b"OLD123      ".as_slice(), false)])
        .record(
            "VCEN",
            &[
                ("FC", b"F123-ABC".as_slice(), false),
                ("SE", b"XYZ00001".as_slice(), false),
            ],
        )
        .build()
}

fn write_temp(blob: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(blob).unwrap();
    file.flush().unwrap();
    file
}

struct Harness {
    manager: Arc<VpdManager<FakeInventory, FakePlatform, FakeGuard>>,
    inventory: Arc<FakeInventory>,
    platform: Arc<FakePlatform>,
    guard: Arc<FakeGuard>,
    primary: tempfile::NamedTempFile,
    redundant: tempfile::NamedTempFile,
    _bad_vpd: tempfile::TempDir,
}

const MOTHERBOARD: &str = "/system/chassis/motherboard";

fn harness() -> Harness {
    let primary = write_temp(&motherboard_blob());
    let redundant = write_temp(&motherboard_blob());
    let bad_vpd = tempfile::tempdir().unwrap();

    let config: SystemConfig = serde_json::from_str(&format!(
        r#"{{
            "commonInterfaces": {{
                "xyz.openbmc_project.Inventory.Decorator.Asset": {{
                    "SerialNumber": {{
                        "recordName": "VINI",
                        "keywordName": "SN"
                    }}
                }}
            }},
            "frus": {{
                "{primary}": [{{
                    "inventoryPath": "{MOTHERBOARD}",
                    "redundantEeprom": "{redundant}",
                    "extraInterfaces": {{
                        "com.ibm.ipzvpd.Location": {{
                            "LocationCode": "Ufcs-P0"
                        }}
                    }}
                }}]
            }}
        }}"#,
        primary = primary.path().display(),
        redundant = redundant.path().display(),
    ))
    .unwrap();

    let inventory = Arc::new(FakeInventory::default());
    let platform =
        Arc::new(FakePlatform { ready: AtomicBool::new(true) });
    let guard = Arc::new(FakeGuard::default());
    let manager = Arc::new(
        VpdManager::new(
            discard(),
            config,
            Arc::clone(&inventory),
            Arc::clone(&platform),
            Arc::clone(&guard),
        )
        .with_bad_vpd_dir(bad_vpd.path()),
    );
    Harness {
        manager,
        inventory,
        platform,
        guard,
        primary,
        redundant,
        _bad_vpd: bad_vpd,
    }
}

fn ipz_write(record: &str, keyword: &str, value: &[u8]) -> WriteRequest {
    WriteRequest::Ipz {
        record: record.to_string(),
        keyword: keyword.to_string(),
        value: value.to_vec(),
    }
}

#[tokio::test]
async fn write_updates_primary_mirror_and_inventory() {
    let h = harness();
    let written = h
        .manager
        .write_keyword(MOTHERBOARD, ipz_write("VINI", "SN", b"NEW456"))
        .await;
    assert_eq!(written, 6);

    // Both EEPROMs hold the new value with a fresh ECC.
    for file in [&h.primary, &h.redundant] {
        let mut blob = fs::read(file.path()).unwrap();
        let parsed = ipz::parse(&mut blob).unwrap();
        assert!(parsed.repaired.is_empty());
        assert_eq!(parsed.records["VINI"]["SN"], b"NEW456      ");
    }

    // The inventory got the value read back from hardware, trailing
    // bytes included.
    let notifications = h.inventory.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    let interfaces = &notifications[0][MOTHERBOARD];
    assert_eq!(
        interfaces["com.ibm.ipzvpd.VINI"]["SN"],
        PropertyValue::Bytes(b"NEW456      ".to_vec())
    );

    // The reboot inhibitor bracketed the write.
    assert_eq!(h.guard.inhibits.load(Ordering::SeqCst), 1);
    assert_eq!(h.guard.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn write_accepts_the_eeprom_path_directly() {
    let h = harness();
    let path = h.primary.path().to_str().unwrap().to_string();
    let written =
        h.manager.write_keyword(&path, ipz_write("VINI", "SN", b"VIA-EE")).await;
    assert_eq!(written, 6);
    // The declared inventory object is still updated.
    assert_eq!(h.inventory.notifications.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_write_returns_minus_one_and_releases_the_guard() {
    let h = harness();
    let before = fs::read(h.primary.path()).unwrap();
    let written = h
        .manager
        .write_keyword(MOTHERBOARD, ipz_write("VINI", "ZZ", b"nope"))
        .await;
    assert_eq!(written, -1);
    assert_eq!(fs::read(h.primary.path()).unwrap(), before);
    assert_eq!(h.guard.inhibits.load(Ordering::SeqCst), 1);
    assert_eq!(h.guard.releases.load(Ordering::SeqCst), 1);
    assert!(h.inventory.notifications.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mismatched_request_shape_fails() {
    let h = harness();
    let written = h
        .manager
        .write_keyword(
            MOTHERBOARD,
            WriteRequest::KwVpd {
                keyword: "SN".to_string(),
                value: b"x".to_vec(),
            },
        )
        .await;
    assert_eq!(written, -1);
}

#[tokio::test]
async fn empty_path_fails() {
    let h = harness();
    assert_eq!(
        h.manager.write_keyword("", ipz_write("VINI", "SN", b"x")).await,
        -1
    );
}

#[tokio::test]
async fn read_repairs_correctable_damage_on_the_eeprom() {
    let h = harness();
    let pristine = fs::read(h.primary.path()).unwrap();
    let mut damaged = pristine.clone();
    damaged[44] ^= 0x20;
    fs::write(h.primary.path(), &damaged).unwrap();

    let path = h.primary.path().to_str().unwrap().to_string();
    let value = h
        .manager
        .read_keyword(
            &path,
            &ReadRequest::Ipz {
                record: "VINI".to_string(),
                keyword: "SN".to_string(),
            },
        )
        .unwrap();
    assert_eq!(value, b"OLD123      ");
    // The corrected window was written back.
    assert_eq!(fs::read(h.primary.path()).unwrap(), pristine);
}

#[tokio::test]
async fn collect_requires_a_ready_platform() {
    let h = harness();
    h.platform.ready.store(false, Ordering::SeqCst);
    assert!(matches!(
        h.manager.collect_fru(MOTHERBOARD).await,
        Err(VpdManagerError::ServiceUnavailable(_))
    ));
}

#[tokio::test]
async fn collect_publishes_records_and_configured_interfaces() {
    let h = harness();
    h.manager.collect_fru(MOTHERBOARD).await.unwrap();

    let notifications = h.inventory.notifications.lock().unwrap();
    let interfaces = &notifications[0][MOTHERBOARD];

    // Inherited records under the IPZ interface prefix.
    assert_eq!(
        interfaces["com.ibm.ipzvpd.VINI"]["SN"],
        PropertyValue::Bytes(b"OLD123      ".to_vec())
    );
    assert_eq!(
        interfaces["com.ibm.ipzvpd.VCEN"]["SE"],
        PropertyValue::Bytes(b"XYZ00001".to_vec())
    );
    // Common interface sourced from a keyword.
    assert_eq!(
        interfaces["xyz.openbmc_project.Inventory.Decorator.Asset"]
            ["SerialNumber"],
        PropertyValue::Bytes(b"OLD123      ".to_vec())
    );
    // Extra interface literal carried verbatim.
    assert_eq!(
        interfaces["com.ibm.ipzvpd.Location"]["LocationCode"],
        PropertyValue::Text("Ufcs-P0".to_string())
    );
}

#[tokio::test]
async fn collect_of_unknown_object_is_invalid() {
    let h = harness();
    assert!(matches!(
        h.manager.collect_fru("/nope").await,
        Err(VpdManagerError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn delete_clears_the_published_view_only() {
    let h = harness();
    let before = fs::read(h.primary.path()).unwrap();
    h.manager.delete_fru(MOTHERBOARD).await.unwrap();
    assert_eq!(
        *h.inventory.cleared.lock().unwrap(),
        vec![MOTHERBOARD.to_string()]
    );
    assert_eq!(fs::read(h.primary.path()).unwrap(), before);
}

#[tokio::test]
async fn location_code_expansion_uses_the_system_vpd() {
    let h = harness();
    // Collecting the motherboard caches its VCEN record.
    h.manager.collect_fru(MOTHERBOARD).await.unwrap();

    let expanded =
        h.manager.expand_location_code("Ufcs-A1", 0).unwrap();
    assert_eq!(expanded, "UF123.ND0.XYZ00001-A1");

    let bare = h.manager.expand_location_code("Ufcs", 3).unwrap();
    assert_eq!(bare, "UF123.ND3.XYZ00001");
}

#[tokio::test]
async fn location_code_expansion_before_collection_is_unavailable() {
    let h = harness();
    assert!(matches!(
        h.manager.expand_location_code("Ufcs-A1", 0),
        Err(VpdManagerError::ServiceUnavailable(_))
    ));
}

#[test]
fn location_code_validity() {
    assert!(is_valid_unexpanded_location_code("Ufcs"));
    assert!(is_valid_unexpanded_location_code("Umts"));
    assert!(is_valid_unexpanded_location_code("Ufcs-P0-C12"));
    assert!(!is_valid_unexpanded_location_code("U"));
    assert!(!is_valid_unexpanded_location_code("Xfcs-P0"));
    assert!(!is_valid_unexpanded_location_code("UfcsP0"));
}

#[tokio::test]
async fn unexpansion_inverts_expansion() {
    let h = harness();
    h.manager.collect_fru(MOTHERBOARD).await.unwrap();

    let expanded =
        h.manager.expand_location_code("Ufcs-P0", 2).unwrap();
    let (code, node) =
        h.manager.unexpand_location_code(&expanded).unwrap();
    assert_eq!(code, "Ufcs-P0");
    assert_eq!(node, Some(2));

    // And the unexpanded code resolves to the configured FRU.
    assert_eq!(
        h.manager.frus_by_expanded_location_code(&expanded).unwrap(),
        vec![MOTHERBOARD.to_string()]
    );
}

#[tokio::test]
async fn frus_by_unknown_location_code_is_invalid() {
    let h = harness();
    assert!(matches!(
        h.manager.frus_by_unexpanded_location_code("Ufcs-P9"),
        Err(VpdManagerError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn hardware_path_reverse_lookup() {
    let h = harness();
    assert_eq!(
        h.manager.get_hardware_path(MOTHERBOARD).as_deref(),
        h.primary.path().to_str()
    );
    assert_eq!(h.manager.get_hardware_path("/nope"), None);
}

#[tokio::test(start_paused = true)]
async fn collection_cycle_transitions_the_status() {
    let h = harness();
    assert_eq!(h.manager.collection_status(), CollectionStatus::NotStarted);

    h.inventory.system_vpd_published.store(true, Ordering::SeqCst);
    let mut status = h.manager.subscribe_collection_status();

    let handle = tokio::spawn(Arc::clone(&h.manager).run_collection());

    status.changed().await.unwrap();
    assert_eq!(*status.borrow(), CollectionStatus::InProgress);

    handle.await.unwrap().unwrap();
    assert_eq!(h.manager.collection_status(), CollectionStatus::Completed);
    assert_eq!(h.inventory.notifications.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn recollection_runs_the_fleet_again() {
    let h = harness();
    h.inventory.system_vpd_published.store(true, Ordering::SeqCst);
    Arc::clone(&h.manager).run_collection().await.unwrap();
    Arc::clone(&h.manager).perform_recollection().await.unwrap();
    assert_eq!(h.manager.collection_status(), CollectionStatus::Completed);
    assert_eq!(h.inventory.notifications.lock().unwrap().len(), 2);
}
