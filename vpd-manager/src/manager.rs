// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The VPD service: keyword reads and writes against configured EEPROMs,
//! FRU collection onto the inventory, and location-code expansion.
//!
//! A keyword write is a multi-target transaction: the primary EEPROM is
//! authoritative; the inventory republication and the redundant-EEPROM
//! mirror are best-effort followers whose failure surfaces a negative
//! result without rolling back the primary. Writes are serialized per
//! EEPROM path and wrapped in the host reboot inhibitor, which is
//! released on every exit path.

use crate::config::FruEntry;
use crate::config::PropertySpec;
use crate::config::SystemConfig;
use crate::eeprom;
use crate::editor;
use crate::error::VpdManagerError;
use crate::publish::encode_keyword;
use crate::publish::InterfaceMap;
use crate::publish::InventoryClient;
use crate::publish::ObjectMap;
use crate::publish::PlatformState;
use crate::publish::PropertyMap;
use crate::publish::PropertyValue;
use crate::publish::RebootGuard;
use crate::publish::IPZ_VPD_INTERFACE_PREFIX;
use crate::publish::KW_VPD_INTERFACE;
use crate::publish::MEMORY_SIZE_PROPERTY;
use slog::error;
use slog::info;
use slog::warn;
use slog::Logger;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::watch;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;
use vpd_codec::ddimm;
use vpd_codec::ddimm::DdimmVpd;
use vpd_codec::identify;
use vpd_codec::ipz;
use vpd_codec::keyword_vpd;
use vpd_codec::KeywordMap;
use vpd_codec::RecordMap;
use vpd_codec::VpdError;
use vpd_codec::VpdKind;

/// Poll period while waiting for the system VPD to appear on the broker.
const SYSTEM_VPD_POLL: Duration = Duration::from_secs(2);
/// Poll period while waiting for whole-fleet collection to finish.
const COLLECTION_POLL: Duration = Duration::from_secs(3);
/// Completion polls before the collection cycle is abandoned.
const COLLECTION_MAX_RETRY: u32 = 5;

/// Minimum length of a valid expanded location code.
const EXPANDED_LOCATION_CODE_MIN_LEN: usize = 17;

/// Fleet collection progress, published as a service property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::NotStarted => "NotStarted",
            CollectionStatus::InProgress => "InProgress",
            CollectionStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A keyword write request: IPZ VPD needs a record name, flat keyword
/// VPD does not.
#[derive(Debug, Clone)]
pub enum WriteRequest {
    Ipz { record: String, keyword: String, value: Vec<u8> },
    KwVpd { keyword: String, value: Vec<u8> },
}

/// A keyword read request, mirroring [`WriteRequest`].
#[derive(Debug, Clone)]
pub enum ReadRequest {
    Ipz { record: String, keyword: String },
    KwVpd { keyword: String },
}

/// Resolved write destination.
struct WriteTarget {
    eeprom: String,
    inventory_path: Option<String>,
    redundant: Option<String>,
}

/// One FRU's parsed VPD, whichever format it was.
enum ParsedVpd {
    Ipz(RecordMap),
    KwVpd(KeywordMap),
    Ddimm(DdimmVpd),
}

pub struct VpdManager<I, P, G> {
    log: Logger,
    config: Arc<SystemConfig>,
    inventory: Arc<I>,
    platform: Arc<P>,
    guard: Arc<G>,
    /// Per-EEPROM write serialization; the editor itself is unsynchronized.
    eeprom_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    status: watch::Sender<CollectionStatus>,
    /// FRUs processed in the current collection cycle.
    collected: StdMutex<HashSet<String>>,
    /// Parsed system VPD, backing location-code expansion.
    system_vpd: RwLock<Option<RecordMap>>,
    bad_vpd_dir: PathBuf,
}

impl<I, P, G> VpdManager<I, P, G>
where
    I: InventoryClient,
    P: PlatformState,
    G: RebootGuard,
{
    pub fn new(
        log: Logger,
        config: SystemConfig,
        inventory: Arc<I>,
        platform: Arc<P>,
        guard: Arc<G>,
    ) -> Self {
        let (status, _) = watch::channel(CollectionStatus::NotStarted);
        Self {
            log,
            config: Arc::new(config),
            inventory,
            platform,
            guard,
            eeprom_locks: StdMutex::new(HashMap::new()),
            status,
            collected: StdMutex::new(HashSet::new()),
            system_vpd: RwLock::new(None),
            bad_vpd_dir: PathBuf::from(eeprom::BAD_VPD_DIR),
        }
    }

    /// Redirect bad-VPD dumps, e.g. into a scratch directory.
    pub fn with_bad_vpd_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bad_vpd_dir = dir.into();
        self
    }

    /// Seed the system VPD cache; collection does this automatically
    /// when it parses the backplane FRU.
    pub fn set_system_vpd(&self, map: RecordMap) {
        *self.system_vpd.write().unwrap() = Some(map);
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn collection_status(&self) -> CollectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_collection_status(
        &self,
    ) -> watch::Receiver<CollectionStatus> {
        self.status.subscribe()
    }

    async fn lock_eeprom(&self, eeprom: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .eeprom_locks
            .lock()
            .unwrap()
            .entry(eeprom.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Map an incoming path (inventory object or EEPROM device) to the
    /// EEPROM to write plus its configured mirrors.
    fn resolve_target(&self, path: &str) -> WriteTarget {
        if let Some((eeprom, entry)) = self.config.fru_by_inventory_path(path)
        {
            return WriteTarget {
                eeprom: eeprom.to_string(),
                inventory_path: Some(entry.inventory_path.clone()),
                redundant: entry.redundant_eeprom.clone(),
            };
        }
        if let Some(entry) = self.config.primary_entry(path) {
            return WriteTarget {
                eeprom: path.to_string(),
                inventory_path: Some(entry.inventory_path.clone()),
                redundant: entry.redundant_eeprom.clone(),
            };
        }
        WriteTarget {
            eeprom: path.to_string(),
            inventory_path: None,
            redundant: None,
        }
    }

    /// Write one keyword. Returns the bytes written on the primary
    /// EEPROM, or -1 on any failure.
    pub async fn write_keyword(
        &self,
        path: &str,
        request: WriteRequest,
    ) -> i32 {
        match self.write_keyword_inner(path, &request).await {
            Ok(n) => n as i32,
            Err(err) => {
                error!(
                    self.log, "keyword write failed";
                    "path" => path,
                    "err" => %err,
                );
                -1
            }
        }
    }

    async fn write_keyword_inner(
        &self,
        path: &str,
        request: &WriteRequest,
    ) -> Result<usize, VpdManagerError> {
        if path.is_empty() {
            return Err(VpdManagerError::InvalidArgument(
                "empty VPD path".to_string(),
            ));
        }
        let target = self.resolve_target(path);
        let _guard = self.lock_eeprom(&target.eeprom).await;

        // Restrict host reboots while VPD is being written, and lift the
        // restriction on every exit path.
        self.guard.inhibit().await?;
        let result = self.write_locked(&target, request).await;
        if let Err(err) = self.guard.release().await {
            warn!(
                self.log, "failed to release the reboot inhibitor";
                "err" => %err,
            );
        }
        result
    }

    async fn write_locked(
        &self,
        target: &WriteTarget,
        request: &WriteRequest,
    ) -> Result<usize, VpdManagerError> {
        let written = self.write_on_hardware(&target.eeprom, request)?;

        if let Some(object_path) = &target.inventory_path {
            let WriteRequest::Ipz { record, keyword, .. } = request else {
                return Err(VpdManagerError::InvalidArgument(
                    "keyword VPD writes cannot update an inventory object"
                        .to_string(),
                ));
            };
            // Publish what the hardware now holds, not what the caller
            // sent; truncation may have shortened it.
            let value = self.read_keyword(
                &target.eeprom,
                &ReadRequest::Ipz {
                    record: record.clone(),
                    keyword: keyword.clone(),
                },
            )?;
            let mut properties = PropertyMap::new();
            properties.insert(keyword.clone(), PropertyValue::Bytes(value));
            let mut interfaces = InterfaceMap::new();
            interfaces.insert(
                format!("{IPZ_VPD_INTERFACE_PREFIX}{record}"),
                properties,
            );
            let mut objects = ObjectMap::new();
            objects.insert(object_path.clone(), interfaces);
            self.inventory.notify(objects).await?;
        }

        if let Some(redundant) = &target.redundant {
            self.write_on_hardware(redundant, request)?;
        }

        Ok(written)
    }

    fn write_on_hardware(
        &self,
        eeprom: &str,
        request: &WriteRequest,
    ) -> Result<usize, VpdManagerError> {
        let offset = self.config.vpd_offset(eeprom);
        let path = Path::new(eeprom);
        let blob = eeprom::read_vpd_slice(path, offset)?;
        match identify(&blob)? {
            VpdKind::Ipz => {
                let WriteRequest::Ipz { record, keyword, value } = request
                else {
                    return Err(VpdError::InvalidArgument(
                        "IPZ VPD requires a record name",
                    )
                    .into());
                };
                editor::write_ipz_keyword(
                    &self.log, path, offset, record, keyword, value,
                )
            }
            VpdKind::KwVpd => {
                let WriteRequest::KwVpd { keyword, value } = request else {
                    return Err(VpdError::InvalidArgument(
                        "keyword VPD does not have records",
                    )
                    .into());
                };
                editor::write_kw_vpd_keyword(
                    &self.log, path, offset, keyword, value,
                )
            }
            VpdKind::DdimmSpd => Err(VpdError::InvalidArgument(
                "DDIMM SPD is read-only",
            )
            .into()),
        }
    }

    /// Read one keyword straight from the hardware.
    pub fn read_keyword(
        &self,
        eeprom: &str,
        request: &ReadRequest,
    ) -> Result<Vec<u8>, VpdManagerError> {
        if eeprom.is_empty() {
            return Err(VpdManagerError::InvalidArgument(
                "empty VPD path".to_string(),
            ));
        }
        let offset = self.config.vpd_offset(eeprom);
        let path = Path::new(eeprom);
        let mut blob = eeprom::read_vpd_slice(path, offset)?;
        match identify(&blob)? {
            VpdKind::Ipz => {
                let ReadRequest::Ipz { record, keyword } = request else {
                    return Err(VpdError::InvalidArgument(
                        "IPZ VPD requires a record name",
                    )
                    .into());
                };
                let (value, repaired) =
                    ipz::read_keyword(&mut blob, record, keyword)?;
                eeprom::write_back_repairs_at(
                    &self.log, path, offset, &blob, &repaired,
                );
                Ok(value)
            }
            VpdKind::KwVpd => {
                let keyword = request_keyword(request)?;
                let map = keyword_vpd::parse(&blob)?;
                map.get(keyword).cloned().ok_or_else(|| {
                    VpdError::KeywordNotFound(keyword.to_string()).into()
                })
            }
            VpdKind::DdimmSpd => {
                let keyword = request_keyword(request)?;
                let vpd = ddimm::parse(&blob)?;
                vpd.keywords.get(keyword).cloned().ok_or_else(|| {
                    VpdError::KeywordNotFound(keyword.to_string()).into()
                })
            }
        }
    }

    /// Parse and publish one FRU's VPD onto its inventory object.
    pub async fn collect_fru(
        &self,
        object_path: &str,
    ) -> Result<(), VpdManagerError> {
        if !self.platform.is_ready().await {
            return Err(VpdManagerError::ServiceUnavailable(
                "platform is not ready",
            ));
        }
        let (eeprom, entry) = self
            .config
            .fru_by_inventory_path(object_path)
            .ok_or_else(|| {
                VpdManagerError::InvalidArgument(format!(
                    "no FRU configured for {object_path}"
                ))
            })?;
        let (eeprom, entry) = (eeprom.to_string(), entry.clone());
        self.collect_eeprom(&eeprom, &entry).await
    }

    async fn collect_eeprom(
        &self,
        eeprom: &str,
        entry: &FruEntry,
    ) -> Result<(), VpdManagerError> {
        let path = Path::new(eeprom);
        let mut blob = eeprom::read_vpd_slice(path, entry.offset)?;
        let parsed = match self.parse_blob(&mut blob, path, entry.offset) {
            Ok(parsed) => parsed,
            Err(err) => {
                eeprom::dump_bad_vpd(
                    &self.log,
                    &self.bad_vpd_dir,
                    path,
                    &blob,
                );
                return Err(err);
            }
        };

        if let ParsedVpd::Ipz(map) = &parsed {
            // The backplane's VPD carries the enclosure and machine-type
            // records the location-code expander needs.
            if map.contains_key("VCEN") || map.contains_key("VSYS") {
                self.set_system_vpd(map.clone());
            }
        }

        let objects = self.build_object_map(entry, &parsed);
        self.inventory.notify(objects).await?;
        info!(
            self.log, "collected FRU VPD";
            "eeprom" => eeprom,
            "object" => %entry.inventory_path,
        );
        Ok(())
    }

    fn parse_blob(
        &self,
        blob: &mut Vec<u8>,
        path: &Path,
        offset: u64,
    ) -> Result<ParsedVpd, VpdManagerError> {
        match identify(blob)? {
            VpdKind::Ipz => {
                let parsed = ipz::parse(blob)?;
                eeprom::write_back_repairs_at(
                    &self.log,
                    path,
                    offset,
                    blob,
                    &parsed.repaired,
                );
                Ok(ParsedVpd::Ipz(parsed.records))
            }
            VpdKind::KwVpd => {
                Ok(ParsedVpd::KwVpd(keyword_vpd::parse(blob)?))
            }
            VpdKind::DdimmSpd => Ok(ParsedVpd::Ddimm(ddimm::parse(blob)?)),
        }
    }

    /// Build the inventory view for a FRU: inherited records, copied
    /// records, and the configured extra/common interfaces.
    fn build_object_map(
        &self,
        entry: &FruEntry,
        parsed: &ParsedVpd,
    ) -> ObjectMap {
        let mut interfaces = InterfaceMap::new();

        match parsed {
            ParsedVpd::Ipz(records) => {
                for (record, keywords) in records {
                    let copied = entry
                        .copy_records
                        .iter()
                        .any(|name| name == record);
                    if !entry.inherit && !copied {
                        continue;
                    }
                    let properties: PropertyMap = keywords
                        .iter()
                        .map(|(keyword, value)| {
                            (
                                keyword.clone(),
                                PropertyValue::Bytes(value.clone()),
                            )
                        })
                        .collect();
                    interfaces.insert(
                        format!("{IPZ_VPD_INTERFACE_PREFIX}{record}"),
                        properties,
                    );
                }
            }
            ParsedVpd::KwVpd(keywords) => {
                if entry.inherit {
                    let properties: PropertyMap = keywords
                        .iter()
                        .map(|(keyword, value)| {
                            (
                                keyword.clone(),
                                PropertyValue::Bytes(value.clone()),
                            )
                        })
                        .collect();
                    interfaces
                        .insert(KW_VPD_INTERFACE.to_string(), properties);
                }
            }
            ParsedVpd::Ddimm(vpd) => {
                let mut properties: PropertyMap = vpd
                    .keywords
                    .iter()
                    .map(|(keyword, value)| {
                        (keyword.clone(), PropertyValue::Bytes(value.clone()))
                    })
                    .collect();
                properties.insert(
                    MEMORY_SIZE_PROPERTY.to_string(),
                    PropertyValue::Size(vpd.size_kb),
                );
                interfaces.insert(KW_VPD_INTERFACE.to_string(), properties);
            }
        }

        let specs = entry
            .extra_interfaces
            .iter()
            .chain(self.config.common_interfaces.iter());
        for (interface, properties) in specs {
            let mut map = PropertyMap::new();
            for (property, spec) in properties {
                match spec {
                    PropertySpec::Keyword(source) => {
                        if let Some(value) = lookup_keyword(
                            parsed,
                            &source.record_name,
                            &source.keyword_name,
                        ) {
                            map.insert(
                                property.clone(),
                                encode_keyword(value, source.encoding),
                            );
                        }
                    }
                    PropertySpec::Literal(serde_json::Value::String(s)) => {
                        map.insert(
                            property.clone(),
                            PropertyValue::Text(s.clone()),
                        );
                    }
                    PropertySpec::Literal(_) => {}
                }
            }
            if !map.is_empty() {
                interfaces
                    .entry(interface.clone())
                    .or_default()
                    .extend(map);
            }
        }

        let mut objects = ObjectMap::new();
        objects.insert(entry.inventory_path.clone(), interfaces);
        objects
    }

    /// Clear a FRU's published view. The EEPROM bytes are untouched.
    pub async fn delete_fru(
        &self,
        object_path: &str,
    ) -> Result<(), VpdManagerError> {
        if self.config.fru_by_inventory_path(object_path).is_none() {
            return Err(VpdManagerError::InvalidArgument(format!(
                "no FRU configured for {object_path}"
            )));
        }
        self.inventory.clear_object(object_path).await
    }

    /// The EEPROM device behind an inventory object.
    pub fn get_hardware_path(&self, object_path: &str) -> Option<String> {
        self.config.hardware_path_for(object_path).map(str::to_string)
    }

    fn system_keyword(
        &self,
        record: &str,
        keyword: &str,
    ) -> Result<String, VpdManagerError> {
        let cache = self.system_vpd.read().unwrap();
        let map = cache.as_ref().ok_or(
            VpdManagerError::ServiceUnavailable(
                "system VPD is not yet collected",
            ),
        )?;
        let value = map
            .get(record)
            .and_then(|keywords| keywords.get(keyword))
            .ok_or_else(|| {
                VpdError::KeywordNotFound(format!("{record}:{keyword}"))
            })?;
        Ok(String::from_utf8_lossy(value).into_owned())
    }

    /// Expand a short location code by splicing in the system keywords:
    /// "fcs" becomes `<FC[0..4]>.ND<node>.<SE>`, "mts" becomes
    /// `<TM with '-' mapped to '.'>.<SE>`.
    pub fn expand_location_code(
        &self,
        code: &str,
        node: u16,
    ) -> Result<String, VpdManagerError> {
        if !is_valid_unexpanded_location_code(code) {
            return Err(VpdManagerError::InvalidArgument(format!(
                "invalid location code {code:?}"
            )));
        }
        if code.starts_with("Ufcs") {
            let fc = self.system_keyword("VCEN", "FC")?;
            let se = self.system_keyword("VCEN", "SE")?;
            let fc = fc.get(..4).unwrap_or(&fc);
            Ok(code.replacen("fcs", &format!("{fc}.ND{node}.{se}"), 1))
        } else {
            let tm = self.system_keyword("VSYS", "TM")?.replace('-', ".");
            let se = self.system_keyword("VSYS", "SE")?;
            Ok(code.replacen("mts", &format!("{tm}.{se}"), 1))
        }
    }

    /// Recover the short location code (and node number, for enclosure
    /// codes) from an expanded one.
    pub fn unexpand_location_code(
        &self,
        expanded: &str,
    ) -> Result<(String, Option<u16>), VpdManagerError> {
        let invalid = || {
            VpdManagerError::InvalidArgument(format!(
                "invalid expanded location code {expanded:?}"
            ))
        };
        if !expanded.starts_with('U')
            || expanded.len() < EXPANDED_LOCATION_CODE_MIN_LEN
        {
            return Err(invalid());
        }
        let leader = expanded.get(1..5).ok_or_else(invalid)?;

        let fc = self.system_keyword("VCEN", "FC")?;
        if fc.get(..4) == Some(leader) {
            let node_start =
                expanded.find('.').ok_or_else(invalid)?;
            let node_end = expanded[node_start + 1..]
                .find('.')
                .map(|i| i + node_start + 1)
                .ok_or_else(invalid)?;
            // Skip the ".ND" ahead of the digits.
            let node: u16 = expanded
                .get(node_start + 3..node_end)
                .and_then(|s| s.parse().ok())
                .ok_or_else(invalid)?;
            // The SE keyword sits between the node number and whatever
            // suffix the short code carried.
            let se = self.system_keyword("VCEN", "SE")?;
            let rest = expanded
                .get(node_end + 1 + se.len()..)
                .ok_or_else(invalid)?;
            let unexpanded = format!("Ufcs{rest}");
            return Ok((unexpanded, Some(node)));
        }

        let tm = self.system_keyword("VSYS", "TM")?;
        if tm.get(..4) == Some(leader) {
            return Ok(("Umts".to_string(), None));
        }
        Err(invalid())
    }

    /// Inventory objects configured with this short location code.
    pub fn frus_by_unexpanded_location_code(
        &self,
        code: &str,
    ) -> Result<Vec<String>, VpdManagerError> {
        if !is_valid_unexpanded_location_code(code) {
            return Err(VpdManagerError::InvalidArgument(format!(
                "invalid location code {code:?}"
            )));
        }
        let paths = self.config.frus_by_location_code(code);
        if paths.is_empty() {
            return Err(VpdManagerError::InvalidArgument(format!(
                "no FRU at location {code:?}"
            )));
        }
        Ok(paths)
    }

    /// Inventory objects matching an expanded location code.
    pub fn frus_by_expanded_location_code(
        &self,
        expanded: &str,
    ) -> Result<Vec<String>, VpdManagerError> {
        let (code, _node) = self.unexpand_location_code(expanded)?;
        self.frus_by_unexpanded_location_code(&code)
    }

    fn fleet_size(&self) -> usize {
        self.config.frus.values().map(Vec::len).sum()
    }

    fn mark_collected(&self, eeprom: &str, entry: &FruEntry) {
        self.collected
            .lock()
            .unwrap()
            .insert(format!("{eeprom}\u{0}{}", entry.inventory_path));
    }

    fn collected_count(&self) -> usize {
        self.collected.lock().unwrap().len()
    }

    /// Run one full collection cycle: wait for the system VPD to appear
    /// on the broker, collect every configured FRU exactly once, then
    /// poll for completion until the retry ceiling.
    pub async fn run_collection(
        self: Arc<Self>,
    ) -> Result<(), VpdManagerError> {
        loop {
            tokio::time::sleep(SYSTEM_VPD_POLL).await;
            if self.inventory.system_vpd_published().await {
                break;
            }
        }
        let _ = self.status.send(CollectionStatus::InProgress);
        Self::collect_fleet(&self).await
    }

    /// Collect the whole fleet again, from scratch.
    pub async fn perform_recollection(
        self: Arc<Self>,
    ) -> Result<(), VpdManagerError> {
        self.collected.lock().unwrap().clear();
        let _ = self.status.send(CollectionStatus::InProgress);
        Self::collect_fleet(&self).await
    }

    async fn collect_fleet(
        this: &Arc<Self>,
    ) -> Result<(), VpdManagerError> {
        for (eeprom, entries) in &this.config.frus {
            for entry in entries {
                let task = Arc::clone(this);
                let eeprom = eeprom.clone();
                let entry = entry.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        task.collect_eeprom(&eeprom, &entry).await
                    {
                        warn!(
                            task.log, "FRU VPD collection failed";
                            "eeprom" => %eeprom,
                            "err" => %err,
                        );
                    }
                    // Processed exactly once per cycle, success or not.
                    task.mark_collected(&eeprom, &entry);
                });
            }
        }

        let fleet = this.fleet_size();
        let mut retries = 0;
        loop {
            tokio::time::sleep(COLLECTION_POLL).await;
            if this.collected_count() >= fleet {
                let _ = this.status.send(CollectionStatus::Completed);
                info!(this.log, "FRU VPD collection completed");
                return Ok(());
            }
            retries += 1;
            if retries >= COLLECTION_MAX_RETRY {
                error!(
                    this.log,
                    "FRU VPD collection did not complete";
                    "collected" => this.collected_count(),
                    "fleet" => fleet,
                );
                return Err(VpdManagerError::Timeout("FRU VPD collection"));
            }
        }
    }
}

fn lookup_keyword<'a>(
    parsed: &'a ParsedVpd,
    record: &str,
    keyword: &str,
) -> Option<&'a [u8]> {
    match parsed {
        ParsedVpd::Ipz(records) => {
            records.get(record)?.get(keyword).map(Vec::as_slice)
        }
        ParsedVpd::KwVpd(map) => map.get(keyword).map(Vec::as_slice),
        ParsedVpd::Ddimm(vpd) => {
            vpd.keywords.get(keyword).map(Vec::as_slice)
        }
    }
}

fn request_keyword(request: &ReadRequest) -> Result<&str, VpdManagerError> {
    match request {
        ReadRequest::KwVpd { keyword } => Ok(keyword),
        ReadRequest::Ipz { .. } => Err(VpdError::InvalidArgument(
            "this VPD format does not have records",
        )
        .into()),
    }
}

/// A short location code is at least "Ufcs"/"Umts", and anything longer
/// continues with '-'.
pub fn is_valid_unexpanded_location_code(code: &str) -> bool {
    (code.starts_with("Ufcs") || code.starts_with("Umts"))
        && (code.len() == 4 || code.as_bytes().get(4) == Some(&b'-'))
}
