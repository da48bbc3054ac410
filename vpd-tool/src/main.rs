// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diagnostic CLI for VPD EEPROMs: read or write single keywords and
//! dump whole containers, straight against the hardware.

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use slog::info;
use slog::o;
use slog::Drain;
use slog::Level;
use slog::Logger;
use std::path::PathBuf;
use std::sync::Arc;
use vpd_codec::ddimm;
use vpd_codec::identify;
use vpd_codec::ipz;
use vpd_codec::keyword_vpd;
use vpd_codec::VpdKind;
use vpd_manager::eeprom;
use vpd_manager::publish::InventoryClient;
use vpd_manager::publish::ObjectMap;
use vpd_manager::publish::PlatformState;
use vpd_manager::publish::RebootGuard;
use vpd_manager::ReadRequest;
use vpd_manager::SystemConfig;
use vpd_manager::VpdManager;
use vpd_manager::VpdManagerError;
use vpd_manager::WriteRequest;

/// Command line tool to read, write, and dump VPD keywords.
#[derive(Parser, Debug)]
struct Args {
    #[clap(
        short,
        long,
        default_value = "info",
        value_parser = level_from_str,
        help = "Log level",
    )]
    log_level: Level,

    /// System configuration JSON mapping EEPROMs to inventory objects.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Read the requested keyword.
    #[clap(short = 'r', long = "read")]
    read: bool,

    /// Write this value to the requested keyword.
    #[clap(short = 'w', long = "write", value_name = "VALUE")]
    write: Option<String>,

    /// Dump every record and keyword of the target.
    #[clap(long)]
    dump: bool,

    /// Inventory object path of the FRU (resolved via --config).
    #[clap(short = 'O', long = "object")]
    object: Option<String>,

    /// Record name, for IPZ-format VPD.
    #[clap(short = 'R', long = "record")]
    record: Option<String>,

    /// Keyword name.
    #[clap(short = 'K', long = "keyword")]
    keyword: Option<String>,

    /// Operate on this EEPROM or image file directly.
    #[clap(long)]
    file: Option<PathBuf>,

    /// Operate on the hardware rather than the published cache. Cache
    /// access needs the running service, so object-path operations
    /// require this flag here.
    #[clap(short = 'H', long = "hardware")]
    hardware: bool,
}

fn level_from_str(s: &str) -> Result<Level> {
    s.parse().map_err(|()| anyhow!("Invalid log level: {s}"))
}

/// The tool publishes nothing; the running service owns the inventory.
struct NoInventory;

#[async_trait]
impl InventoryClient for NoInventory {
    async fn notify(&self, _: ObjectMap) -> Result<(), VpdManagerError> {
        Ok(())
    }

    async fn clear_object(&self, _: &str) -> Result<(), VpdManagerError> {
        Ok(())
    }

    async fn system_vpd_published(&self) -> bool {
        false
    }
}

struct AlwaysReady;

#[async_trait]
impl PlatformState for AlwaysReady {
    async fn is_ready(&self) -> bool {
        true
    }
}

/// Reboot inhibition is the service's job; the diagnostic tool assumes
/// the operator knows the machine state.
struct NoGuard;

#[async_trait]
impl RebootGuard for NoGuard {
    async fn inhibit(&self) -> Result<(), VpdManagerError> {
        Ok(())
    }

    async fn release(&self) -> Result<(), VpdManagerError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator)
        .build()
        .filter_level(args.log_level)
        .fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let log = Logger::root(drain, o!("component" => "vpd-tool"));

    let config = match &args.config {
        Some(path) => SystemConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SystemConfig::default(),
    };

    let eeprom_path = resolve_eeprom(&args, &config)?;
    info!(log, "operating on {eeprom_path}");

    let manager = Arc::new(VpdManager::new(
        log.clone(),
        config,
        Arc::new(NoInventory),
        Arc::new(AlwaysReady),
        Arc::new(NoGuard),
    ));

    if args.dump {
        return dump(&manager, &eeprom_path);
    }

    let keyword = args
        .keyword
        .clone()
        .ok_or_else(|| anyhow!("a keyword (-K) is required"))?;

    if let Some(value) = &args.write {
        let request = match &args.record {
            Some(record) => WriteRequest::Ipz {
                record: record.clone(),
                keyword,
                value: value.clone().into_bytes(),
            },
            None => WriteRequest::KwVpd {
                keyword,
                value: value.clone().into_bytes(),
            },
        };
        let written = manager.write_keyword(&eeprom_path, request).await;
        if written < 0 {
            bail!("keyword write failed");
        }
        println!("{written}");
        return Ok(());
    }

    if args.read {
        let request = match &args.record {
            Some(record) => ReadRequest::Ipz {
                record: record.clone(),
                keyword,
            },
            None => ReadRequest::KwVpd { keyword },
        };
        let value = manager.read_keyword(&eeprom_path, &request)?;
        println!("{}", display_value(&value));
        return Ok(());
    }

    bail!("nothing to do: pass one of -r, -w, or --dump");
}

/// Pick the EEPROM to operate on from `--file` or `-O` + `--config`.
fn resolve_eeprom(args: &Args, config: &SystemConfig) -> Result<String> {
    if let Some(file) = &args.file {
        return Ok(file.display().to_string());
    }
    let object = args
        .object
        .as_ref()
        .ok_or_else(|| anyhow!("pass --file or an object path (-O)"))?;
    if !args.hardware {
        bail!(
            "cache reads go through the running VPD service; \
             pass -H to operate on the hardware"
        );
    }
    config
        .hardware_path_for(object)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no FRU configured for {object}"))
}

/// Parse the whole container and print it.
fn dump(
    manager: &VpdManager<NoInventory, AlwaysReady, NoGuard>,
    eeprom_path: &str,
) -> Result<()> {
    let offset = manager.config().vpd_offset(eeprom_path);
    let mut blob =
        eeprom::read_vpd_slice(std::path::Path::new(eeprom_path), offset)?;
    match identify(&blob)? {
        VpdKind::Ipz => {
            let parsed = ipz::parse(&mut blob)?;
            for (record, keywords) in &parsed.records {
                println!("{record}:");
                for (keyword, value) in keywords {
                    println!("  {keyword} = {}", display_value(value));
                }
            }
        }
        VpdKind::KwVpd => {
            for (keyword, value) in &keyword_vpd::parse(&blob)? {
                println!("{keyword} = {}", display_value(value));
            }
        }
        VpdKind::DdimmSpd => {
            let vpd = ddimm::parse(&blob)?;
            println!("MemorySizeInKB = {}", vpd.size_kb);
            for (keyword, value) in &vpd.keywords {
                println!("{keyword} = {}", display_value(value));
            }
        }
    }
    Ok(())
}

/// Printable values as text, everything else as hex.
fn display_value(value: &[u8]) -> String {
    if !value.is_empty()
        && value.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    {
        String::from_utf8_lossy(value).into_owned()
    } else {
        value.iter().map(|b| format!("{b:02x}")).collect()
    }
}
