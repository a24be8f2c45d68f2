//! Backup archive import.
//!
//! Several generations of export tooling produced different archive shapes;
//! the importer sniffs which one it was handed, decodes it into the canonical
//! models, and funnels every record through the same store path local edits
//! use, so imported rows participate in future sync cycles identically.

mod decode;

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{Database, EntityStore};
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::sync::SyncGuard;
use crate::util::now_ms;

use decode::RawBackup;

/// Marker file of the hybrid/mobile export.
pub const HYBRID_MARKER: &str = "metadata.json";
/// Payload file of the hybrid/mobile export.
pub const HYBRID_PAYLOAD: &str = "datos.json";
/// Marker file of the consolidated JSON snapshot export.
pub const SNAPSHOT_MARKER: &str = "backup.json";
/// Marker file of the multi-file CSV export.
pub const WEB_CLIENTS_MARKER: &str = "data/clients.csv";
/// Marker file of the legacy single-table export.
pub const LEGACY_CLIENTS_MARKER: &str = "clients.csv";

/// Historical export shapes, in detection-priority order.
///
/// Formats are not mutually exclusive by file presence alone (a hybrid
/// export may also carry a root client table), so the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFormat {
    /// `metadata.json` descriptor + entities nested under legacy keys
    Hybrid,
    /// Consolidated `backup.json` mapping near-directly onto the models
    JsonSnapshot,
    /// One delimited file per entity type under `data/`
    WebAdvanced,
    /// Root-level client table only; no repairs or invoices
    LegacyCsv,
}

impl fmt::Display for BackupFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Hybrid => "hybrid/mobile",
            Self::JsonSnapshot => "JSON snapshot",
            Self::WebAdvanced => "web advanced (CSV)",
            Self::LegacyCsv => "legacy CSV",
        };
        write!(f, "{label}")
    }
}

/// What an import applied, for user-facing reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub format: BackupFormat,
    pub clients: usize,
    pub repairs: usize,
    pub invoices: usize,
    /// Records dropped for referencing a client that exists nowhere
    pub skipped: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} import: {} clients, {} repairs, {} invoices ({} skipped)",
            self.format, self.clients, self.repairs, self.invoices, self.skipped
        )
    }
}

/// Classify an archive by its entry names. First match wins.
pub fn detect_format(names: &[String]) -> Result<BackupFormat> {
    let has = |marker: &str| names.iter().any(|name| name == marker);

    if has(HYBRID_MARKER) {
        return Ok(BackupFormat::Hybrid);
    }
    if has(SNAPSHOT_MARKER) {
        return Ok(BackupFormat::JsonSnapshot);
    }
    if has(WEB_CLIENTS_MARKER) {
        return Ok(BackupFormat::WebAdvanced);
    }
    if has(LEGACY_CLIENTS_MARKER) {
        return Ok(BackupFormat::LegacyCsv);
    }

    Err(Error::UnknownBackupFormat(format!(
        "none of the marker files were found \
         (looked for {HYBRID_MARKER}, {SNAPSHOT_MARKER}, {WEB_CLIENTS_MARKER}, \
         {LEGACY_CLIENTS_MARKER}; archive contains: {})",
        if names.is_empty() {
            "nothing".to_string()
        } else {
            names.join(", ")
        }
    )))
}

/// Import a backup archive from disk.
pub fn import_archive(db: &Database, guard: &SyncGuard, path: &Path) -> Result<ImportReport> {
    let file = File::open(path)?;
    import_from_reader(db, guard, file)
}

/// Import a backup archive from any seekable source.
///
/// All-or-nothing: decoding and validation run first, the store is touched
/// inside a single transaction, and any failure rolls everything back.
pub fn import_from_reader<S: Read + Seek>(
    db: &Database,
    guard: &SyncGuard,
    source: S,
) -> Result<ImportReport> {
    let _permit = guard.try_acquire().ok_or_else(|| {
        Error::Conflict("another sync or import is already in progress".to_string())
    })?;

    let entries = read_archive(source)?;
    let names: Vec<String> = entries.iter().map(|entry| entry.name.clone()).collect();
    let format = detect_format(&names)?;
    tracing::info!(%format, entries = names.len(), "Importing backup archive");

    let raw = decode_for(format, &entries)?;
    apply_backup(db, format, raw)
}

struct ArchiveEntry {
    name: String,
    bytes: Vec<u8>,
}

fn read_archive<S: Read + Seek>(source: S) -> Result<Vec<ArchiveEntry>> {
    let mut archive = zip::ZipArchive::new(source)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        entries.push(ArchiveEntry {
            name: file.name().to_string(),
            bytes,
        });
    }

    Ok(entries)
}

fn entry<'a>(entries: &'a [ArchiveEntry], name: &str) -> Option<&'a ArchiveEntry> {
    entries.iter().find(|entry| entry.name == name)
}

#[derive(Debug, Deserialize)]
struct HybridMetadata {
    #[serde(default)]
    app: Option<String>,
    #[serde(default)]
    version: Option<serde_json::Value>,
}

fn decode_for(format: BackupFormat, entries: &[ArchiveEntry]) -> Result<RawBackup> {
    match format {
        BackupFormat::Hybrid => {
            if let Some(metadata) = entry(entries, HYBRID_MARKER) {
                if let Ok(metadata) = serde_json::from_slice::<HybridMetadata>(&metadata.bytes) {
                    tracing::debug!(app = ?metadata.app, version = ?metadata.version, "Hybrid descriptor");
                }
            }
            let payload = entry(entries, HYBRID_PAYLOAD).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "hybrid backup carries {HYBRID_MARKER} but no {HYBRID_PAYLOAD}"
                ))
            })?;
            Ok(serde_json::from_slice(&payload.bytes)?)
        }
        BackupFormat::JsonSnapshot => {
            let payload = entry(entries, SNAPSHOT_MARKER)
                .ok_or_else(|| Error::InvalidInput(format!("missing {SNAPSHOT_MARKER}")))?;
            Ok(serde_json::from_slice(&payload.bytes)?)
        }
        BackupFormat::WebAdvanced => {
            let clients = entry(entries, WEB_CLIENTS_MARKER)
                .ok_or_else(|| Error::InvalidInput(format!("missing {WEB_CLIENTS_MARKER}")))?;
            Ok(RawBackup {
                clients: decode::decode_csv(&clients.bytes)?,
                repairs: entry(entries, "data/repairs.csv")
                    .map(|table| decode::decode_csv(&table.bytes))
                    .transpose()?
                    .unwrap_or_default(),
                invoices: entry(entries, "data/invoices.csv")
                    .map(|table| decode::decode_csv(&table.bytes))
                    .transpose()?
                    .unwrap_or_default(),
            })
        }
        BackupFormat::LegacyCsv => {
            let clients = entry(entries, LEGACY_CLIENTS_MARKER)
                .ok_or_else(|| Error::InvalidInput(format!("missing {LEGACY_CLIENTS_MARKER}")))?;
            Ok(RawBackup {
                clients: decode::decode_csv(&clients.bytes)?,
                repairs: Vec::new(),
                invoices: Vec::new(),
            })
        }
    }
}

const MAX_ID_ATTEMPTS: usize = 8;

/// Keep an archive-carried id as the merge key; mint a fresh one otherwise,
/// re-rolling on the (astronomically unlikely) collision with a local row.
fn resolve_id(store: &EntityStore<'_>, kind: EntityKind, carried: Option<Uuid>) -> Result<Uuid> {
    if let Some(id) = carried {
        return Ok(id);
    }

    for _ in 0..MAX_ID_ATTEMPTS {
        let id = Uuid::new_v4();
        if store.tombstone_state(kind, id)?.is_none() {
            return Ok(id);
        }
    }

    Err(Error::Conflict(format!(
        "could not generate a fresh {kind} id after {MAX_ID_ATTEMPTS} attempts"
    )))
}

fn apply_backup(db: &Database, format: BackupFormat, raw: RawBackup) -> Result<ImportReport> {
    let now = now_ms();
    let tx = db.connection().unchecked_transaction()?;

    let report = {
        let store = EntityStore::new(&tx);
        let mut report = ImportReport {
            format,
            clients: 0,
            repairs: 0,
            invoices: 0,
            skipped: 0,
        };

        for raw_client in raw.clients {
            let id = resolve_id(&store, EntityKind::Clients, raw_client.id)?;
            let mut client = raw_client.into_client(id, now);
            store.save(&mut client)?;
            report.clients += 1;
        }

        for raw_repair in raw.repairs {
            let Some(client_id) = raw_repair.client_id else {
                tracing::warn!("Skipping repair without a client reference");
                report.skipped += 1;
                continue;
            };
            if store
                .tombstone_state(EntityKind::Clients, client_id)?
                .is_none()
            {
                tracing::warn!(%client_id, "Skipping repair referencing an unknown client");
                report.skipped += 1;
                continue;
            }

            let id = resolve_id(&store, EntityKind::Repairs, raw_repair.id)?;
            let mut repair = raw_repair.into_repair(id, client_id, now);
            store.save(&mut repair)?;
            report.repairs += 1;
        }

        for raw_invoice in raw.invoices {
            let Some(client_id) = raw_invoice.client_id else {
                tracing::warn!("Skipping invoice without a client reference");
                report.skipped += 1;
                continue;
            };
            if store
                .tombstone_state(EntityKind::Clients, client_id)?
                .is_none()
            {
                tracing::warn!(%client_id, "Skipping invoice referencing an unknown client");
                report.skipped += 1;
                continue;
            }

            let id = resolve_id(&store, EntityKind::Invoices, raw_invoice.id)?;
            store.ensure_unique_invoice_number(&raw_invoice.number, id)?;
            let mut invoice = raw_invoice.into_invoice(id, client_id, now);
            store.save(&mut invoice)?;
            report.invoices += 1;
        }

        report
    };

    tx.commit()?;
    tracing::info!(%report, "Backup import applied");
    Ok(report)
}
