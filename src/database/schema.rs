//! On-disk schema versions and the migrations between them.
//!
//! Version 0 is an empty file, version 1 the legacy layout of flat tables
//! holding encoded points, and version 2 the current `metadata`/`points`/
//! `aliases` layout. Every transition runs inside the initialising write
//! transaction, so a migration either fully commits or leaves the file as it was.

use log::info;
use redb::{Database, ReadableTable, TableDefinition, TableError, TableHandle, WriteTransaction};

use super::error::{Result, StorageError};
use super::keys::{PointKey, WindowSpec};
use crate::codec::decode_point;

pub const METADATA_TABLE: TableDefinition<&str, u64> = TableDefinition::new("metadata");
pub const POINTS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("points");
pub const ALIASES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("aliases");

const VERSION_KEY: &str = "version";
const WINDOW_SIZE_KEY: &str = "window_size_ns";

pub const CURRENT_VERSION: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Nothing stored yet.
    Fresh,
    /// Flat tables of encoded points, no metadata.
    Legacy,
    Current,
}

impl SchemaVersion {
    pub fn number(self) -> u64 {
        match self {
            SchemaVersion::Fresh => 0,
            SchemaVersion::Legacy => 1,
            SchemaVersion::Current => CURRENT_VERSION,
        }
    }

    pub fn from_number(version: u64) -> Result<Self> {
        match version {
            0 => Ok(SchemaVersion::Fresh),
            1 => Ok(SchemaVersion::Legacy),
            CURRENT_VERSION => Ok(SchemaVersion::Current),
            other => Err(StorageError::UnsupportedVersion(other)),
        }
    }

    /// Whether moving to the current version rewrites existing data.
    pub fn requires_rewrite(self) -> bool {
        self == SchemaVersion::Legacy
    }

    /// Applies the migration out of this version and returns the new one.
    fn migrate(self, txn: &WriteTransaction, window: &WindowSpec) -> Result<SchemaVersion> {
        match self {
            SchemaVersion::Fresh => create_roots(txn),
            SchemaVersion::Legacy => rewrite_legacy(txn, window),
            SchemaVersion::Current => Ok(SchemaVersion::Current),
        }
    }
}

pub fn is_reserved(name: &str) -> bool {
    name == METADATA_TABLE.name() || name == POINTS_TABLE.name() || name == ALIASES_TABLE.name()
}

/// Inspects the store without modifying it.
pub fn detect(db: &Database) -> Result<SchemaVersion> {
    let txn = db.begin_read()?;

    match txn.open_table(METADATA_TABLE) {
        Ok(meta) => {
            let version = meta
                .get(VERSION_KEY)?
                .ok_or(StorageError::CorruptMetadata)?
                .value();
            SchemaVersion::from_number(version)
        }
        Err(TableError::TableDoesNotExist(_)) => {
            // Tables without metadata predate versioning.
            if txn.list_tables()?.next().is_some() {
                Ok(SchemaVersion::Legacy)
            } else {
                Ok(SchemaVersion::Fresh)
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Brings the store to the current version. Returns the version found on disk.
pub fn initialize(db: &Database, window: &WindowSpec, allow_rewrite: bool) -> Result<SchemaVersion> {
    let detected = detect(db)?;
    info!("Detected DB schema version {}", detected.number());

    if detected.requires_rewrite() && !allow_rewrite {
        return Err(StorageError::SchemaMismatch {
            detected: detected.number(),
            required: CURRENT_VERSION,
        });
    }

    let txn = db.begin_write()?;
    let mut version = detected;
    while version != SchemaVersion::Current {
        let next = version.migrate(&txn, window)?;
        info!(
            "Migrated DB schema version {} -> {}",
            version.number(),
            next.number()
        );
        version = next;
    }
    check_window_size(&txn, window)?;
    txn.commit()?;

    Ok(detected)
}

fn create_roots(txn: &WriteTransaction) -> Result<SchemaVersion> {
    txn.open_table(POINTS_TABLE)?;
    txn.open_table(ALIASES_TABLE)?;
    let mut meta = txn.open_table(METADATA_TABLE)?;
    meta.insert(VERSION_KEY, CURRENT_VERSION)?;
    Ok(SchemaVersion::Current)
}

fn rewrite_legacy(txn: &WriteTransaction, window: &WindowSpec) -> Result<SchemaVersion> {
    let legacy: Vec<String> = txn
        .list_tables()?
        .map(|handle| handle.name().to_string())
        .filter(|name| !is_reserved(name))
        .collect();

    create_roots(txn)?;

    let mut points = txn.open_table(POINTS_TABLE)?;
    let mut moved = 0usize;

    for name in &legacy {
        let definition: TableDefinition<&[u8], &[u8]> = TableDefinition::new(name);
        {
            let table = txn.open_table(definition)?;
            for entry in table.iter()? {
                let (_, value) = entry?;
                let raw = value.value();
                let point = decode_point(raw)?;
                let key = PointKey::for_point(&point, window)?;
                points.insert(key.encode().as_slice(), raw)?;
                moved += 1;
            }
        }
        txn.delete_table(definition)?;
    }

    info!(
        "Rewrote {} points from {} legacy tables",
        moved,
        legacy.len()
    );
    Ok(SchemaVersion::Current)
}

fn check_window_size(txn: &WriteTransaction, window: &WindowSpec) -> Result<()> {
    let configured = window.size_ns() as u64;
    let mut meta = txn.open_table(METADATA_TABLE)?;
    let stored = meta.get(WINDOW_SIZE_KEY)?.map(|guard| guard.value());

    match stored {
        Some(stored) if stored != configured => {
            Err(StorageError::WindowSizeMismatch { stored, configured })
        }
        Some(_) => Ok(()),
        None => {
            meta.insert(WINDOW_SIZE_KEY, configured)?;
            Ok(())
        }
    }
}
