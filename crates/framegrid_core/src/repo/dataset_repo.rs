//! Whole-dataset repository for bulk transfer.
//!
//! # Responsibility
//! - Snapshot all six tables.
//! - Replace all six tables wholesale.
//!
//! # Invariants
//! - `replace_dataset` is all-or-nothing: erase and reload share one
//!   immediate transaction, so a failed load leaves the previous data intact.
//! - Entities are loaded before the associations that reference them.
//! - Callers must serialize replacement against every other store access.

use crate::model::dataset::{Dataset, DatasetCounts, LinkRow, LinkTable};
use crate::model::entity::{name_key, EntityKind, NamedEntity};
use crate::repo::RepoResult;
use log::info;
use rusqlite::{params, Connection, TransactionBehavior};
use std::time::Instant;

const ENTITY_KINDS: [EntityKind; 3] = [EntityKind::Process, EntityKind::Frame, EntityKind::Object];

/// Repository interface for whole-dataset reads and replacement.
pub trait DatasetRepository {
    fn load_dataset(&self) -> RepoResult<Dataset>;
    fn table_counts(&self) -> RepoResult<DatasetCounts>;
    /// Erases every row and loads `dataset`; returns the loaded counts.
    fn replace_dataset(&mut self, dataset: &Dataset) -> RepoResult<DatasetCounts>;
}

/// SQLite-backed dataset repository.
pub struct SqliteDatasetRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteDatasetRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl DatasetRepository for SqliteDatasetRepository<'_> {
    fn load_dataset(&self) -> RepoResult<Dataset> {
        Ok(Dataset {
            processes: load_entities(self.conn, EntityKind::Process)?,
            frames: load_entities(self.conn, EntityKind::Frame)?,
            objects: load_entities(self.conn, EntityKind::Object)?,
            process_frames: load_links(self.conn, LinkTable::ProcessFrame)?,
            process_objects: load_links(self.conn, LinkTable::ProcessObject)?,
            frame_objects: load_links(self.conn, LinkTable::FrameObject)?,
        })
    }

    fn table_counts(&self) -> RepoResult<DatasetCounts> {
        let count = |table: &str| -> RepoResult<usize> {
            let value: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
                        row.get(0)
                    })?;
            Ok(usize::try_from(value).unwrap_or_default())
        };

        Ok(DatasetCounts {
            processes: count(EntityKind::Process.table())?,
            frames: count(EntityKind::Frame.table())?,
            objects: count(EntityKind::Object.table())?,
            process_frames: count(LinkTable::ProcessFrame.table())?,
            process_objects: count(LinkTable::ProcessObject.table())?,
            frame_objects: count(LinkTable::FrameObject.table())?,
        })
    }

    fn replace_dataset(&mut self, dataset: &Dataset) -> RepoResult<DatasetCounts> {
        let started_at = Instant::now();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        for table in LinkTable::ALL {
            tx.execute(&format!("DELETE FROM {};", table.table()), [])?;
        }
        for kind in ENTITY_KINDS {
            tx.execute(&format!("DELETE FROM {};", kind.table()), [])?;
        }

        insert_entities(&tx, EntityKind::Process, &dataset.processes)?;
        insert_entities(&tx, EntityKind::Frame, &dataset.frames)?;
        insert_entities(&tx, EntityKind::Object, &dataset.objects)?;
        for table in LinkTable::ALL {
            insert_links(&tx, table, dataset.links(table))?;
        }

        tx.commit()?;

        let counts = dataset.counts();
        info!(
            "event=dataset_replace module=repo status=ok duration_ms={} processes={} frames={} objects={} frame_objects={}",
            started_at.elapsed().as_millis(),
            counts.processes,
            counts.frames,
            counts.objects,
            counts.frame_objects
        );
        Ok(counts)
    }
}

fn load_entities(conn: &Connection, kind: EntityKind) -> RepoResult<Vec<NamedEntity>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name FROM {} ORDER BY id ASC;",
        kind.table()
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(NamedEntity {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    let entities = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(entities)
}

fn load_links(conn: &Connection, table: LinkTable) -> RepoResult<Vec<LinkRow>> {
    let (left, right) = table.columns();
    let mut stmt = conn.prepare(&format!(
        "SELECT {left}, {right} FROM {} ORDER BY {left} ASC, {right} ASC;",
        table.table()
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(LinkRow {
            left: row.get(0)?,
            right: row.get(1)?,
        })
    })?;
    let links = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(links)
}

fn insert_entities(conn: &Connection, kind: EntityKind, entities: &[NamedEntity]) -> RepoResult<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} (id, name, name_key) VALUES (?1, ?2, ?3);",
        kind.table()
    ))?;
    for entity in entities {
        stmt.execute(params![entity.id, entity.name.trim(), name_key(&entity.name)])?;
    }
    Ok(())
}

fn insert_links(conn: &Connection, table: LinkTable, links: &[LinkRow]) -> RepoResult<()> {
    let (left, right) = table.columns();
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {} ({left}, {right}) VALUES (?1, ?2);",
        table.table()
    ))?;
    for link in links {
        stmt.execute(params![link.left, link.right])?;
    }
    Ok(())
}
