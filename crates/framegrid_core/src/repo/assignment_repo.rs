//! Frame/object assignment repository.
//!
//! # Responsibility
//! - Read process-scoped assignment triples for pivoting.
//! - Apply single-cell assignment writes idempotently.
//! - Read per-frame assigned object lists for export.
//!
//! # Invariants
//! - Scoped reads only pair frames and objects linked to the same process.
//! - `apply_cell` resolves and writes inside one immediate transaction, so a
//!   failed cell leaves nothing behind.
//! - Writes never fail on an already-present or already-absent row.

use crate::model::entity::{EntityId, EntityKind};
use crate::model::pivot::Marker;
use crate::repo::{find_id, require_id, RepoResult};
use rusqlite::{params, Connection, TransactionBehavior};

/// One `(frame, object, assigned)` fact within a process scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTriple {
    pub frame: String,
    pub object: String,
    pub assigned: bool,
}

/// What a single-cell write actually did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellWrite {
    Inserted,
    AlreadyAssigned,
    Deleted,
    AlreadyUnassigned,
}

/// Assigned objects of one frame, sorted by object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameAssignments {
    pub frame_id: EntityId,
    pub frame_name: String,
    pub objects: Vec<String>,
}

/// Repository interface for the `frame_object` relation.
pub trait AssignmentRepository {
    /// Resolves a process by case-insensitive name.
    fn find_process(&self, name: &str) -> RepoResult<Option<EntityId>>;
    /// Display names of the objects linked to a process, sorted by name.
    fn process_objects(&self, process_id: EntityId) -> RepoResult<Vec<String>>;
    /// Display names of the frames linked to a process, sorted by name.
    fn process_frames(&self, process_id: EntityId) -> RepoResult<Vec<String>>;
    /// Every frame x in-scope object pair of a process with its assignment bit.
    fn scoped_assignments(&self, process_id: EntityId) -> RepoResult<Vec<AssignmentTriple>>;
    /// Frames of a process that have at least one assigned object.
    fn assignments_by_frame(&self, process_id: EntityId) -> RepoResult<Vec<FrameAssignments>>;
    /// Makes the store match `marker` for one frame/object pair.
    fn apply_cell(
        &mut self,
        frame_name: &str,
        object_name: &str,
        marker: Marker,
    ) -> RepoResult<CellWrite>;
}

/// SQLite-backed assignment repository.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl AssignmentRepository for SqliteAssignmentRepository<'_> {
    fn find_process(&self, name: &str) -> RepoResult<Option<EntityId>> {
        find_id(self.conn, EntityKind::Process, name)
    }

    fn process_objects(&self, process_id: EntityId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT o.name
             FROM process_object po
             INNER JOIN object o ON o.id = po.object_id
             WHERE po.process_id = ?1
             ORDER BY o.name_key ASC, o.name ASC;",
        )?;
        let rows = stmt.query_map([process_id], |row| row.get::<_, String>(0))?;
        let objects = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(objects)
    }

    fn process_frames(&self, process_id: EntityId) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.name
             FROM process_frame pf
             INNER JOIN frame f ON f.id = pf.frame_id
             WHERE pf.process_id = ?1
             ORDER BY f.name_key ASC, f.name ASC;",
        )?;
        let rows = stmt.query_map([process_id], |row| row.get::<_, String>(0))?;
        let frames = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(frames)
    }

    fn scoped_assignments(&self, process_id: EntityId) -> RepoResult<Vec<AssignmentTriple>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                f.name,
                o.name,
                EXISTS(
                    SELECT 1
                    FROM frame_object fo
                    WHERE fo.frame_id = f.id
                      AND fo.object_id = o.id
                ) AS assigned
             FROM process_frame pf
             INNER JOIN frame f ON f.id = pf.frame_id
             INNER JOIN process_object po ON po.process_id = pf.process_id
             INNER JOIN object o ON o.id = po.object_id
             WHERE pf.process_id = ?1
             ORDER BY f.name_key ASC, o.name_key ASC;",
        )?;
        let rows = stmt.query_map([process_id], |row| {
            Ok(AssignmentTriple {
                frame: row.get(0)?,
                object: row.get(1)?,
                assigned: row.get::<_, i64>(2)? == 1,
            })
        })?;
        let triples = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(triples)
    }

    fn assignments_by_frame(&self, process_id: EntityId) -> RepoResult<Vec<FrameAssignments>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.name, o.name
             FROM process_frame pf
             INNER JOIN frame f ON f.id = pf.frame_id
             INNER JOIN frame_object fo ON fo.frame_id = f.id
             INNER JOIN object o ON o.id = fo.object_id
             WHERE pf.process_id = ?1
             ORDER BY f.name_key ASC, f.id ASC, o.name_key ASC, o.name ASC;",
        )?;
        let mut rows = stmt.query([process_id])?;
        let mut frames: Vec<FrameAssignments> = Vec::new();
        while let Some(row) = rows.next()? {
            let frame_id: EntityId = row.get(0)?;
            let object: String = row.get(2)?;
            if let Some(current) = frames.last_mut().filter(|f| f.frame_id == frame_id) {
                current.objects.push(object);
                continue;
            }
            frames.push(FrameAssignments {
                frame_id,
                frame_name: row.get(1)?,
                objects: vec![object],
            });
        }
        Ok(frames)
    }

    fn apply_cell(
        &mut self,
        frame_name: &str,
        object_name: &str,
        marker: Marker,
    ) -> RepoResult<CellWrite> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let frame_id = require_id(&tx, EntityKind::Frame, frame_name)?;
        let object_id = require_id(&tx, EntityKind::Object, object_name)?;

        let write = match marker {
            Marker::Assigned => {
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO frame_object (frame_id, object_id) VALUES (?1, ?2);",
                    params![frame_id, object_id],
                )?;
                if inserted == 1 {
                    CellWrite::Inserted
                } else {
                    CellWrite::AlreadyAssigned
                }
            }
            Marker::Unassigned => {
                let deleted = tx.execute(
                    "DELETE FROM frame_object WHERE frame_id = ?1 AND object_id = ?2;",
                    params![frame_id, object_id],
                )?;
                if deleted == 1 {
                    CellWrite::Deleted
                } else {
                    CellWrite::AlreadyUnassigned
                }
            }
        };

        tx.commit()?;
        Ok(write)
    }
}
