//! Catalog repository: named entities and their process membership.
//!
//! # Responsibility
//! - Lookup-or-create processes, frames and objects by name.
//! - Link frames and objects to processes.
//!
//! # Invariants
//! - Creation is idempotent per `name_key`; an existing row keeps its
//!   original display casing.
//! - Links are insert-if-absent; re-linking is a no-op.
//! - Member listings are sorted by `name_key ASC, name ASC`.

use crate::model::entity::{name_key, EntityId, EntityKind, NamedEntity};
use crate::repo::{find_id, process_link, require_id, RepoResult};
use rusqlite::{params, Connection, TransactionBehavior};

/// Result of a lookup-or-create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityUpsert {
    pub id: EntityId,
    /// `false` when a row with the same canonical name already existed.
    pub created: bool,
}

/// Result of attaching a frame or object to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipOutcome {
    pub process_id: EntityId,
    pub member: EntityUpsert,
    /// `false` when the link was already present.
    pub linked: bool,
}

/// Repository interface for entity and membership management.
pub trait CatalogRepository {
    /// Resolves one entity by case-insensitive name.
    fn find_entity(&self, kind: EntityKind, name: &str) -> RepoResult<Option<NamedEntity>>;
    /// Lists every entity of `kind`, sorted by name.
    fn list_entities(&self, kind: EntityKind) -> RepoResult<Vec<NamedEntity>>;
    /// Lists frames or objects linked to a process, sorted by name.
    fn process_members(
        &self,
        process_id: EntityId,
        kind: EntityKind,
    ) -> RepoResult<Vec<NamedEntity>>;
    /// Returns the id for `name`, inserting a row if none exists.
    fn get_or_create(&mut self, kind: EntityKind, name: &str) -> RepoResult<EntityUpsert>;
    /// Lookup-or-creates a member and links it to an existing process, atomically.
    fn attach_to_process(
        &mut self,
        process_name: &str,
        kind: EntityKind,
        member_name: &str,
    ) -> RepoResult<MembershipOutcome>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn find_entity(&self, kind: EntityKind, name: &str) -> RepoResult<Option<NamedEntity>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name FROM {} WHERE name_key = ?1;",
            kind.table()
        ))?;
        let mut rows = stmt.query([name_key(name)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(NamedEntity {
                id: row.get(0)?,
                name: row.get(1)?,
            }));
        }
        Ok(None)
    }

    fn list_entities(&self, kind: EntityKind) -> RepoResult<Vec<NamedEntity>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, name FROM {} ORDER BY name_key ASC, name ASC;",
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

    fn process_members(
        &self,
        process_id: EntityId,
        kind: EntityKind,
    ) -> RepoResult<Vec<NamedEntity>> {
        let (link_table, member_column) = process_link(kind)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT e.id, e.name
             FROM {link_table} l
             INNER JOIN {table} e ON e.id = l.{member_column}
             WHERE l.process_id = ?1
             ORDER BY e.name_key ASC, e.name ASC;",
            table = kind.table(),
        ))?;
        let rows = stmt.query_map([process_id], |row| {
            Ok(NamedEntity {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let entities = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    fn get_or_create(&mut self, kind: EntityKind, name: &str) -> RepoResult<EntityUpsert> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let upsert = upsert_entity(&tx, kind, name)?;
        tx.commit()?;
        Ok(upsert)
    }

    fn attach_to_process(
        &mut self,
        process_name: &str,
        kind: EntityKind,
        member_name: &str,
    ) -> RepoResult<MembershipOutcome> {
        let (link_table, member_column) = process_link(kind)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let process_id = require_id(&tx, EntityKind::Process, process_name)?;
        let member = upsert_entity(&tx, kind, member_name)?;
        let inserted = tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {link_table} (process_id, {member_column}) VALUES (?1, ?2);"
            ),
            params![process_id, member.id],
        )?;

        tx.commit()?;
        Ok(MembershipOutcome {
            process_id,
            member,
            linked: inserted == 1,
        })
    }
}

fn upsert_entity(conn: &Connection, kind: EntityKind, name: &str) -> RepoResult<EntityUpsert> {
    if let Some(id) = find_id(conn, kind, name)? {
        return Ok(EntityUpsert { id, created: false });
    }

    conn.execute(
        &format!(
            "INSERT INTO {} (name, name_key) VALUES (?1, ?2);",
            kind.table()
        ),
        params![name.trim(), name_key(name)],
    )?;
    Ok(EntityUpsert {
        id: conn.last_insert_rowid(),
        created: true,
    })
}
