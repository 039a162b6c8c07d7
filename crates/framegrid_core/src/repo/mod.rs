//! Repository layer over the SQLite association store.
//!
//! # Responsibility
//! - Keep every SQL statement behind use-case oriented traits.
//! - Translate storage failures and missing names into `RepoError`.
//!
//! # Invariants
//! - Name lookups always go through `name_key`, never `LIKE` patterns.
//! - Multi-statement writes run inside one immediate transaction.

use crate::db::DbError;
use crate::model::entity::{name_key, EntityId, EntityKind};
use rusqlite::{Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod assignment_repo;
pub mod catalog_repo;
pub mod dataset_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by catalog, assignment and dataset access.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A name did not resolve to a stored entity.
    NotFound { kind: EntityKind, name: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, name } => write!(f, "{kind} not found: `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Association table and member column linking a process to `kind`.
///
/// Only frames and objects belong to processes.
pub(crate) fn process_link(kind: EntityKind) -> RepoResult<(&'static str, &'static str)> {
    match kind {
        EntityKind::Frame => Ok(("process_frame", "frame_id")),
        EntityKind::Object => Ok(("process_object", "object_id")),
        EntityKind::Process => Err(RepoError::InvalidData(
            "processes cannot be linked to processes".to_string(),
        )),
    }
}

/// Resolves a display name to its id through the canonical key.
pub(crate) fn find_id(
    conn: &Connection,
    kind: EntityKind,
    name: &str,
) -> RepoResult<Option<EntityId>> {
    let id = conn
        .query_row(
            &format!("SELECT id FROM {} WHERE name_key = ?1;", kind.table()),
            [name_key(name)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Like [`find_id`], but a missing row is a `NotFound` error.
pub(crate) fn require_id(
    conn: &Connection,
    kind: EntityKind,
    name: &str,
) -> RepoResult<EntityId> {
    find_id(conn, kind, name)?.ok_or_else(|| RepoError::NotFound {
        kind,
        name: name.to_string(),
    })
}
