//! Catalog use-case service: processes and their frames/objects.
//!
//! # Invariants
//! - Names are trimmed; blank names are rejected before storage is touched.
//! - Attaching to an unknown process aborts the whole operation.

use crate::model::entity::{normalize_display_name, EntityKind, NamedEntity};
use crate::repo::catalog_repo::{CatalogRepository, EntityUpsert, MembershipOutcome};
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for catalog use-cases.
#[derive(Debug)]
pub enum CatalogError {
    /// Name is empty after trimming.
    InvalidName(EntityKind),
    /// Referenced process does not exist.
    ProcessNotFound(String),
    Repo(RepoError),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(kind) => write!(f, "{kind} name cannot be blank"),
            Self::ProcessNotFound(name) => write!(f, "process not found: `{name}`"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CatalogError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                kind: EntityKind::Process,
                name,
            } => Self::ProcessNotFound(name),
            other => Self::Repo(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog facade over a repository implementation.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lookup-or-creates a process.
    pub fn add_process(&mut self, name: &str) -> CatalogResult<EntityUpsert> {
        let name = require_name(EntityKind::Process, name)?;
        let upsert = self.repo.get_or_create(EntityKind::Process, &name)?;
        if upsert.created {
            info!(
                "event=process_add module=catalog status=ok process_id={}",
                upsert.id
            );
        }
        Ok(upsert)
    }

    /// Makes `object` selectable for `process`, creating the object if needed.
    pub fn add_object_to_process(
        &mut self,
        process: &str,
        object: &str,
    ) -> CatalogResult<MembershipOutcome> {
        self.attach(process, EntityKind::Object, object)
    }

    /// Adds `frame` as a pivot row of `process`, creating the frame if needed.
    pub fn add_frame_to_process(
        &mut self,
        process: &str,
        frame: &str,
    ) -> CatalogResult<MembershipOutcome> {
        self.attach(process, EntityKind::Frame, frame)
    }

    pub fn list_processes(&self) -> CatalogResult<Vec<NamedEntity>> {
        Ok(self.repo.list_entities(EntityKind::Process)?)
    }

    pub fn objects_for_process(&self, process: &str) -> CatalogResult<Vec<NamedEntity>> {
        self.members(process, EntityKind::Object)
    }

    pub fn frames_for_process(&self, process: &str) -> CatalogResult<Vec<NamedEntity>> {
        self.members(process, EntityKind::Frame)
    }

    fn attach(
        &mut self,
        process: &str,
        kind: EntityKind,
        member: &str,
    ) -> CatalogResult<MembershipOutcome> {
        let process = require_name(EntityKind::Process, process)?;
        let member = require_name(kind, member)?;
        let outcome = self.repo.attach_to_process(&process, kind, &member)?;
        info!(
            "event=process_attach module=catalog status=ok kind={kind} process_id={} member_id={} created={} linked={}",
            outcome.process_id, outcome.member.id, outcome.member.created, outcome.linked
        );
        Ok(outcome)
    }

    fn members(&self, process: &str, kind: EntityKind) -> CatalogResult<Vec<NamedEntity>> {
        let entity = self
            .repo
            .find_entity(EntityKind::Process, process)?
            .ok_or_else(|| CatalogError::ProcessNotFound(process.to_string()))?;
        Ok(self.repo.process_members(entity.id, kind)?)
    }
}

fn require_name(kind: EntityKind, name: &str) -> CatalogResult<String> {
    normalize_display_name(name).ok_or(CatalogError::InvalidName(kind))
}
