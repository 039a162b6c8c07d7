//! Sync applier: persists grid cell changes as assignment writes.
//!
//! # Responsibility
//! - Turn each [`CellChange`] into one idempotent insert-or-delete, resolving
//!   the object by its column label rather than the column key.
//! - Report per-cell outcomes and failures.
//!
//! # Invariants
//! - Each cell is resolved and written in its own transaction.
//! - A failing cell never stops the remaining cells from being applied.
//! - Re-applying a change is a no-op, never an error.

use crate::model::entity::EntityKind;
use crate::model::pivot::CellChange;
use crate::repo::assignment_repo::{AssignmentRepository, CellWrite};
use crate::repo::RepoError;
use log::{info, warn};

/// One change that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub change: CellChange,
    pub write: CellWrite,
}

/// One change that could not be applied, with its cause.
#[derive(Debug)]
pub struct SyncFailure {
    pub change: CellChange,
    pub error: RepoError,
}

impl SyncFailure {
    /// Entity kind whose name failed to resolve, if that was the cause.
    pub fn unresolved_kind(&self) -> Option<EntityKind> {
        match &self.error {
            RepoError::NotFound { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Outcome of one sync batch.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub applied: Vec<AppliedChange>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of writes that actually changed stored rows.
    pub fn rows_changed(&self) -> usize {
        self.applied
            .iter()
            .filter(|a| matches!(a.write, CellWrite::Inserted | CellWrite::Deleted))
            .count()
    }
}

/// Write-side service for grid edits.
pub struct SyncService<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> SyncService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn apply(&mut self, changes: &[CellChange]) -> SyncReport {
        sync_changes(&mut self.repo, changes)
    }
}

/// Applies `changes` one cell at a time against any assignment repository.
pub fn sync_changes<R: AssignmentRepository + ?Sized>(
    repo: &mut R,
    changes: &[CellChange],
) -> SyncReport {
    let mut report = SyncReport::default();

    for change in changes {
        match repo.apply_cell(&change.frame, &change.object, change.new) {
            Ok(write) => report.applied.push(AppliedChange {
                change: change.clone(),
                write,
            }),
            Err(error) => {
                warn!(
                    "event=grid_sync module=sync status=error frame={:?} column={} error={error}",
                    change.frame, change.column
                );
                report.failures.push(SyncFailure {
                    change: change.clone(),
                    error,
                });
            }
        }
    }

    info!(
        "event=grid_sync module=sync status={} changes={} rows_changed={} failures={}",
        if report.is_clean() { "ok" } else { "partial" },
        changes.len(),
        report.rows_changed(),
        report.failures.len()
    );
    report
}
