//! One user's edit cycle over a pivot grid.
//!
//! # Responsibility
//! - Remember the process, column selection and last rendered snapshot.
//! - Run diff, then sync, then rebuild for every grid commit.
//!
//! # Invariants
//! - The snapshot is always rebuilt from storage after a commit, so it
//!   reflects other editors' writes and any failed cells.

use crate::model::pivot::{CellChange, PivotTable, ShapeContractError};
use crate::repo::assignment_repo::AssignmentRepository;
use crate::service::diff_engine::diff_tables;
use crate::service::pivot_service::{build_pivot, PivotError};
use crate::service::sync_service::{sync_changes, SyncReport};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error from a grid commit.
#[derive(Debug)]
pub enum GridError {
    /// The edited grid does not match the rendered one.
    Shape(ShapeContractError),
    /// Rebuilding the view failed.
    Pivot(PivotError),
}

impl Display for GridError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape(err) => write!(f, "{err}"),
            Self::Pivot(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GridError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Shape(err) => Some(err),
            Self::Pivot(err) => Some(err),
        }
    }
}

impl From<ShapeContractError> for GridError {
    fn from(value: ShapeContractError) -> Self {
        Self::Shape(value)
    }
}

impl From<PivotError> for GridError {
    fn from(value: PivotError) -> Self {
        Self::Pivot(value)
    }
}

/// Result of one commit.
#[derive(Debug)]
pub struct CommitOutcome {
    pub changes: Vec<CellChange>,
    pub report: SyncReport,
}

/// Edit session for one process and column selection.
pub struct GridSession<R: AssignmentRepository> {
    repo: R,
    process: String,
    selection: Vec<String>,
    snapshot: PivotTable,
}

impl<R: AssignmentRepository> GridSession<R> {
    /// Builds the initial view.
    pub fn open(repo: R, process: &str, selection: Vec<String>) -> Result<Self, PivotError> {
        let snapshot = build_pivot(&repo, process, &selection)?;
        Ok(Self {
            repo,
            process: process.to_string(),
            selection,
            snapshot,
        })
    }

    /// The last-known grid, as it should be rendered.
    pub fn snapshot(&self) -> &PivotTable {
        &self.snapshot
    }

    /// Re-queries storage without applying anything.
    pub fn refresh(&mut self) -> Result<&PivotTable, PivotError> {
        self.snapshot = build_pivot(&self.repo, &self.process, &self.selection)?;
        Ok(&self.snapshot)
    }

    /// Persists every cell that differs between the snapshot and `edited`.
    pub fn commit(&mut self, edited: &PivotTable) -> Result<CommitOutcome, GridError> {
        let changes = diff_tables(&self.snapshot, edited)?;
        let report = sync_changes(&mut self.repo, &changes);
        self.refresh()?;
        Ok(CommitOutcome { changes, report })
    }

    /// Like [`GridSession::commit`], for the raw rows a grid widget emits.
    pub fn commit_grid(&mut self, raw_rows: &[Vec<String>]) -> Result<CommitOutcome, GridError> {
        let edited = PivotTable::from_grid(
            self.snapshot.process(),
            self.snapshot.columns().to_vec(),
            raw_rows,
        )?;
        self.commit(&edited)
    }

    pub fn into_repo(self) -> R {
        self.repo
    }
}
