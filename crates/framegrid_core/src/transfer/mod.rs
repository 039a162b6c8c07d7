//! Bulk transfer: workbook export and destructive import.
//!
//! # Responsibility
//! - Move the whole dataset between the store and workbook files.
//! - Validate imported workbooks completely before mutating storage.
//!
//! # Invariants
//! - Validation failures never touch storage.
//! - Import replaces all six tables in one transaction; callers must keep
//!   every other reader/editor away from the store while it runs.

use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod export;
pub mod import;
pub mod workbook;

pub type TransferResult<T> = Result<T, TransferError>;

/// A workbook is not acceptable as import input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingSheet(String),
    MissingColumn {
        sheet: String,
        column: String,
    },
    /// `row` is the 1-based spreadsheet line, header included.
    InvalidInteger {
        sheet: String,
        row: usize,
        column: String,
        value: String,
    },
    BlankName {
        sheet: String,
        row: usize,
    },
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSheet(sheet) => write!(f, "missing required sheet `{sheet}`"),
            Self::MissingColumn { sheet, column } => {
                write!(f, "missing required column `{column}` in sheet `{sheet}`")
            }
            Self::InvalidInteger {
                sheet,
                row,
                column,
                value,
            } => write!(
                f,
                "sheet `{sheet}` row {row}: `{column}` must be an integer, got `{value}`"
            ),
            Self::BlankName { sheet, row } => {
                write!(f, "sheet `{sheet}` row {row}: `name` cannot be blank")
            }
        }
    }
}

impl Error for ValidationIssue {}

/// Error from a bulk export or import.
#[derive(Debug)]
pub enum TransferError {
    Validation(ValidationIssue),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
    Repo(RepoError),
}

impl Display for TransferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(issue) => write!(f, "invalid workbook: {issue}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Csv { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(issue) => Some(issue),
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ValidationIssue> for TransferError {
    fn from(value: ValidationIssue) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TransferError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
