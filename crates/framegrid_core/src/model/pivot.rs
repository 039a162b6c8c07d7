//! Pivot grid model: frames as rows, selected objects as columns.
//!
//! # Responsibility
//! - Hold the dense, fixed-shape table rendered by the grid UI.
//! - Parse and edit grid cells without touching storage.
//!
//! # Invariants
//! - The leading column is always `frame` and is not part of `columns`; no
//!   object column may use that id.
//! - Every row has exactly one marker per column.
//! - Frame names are unique within a table, case-insensitively.
//! - Deserialized tables pass the same checks as [`PivotTable::new`].

use crate::model::entity::name_key;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifier of the leading, read-only row identity column.
pub const FRAME_COLUMN: &str = "frame";

/// Displayed text for an assigned cell.
pub const ASSIGNED_MARKER: &str = "✔";
/// Displayed text for an unassigned cell.
pub const UNASSIGNED_MARKER: &str = "✘";
/// Glyph older exports used for unassigned cells; accepted on input only.
const LEGACY_UNASSIGNED_MARKER: &str = "❌";

/// Two-valued cell state of the pivot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    #[serde(rename = "✔")]
    Assigned,
    #[serde(rename = "✘")]
    Unassigned,
}

impl Marker {
    pub fn from_assigned(assigned: bool) -> Self {
        if assigned {
            Self::Assigned
        } else {
            Self::Unassigned
        }
    }

    pub fn is_assigned(self) -> bool {
        matches!(self, Self::Assigned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => ASSIGNED_MARKER,
            Self::Unassigned => UNASSIGNED_MARKER,
        }
    }
}

impl Display for Marker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marker {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            ASSIGNED_MARKER => Ok(Self::Assigned),
            UNASSIGNED_MARKER | LEGACY_UNASSIGNED_MARKER => Ok(Self::Unassigned),
            other => Err(other.to_string()),
        }
    }
}

/// One object column of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotColumn {
    /// Canonical lowercased object name; the column id seen by the grid.
    pub key: String,
    /// Object name as selected by the caller.
    pub label: String,
}

/// One frame row of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotRow {
    pub frame: String,
    /// One marker per column, in column order.
    pub cells: Vec<Marker>,
}

/// A single differing cell between two grid versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    /// Row identity (frame display name).
    pub frame: String,
    /// Column key.
    pub column: String,
    /// Object the column stands for, as labelled in the grid.
    pub object: String,
    pub old: Marker,
    pub new: Marker,
}

/// Two grid tables are not comparable, or a grid edit does not fit the table.
///
/// Raised on caller contract violations; never a recoverable user error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeContractError {
    ColumnMismatch {
        before: Vec<String>,
        after: Vec<String>,
    },
    RowCountMismatch {
        before: usize,
        after: usize,
    },
    MissingRow(String),
    DuplicateRow(String),
    DuplicateColumn(String),
    UnknownColumn(String),
    RowWidth {
        frame: String,
        expected: usize,
        actual: usize,
    },
    InvalidMarker {
        frame: String,
        column: String,
        value: String,
    },
}

impl Display for ShapeContractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnMismatch { before, after } => write!(
                f,
                "grid columns differ: before=[{}] after=[{}]",
                before.join(", "),
                after.join(", ")
            ),
            Self::RowCountMismatch { before, after } => {
                write!(f, "grid row counts differ: before={before} after={after}")
            }
            Self::MissingRow(frame) => write!(f, "frame row `{frame}` missing from grid"),
            Self::DuplicateRow(frame) => write!(f, "frame row `{frame}` appears more than once"),
            Self::DuplicateColumn(column) => {
                write!(f, "column `{column}` appears more than once")
            }
            Self::UnknownColumn(column) => write!(f, "grid has no column `{column}`"),
            Self::RowWidth {
                frame,
                expected,
                actual,
            } => write!(
                f,
                "frame row `{frame}` has {actual} cells, expected {expected}"
            ),
            Self::InvalidMarker {
                frame,
                column,
                value,
            } => write!(
                f,
                "invalid marker `{value}` at frame `{frame}` column `{column}`"
            ),
        }
    }
}

impl Error for ShapeContractError {}

/// Dense frames x objects table for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedPivotTable")]
pub struct PivotTable {
    process: String,
    columns: Vec<PivotColumn>,
    rows: Vec<PivotRow>,
}

/// Wire form of [`PivotTable`] before shape validation.
#[derive(Deserialize)]
struct UncheckedPivotTable {
    process: String,
    columns: Vec<PivotColumn>,
    rows: Vec<PivotRow>,
}

impl TryFrom<UncheckedPivotTable> for PivotTable {
    type Error = ShapeContractError;

    fn try_from(value: UncheckedPivotTable) -> Result<Self, Self::Error> {
        Self::new(value.process, value.columns, value.rows)
    }
}

impl PivotTable {
    /// Assembles a table, rejecting ragged rows, duplicate frames and
    /// column ids that repeat or shadow the `frame` column.
    pub fn new(
        process: impl Into<String>,
        columns: Vec<PivotColumn>,
        rows: Vec<PivotRow>,
    ) -> Result<Self, ShapeContractError> {
        let mut keys = HashSet::with_capacity(columns.len() + 1);
        keys.insert(FRAME_COLUMN);
        if let Some(duplicate) = columns.iter().find(|c| !keys.insert(c.key.as_str())) {
            return Err(ShapeContractError::DuplicateColumn(duplicate.key.clone()));
        }

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if row.cells.len() != columns.len() {
                return Err(ShapeContractError::RowWidth {
                    frame: row.frame.clone(),
                    expected: columns.len(),
                    actual: row.cells.len(),
                });
            }
            if !seen.insert(name_key(&row.frame)) {
                return Err(ShapeContractError::DuplicateRow(row.frame.clone()));
            }
        }

        Ok(Self {
            process: process.into(),
            columns,
            rows,
        })
    }

    /// Rebuilds an edited grid from the raw strings a grid UI sends back.
    ///
    /// `columns` must be the column definitions of the table that was
    /// rendered; each raw row is `[frame, cell, cell, ...]`.
    pub fn from_grid(
        process: impl Into<String>,
        columns: Vec<PivotColumn>,
        raw_rows: &[Vec<String>],
    ) -> Result<Self, ShapeContractError> {
        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let Some((frame, values)) = raw.split_first() else {
                return Err(ShapeContractError::RowWidth {
                    frame: String::new(),
                    expected: columns.len() + 1,
                    actual: 0,
                });
            };
            if values.len() != columns.len() {
                return Err(ShapeContractError::RowWidth {
                    frame: frame.clone(),
                    expected: columns.len(),
                    actual: values.len(),
                });
            }

            let cells = values
                .iter()
                .zip(&columns)
                .map(|(value, column)| {
                    value
                        .parse::<Marker>()
                        .map_err(|value| ShapeContractError::InvalidMarker {
                            frame: frame.clone(),
                            column: column.key.clone(),
                            value,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(PivotRow {
                frame: frame.clone(),
                cells,
            });
        }

        Self::new(process, columns, rows)
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn columns(&self) -> &[PivotColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[PivotRow] {
        &self.rows
    }

    /// Column keys in display order.
    pub fn column_keys(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.key.as_str()).collect()
    }

    /// Full header row: `frame` followed by every column key.
    pub fn header(&self) -> Vec<&str> {
        std::iter::once(FRAME_COLUMN)
            .chain(self.columns.iter().map(|c| c.key.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up one cell by frame name (any case) and column key.
    pub fn cell(&self, frame: &str, column: &str) -> Option<Marker> {
        let column_idx = self.column_index(column)?;
        let row_idx = self.row_index(frame)?;
        Some(self.rows[row_idx].cells[column_idx])
    }

    /// Overwrites one cell, as a grid UI commit would.
    pub fn set_cell(
        &mut self,
        frame: &str,
        column: &str,
        marker: Marker,
    ) -> Result<(), ShapeContractError> {
        let column_idx = self
            .column_index(column)
            .ok_or_else(|| ShapeContractError::UnknownColumn(column.to_string()))?;
        let row_idx = self
            .row_index(frame)
            .ok_or_else(|| ShapeContractError::MissingRow(frame.to_string()))?;
        self.rows[row_idx].cells[column_idx] = marker;
        Ok(())
    }

    /// Rows as `column id -> displayed text` maps, the shape grid widgets bind to.
    pub fn records(&self) -> Vec<BTreeMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = BTreeMap::new();
                record.insert(FRAME_COLUMN.to_string(), row.frame.clone());
                for (column, marker) in self.columns.iter().zip(&row.cells) {
                    record.insert(column.key.clone(), marker.as_str().to_string());
                }
                record
            })
            .collect()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == column)
    }

    fn row_index(&self, frame: &str) -> Option<usize> {
        let wanted = name_key(frame);
        self.rows.iter().position(|row| name_key(&row.frame) == wanted)
    }
}
