//! Cell-level diff between two renderings of the same pivot grid.
//!
//! # Invariants
//! - Every differing cell is reported exactly once; equal cells never are.
//! - Tables that are not the same shape are a contract violation and fail
//!   with [`ShapeContractError`] instead of being partially compared.

use crate::model::pivot::{CellChange, PivotTable, ShapeContractError};
use std::collections::{BTreeSet, HashMap};

/// Compares `before` (last snapshot) with `after` (edited grid).
///
/// Rows are matched by frame name and columns by key, so the order of rows
/// and columns in `after` does not matter. Output follows `before` order.
pub fn diff_tables(
    before: &PivotTable,
    after: &PivotTable,
) -> Result<Vec<CellChange>, ShapeContractError> {
    let before_keys: BTreeSet<&str> = before.column_keys().into_iter().collect();
    let after_keys: BTreeSet<&str> = after.column_keys().into_iter().collect();
    if before_keys != after_keys || before.columns().len() != after.columns().len() {
        return Err(ShapeContractError::ColumnMismatch {
            before: before.column_keys().into_iter().map(str::to_string).collect(),
            after: after.column_keys().into_iter().map(str::to_string).collect(),
        });
    }

    if before.rows().len() != after.rows().len() {
        return Err(ShapeContractError::RowCountMismatch {
            before: before.rows().len(),
            after: after.rows().len(),
        });
    }

    let after_column_idx: HashMap<&str, usize> = after
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.key.as_str(), idx))
        .collect();
    let after_rows: HashMap<&str, _> = after
        .rows()
        .iter()
        .map(|row| (row.frame.as_str(), row))
        .collect();

    let mut changes = Vec::new();
    for row in before.rows() {
        let after_row = after_rows
            .get(row.frame.as_str())
            .ok_or_else(|| ShapeContractError::MissingRow(row.frame.clone()))?;

        for (column, &old) in before.columns().iter().zip(&row.cells) {
            let new = after_row.cells[after_column_idx[column.key.as_str()]];
            if old != new {
                changes.push(CellChange {
                    frame: row.frame.clone(),
                    column: column.key.clone(),
                    object: column.label.clone(),
                    old,
                    new,
                });
            }
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::diff_tables;
    use crate::model::pivot::{Marker, PivotColumn, PivotRow, PivotTable, ShapeContractError};

    fn table(columns: &[&str], rows: &[(&str, &[Marker])]) -> PivotTable {
        PivotTable::new(
            "P",
            columns
                .iter()
                .map(|name| PivotColumn {
                    key: name.to_string(),
                    label: name.to_string(),
                })
                .collect(),
            rows.iter()
                .map(|(frame, cells)| PivotRow {
                    frame: frame.to_string(),
                    cells: cells.to_vec(),
                })
                .collect(),
        )
        .unwrap()
    }

    use Marker::{Assigned as Y, Unassigned as N};

    #[test]
    fn identical_tables_have_no_changes() {
        let before = table(&["a", "b"], &[("F1", &[Y, N]), ("F2", &[N, N])]);
        assert!(diff_tables(&before, &before.clone()).unwrap().is_empty());
    }

    #[test]
    fn reordered_rows_and_columns_are_matched_by_identity() {
        let before = table(&["a", "b"], &[("F1", &[Y, N]), ("F2", &[N, N])]);
        let after = table(&["b", "a"], &[("F2", &[Y, N]), ("F1", &[N, Y])]);

        let changes = diff_tables(&before, &after).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].frame, "F2");
        assert_eq!(changes[0].column, "b");
        assert_eq!((changes[0].old, changes[0].new), (N, Y));
    }

    #[test]
    fn column_mismatch_fails_loudly() {
        let before = table(&["a"], &[("F1", &[Y])]);
        let after = table(&["z"], &[("F1", &[Y])]);
        assert!(matches!(
            diff_tables(&before, &after),
            Err(ShapeContractError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn renamed_frame_fails_loudly() {
        let before = table(&["a"], &[("F1", &[Y])]);
        let after = table(&["a"], &[("F9", &[Y])]);
        assert_eq!(
            diff_tables(&before, &after),
            Err(ShapeContractError::MissingRow("F1".to_string()))
        );
    }

    #[test]
    fn row_count_mismatch_fails_loudly() {
        let before = table(&["a"], &[("F1", &[Y])]);
        let after = table(&["a"], &[("F1", &[Y]), ("F2", &[N])]);
        assert!(matches!(
            diff_tables(&before, &after),
            Err(ShapeContractError::RowCountMismatch { before: 1, after: 2 })
        ));
    }
}
