//! Pivot builder: scoped assignment triples to a dense frames x objects grid.
//!
//! # Responsibility
//! - Fetch process-scoped `(frame, object, assigned)` triples.
//! - Pivot them in application code into a fixed-shape [`PivotTable`].
//!
//! # Invariants
//! - Rows are exactly the process's frames, sorted by name.
//! - Columns are exactly the caller's selection, in caller order, after the
//!   leading `frame` column. An object whose key would shadow `frame` gets a
//!   suffixed column id.
//! - A cell is assigned exactly when its `frame_object` row exists, whether
//!   or not the object belongs to the process.
//! - Object names are never spliced into SQL; any text is a valid column.

use crate::model::entity::{name_key, EntityId};
use crate::model::pivot::{
    Marker, PivotColumn, PivotRow, PivotTable, ShapeContractError, FRAME_COLUMN,
};
use crate::repo::assignment_repo::{AssignmentRepository, AssignmentTriple};
use crate::repo::RepoError;
use log::{debug, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How many objects a fresh grid shows before the user narrows the selection.
pub const DEFAULT_SELECTION_LIMIT: usize = 10;

/// Error while building a pivot view.
#[derive(Debug)]
pub enum PivotError {
    ProcessNotFound(String),
    Repo(RepoError),
    Shape(ShapeContractError),
}

impl Display for PivotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProcessNotFound(name) => write!(f, "process not found: `{name}`"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Shape(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PivotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ProcessNotFound(_) => None,
            Self::Repo(err) => Some(err),
            Self::Shape(err) => Some(err),
        }
    }
}

impl From<RepoError> for PivotError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ShapeContractError> for PivotError {
    fn from(value: ShapeContractError) -> Self {
        Self::Shape(value)
    }
}

/// Read-side service for the pivot grid.
pub struct PivotService<R: AssignmentRepository> {
    repo: R,
}

impl<R: AssignmentRepository> PivotService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Builds the grid for `process` with `selection` as columns.
    pub fn build(&self, process: &str, selection: &[String]) -> Result<PivotTable, PivotError> {
        build_pivot(&self.repo, process, selection)
    }

    /// Objects the user may pick as columns for `process`, sorted by name.
    pub fn available_objects(&self, process: &str) -> Result<Vec<String>, PivotError> {
        let process_id = resolve_process(&self.repo, process)?;
        Ok(self.repo.process_objects(process_id)?)
    }

    /// The first [`DEFAULT_SELECTION_LIMIT`] available objects.
    pub fn default_selection(&self, process: &str) -> Result<Vec<String>, PivotError> {
        let mut objects = self.available_objects(process)?;
        objects.truncate(DEFAULT_SELECTION_LIMIT);
        Ok(objects)
    }
}

/// Builds a pivot grid from any assignment repository.
pub fn build_pivot<R: AssignmentRepository + ?Sized>(
    repo: &R,
    process: &str,
    selection: &[String],
) -> Result<PivotTable, PivotError> {
    let process_id = resolve_process(repo, process)?;
    let frames = repo.process_frames(process_id)?;
    let mut triples = repo.scoped_assignments(process_id)?;

    let in_scope: HashSet<String> = repo
        .process_objects(process_id)?
        .iter()
        .map(|name| name_key(name))
        .collect();
    let columns = selection_columns(selection);
    let out_of_scope: HashSet<String> = columns
        .iter()
        .map(|c| name_key(&c.label))
        .filter(|key| !in_scope.contains(key))
        .collect();
    if !out_of_scope.is_empty() {
        for key in &out_of_scope {
            warn!(
                "event=pivot_build module=pivot status=warn process_id={process_id} reason=object_out_of_scope object_key={key:?}"
            );
        }
        for frame in repo.assignments_by_frame(process_id)? {
            for object in frame.objects {
                if out_of_scope.contains(&name_key(&object)) {
                    triples.push(AssignmentTriple {
                        frame: frame.frame_name.clone(),
                        object,
                        assigned: true,
                    });
                }
            }
        }
    }

    let table = pivot_triples(process, &frames, &triples, columns)?;
    debug!(
        "event=pivot_build module=pivot status=ok process_id={process_id} rows={} columns={}",
        table.rows().len(),
        table.columns().len()
    );
    Ok(table)
}

/// Pivots triples into a table with one row per frame and one column per
/// selected object. Missing triples render as unassigned.
pub fn pivot_triples(
    process: &str,
    frames: &[String],
    triples: &[AssignmentTriple],
    columns: Vec<PivotColumn>,
) -> Result<PivotTable, ShapeContractError> {
    let assigned: HashSet<(&str, String)> = triples
        .iter()
        .filter(|t| t.assigned)
        .map(|t| (t.frame.as_str(), name_key(&t.object)))
        .collect();

    let rows = frames
        .iter()
        .map(|frame| PivotRow {
            frame: frame.clone(),
            cells: columns
                .iter()
                .map(|column| {
                    Marker::from_assigned(
                        assigned.contains(&(frame.as_str(), name_key(&column.label))),
                    )
                })
                .collect(),
        })
        .collect();

    PivotTable::new(process, columns, rows)
}

/// Column definitions for a caller selection, deduplicated by canonical key.
///
/// A key equal to the `frame` column id is suffixed (`frame_2`, ...) with
/// the first suffix no other selected object uses.
pub fn selection_columns(selection: &[String]) -> Vec<PivotColumn> {
    let natural_keys: HashSet<String> = selection.iter().map(|name| name_key(name)).collect();
    let mut seen = HashSet::new();
    selection
        .iter()
        .filter_map(|name| {
            let key = name_key(name);
            if key.is_empty() || !seen.insert(key.clone()) {
                return None;
            }
            Some(PivotColumn {
                key: unreserved_key(key, &natural_keys),
                label: name.trim().to_string(),
            })
        })
        .collect()
}

fn unreserved_key(key: String, natural_keys: &HashSet<String>) -> String {
    if key != FRAME_COLUMN {
        return key;
    }
    (2..)
        .map(|n| format!("{FRAME_COLUMN}_{n}"))
        .find(|candidate| !natural_keys.contains(candidate))
        .unwrap_or(key)
}

fn resolve_process<R: AssignmentRepository + ?Sized>(
    repo: &R,
    process: &str,
) -> Result<EntityId, PivotError> {
    repo.find_process(process)?
        .ok_or_else(|| PivotError::ProcessNotFound(process.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{pivot_triples, selection_columns};
    use crate::model::pivot::Marker;
    use crate::repo::assignment_repo::AssignmentTriple;

    fn triple(frame: &str, object: &str, assigned: bool) -> AssignmentTriple {
        AssignmentTriple {
            frame: frame.to_string(),
            object: object.to_string(),
            assigned,
        }
    }

    #[test]
    fn selection_columns_keep_caller_order_and_drop_case_duplicates() {
        let columns = selection_columns(&[
            "Zeta".to_string(),
            "alpha".to_string(),
            "ZETA".to_string(),
            "  ".to_string(),
        ]);
        let keys: Vec<_> = columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(columns[0].label, "Zeta");
    }

    #[test]
    fn object_named_like_frame_column_gets_a_free_suffix() {
        let columns = selection_columns(&[
            " Frame ".to_string(),
            "frame_2".to_string(),
            "Bolt".to_string(),
        ]);
        let keys: Vec<_> = columns.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["frame_3", "frame_2", "bolt"]);
        assert_eq!(columns[0].label, "Frame");
    }

    #[test]
    fn pivot_triples_matches_suffixed_columns_by_object_name() {
        let frames = vec!["F1".to_string()];
        let triples = vec![triple("F1", "FRAME", true)];
        let columns = selection_columns(&["Frame".to_string()]);

        let table = pivot_triples("Welding", &frames, &triples, columns).unwrap();
        assert_eq!(table.header(), vec!["frame", "frame_2"]);
        assert_eq!(table.records()[0]["frame"], "F1");
        assert_eq!(table.records()[0]["frame_2"], "✔");
    }

    #[test]
    fn pivot_triples_marks_only_assigned_pairs() {
        let frames = vec!["F1".to_string(), "F2".to_string()];
        let triples = vec![
            triple("F1", "Fixture A", true),
            triple("F1", "Fixture B", false),
            triple("F2", "Fixture A", false),
        ];
        let columns = selection_columns(&["Fixture B".to_string(), "Fixture A".to_string()]);

        let table = pivot_triples("Welding", &frames, &triples, columns).unwrap();
        assert_eq!(table.header(), vec!["frame", "fixture b", "fixture a"]);
        assert_eq!(table.cell("F1", "fixture a"), Some(Marker::Assigned));
        assert_eq!(table.cell("F1", "fixture b"), Some(Marker::Unassigned));
        assert_eq!(table.cell("F2", "fixture a"), Some(Marker::Unassigned));
    }

    #[test]
    fn pivot_triples_with_empty_selection_keeps_frame_rows() {
        let frames = vec!["F1".to_string()];
        let table = pivot_triples("P", &frames, &[], Vec::new()).unwrap();
        assert_eq!(table.header(), vec!["frame"]);
        assert_eq!(table.rows().len(), 1);
        assert!(table.rows()[0].cells.is_empty());
    }
}
