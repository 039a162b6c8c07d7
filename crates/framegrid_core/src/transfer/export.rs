//! Workbook exports.
//!
//! # Responsibility
//! - Pivoted export: one fixed-width `frame_id, frame_name, Obj 1..N` sheet
//!   per process.
//! - Dataset export: all six tables in the import layout.
//! - Convert a pivoted export back into an importable dataset.
//!
//! # Invariants
//! - Slot values are each frame's assigned objects in ascending order; the
//!   objects beyond the slot count are dropped and logged, never an error.
//! - Frames without assignments and processes without such frames produce
//!   no rows and no sheet respectively.

use crate::model::dataset::{Dataset, LinkRow, LinkTable};
use crate::model::entity::{name_key, normalize_display_name, EntityId, EntityKind, NamedEntity};
use crate::repo::assignment_repo::{AssignmentRepository, SqliteAssignmentRepository};
use crate::repo::catalog_repo::{CatalogRepository, SqliteCatalogRepository};
use crate::repo::dataset_repo::{DatasetRepository, SqliteDatasetRepository};
use crate::transfer::workbook::{Sheet, Workbook};
use crate::transfer::{TransferResult, ValidationIssue};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Object slots per frame row when nothing else is configured.
pub const DEFAULT_OBJECT_SLOTS: usize = 5;
pub const FRAME_ID_COLUMN: &str = "frame_id";
pub const FRAME_NAME_COLUMN: &str = "frame_name";

static SLOT_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^obj\s+\d+$").expect("valid slot header regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub object_slots: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            object_slots: DEFAULT_OBJECT_SLOTS,
        }
    }
}

/// Header of the 1-based object slot `n`.
pub fn slot_header(n: usize) -> String {
    format!("Obj {n}")
}

/// Builds the pivoted per-process workbook.
///
/// Processes are visited in name order; each sheet is named after its
/// process, truncated to the sheet-name limit.
pub fn export_pivot_workbook(
    conn: &mut Connection,
    options: &ExportOptions,
) -> TransferResult<Workbook> {
    let started_at = Instant::now();
    let processes = SqliteCatalogRepository::new(conn).list_entities(EntityKind::Process)?;
    let assignments = SqliteAssignmentRepository::new(conn);

    let mut headers = vec![FRAME_ID_COLUMN.to_string(), FRAME_NAME_COLUMN.to_string()];
    headers.extend((1..=options.object_slots).map(slot_header));

    let mut workbook = Workbook::new();
    let mut dropped_total = 0usize;
    for process in &processes {
        let frames = assignments.assignments_by_frame(process.id)?;
        if frames.is_empty() {
            info!(
                "event=pivot_export module=transfer status=skip process={:?} reason=empty",
                process.name
            );
            continue;
        }

        let mut sheet = Sheet::new(process.name.as_str(), headers.clone());
        for frame in frames {
            let dropped = frame.objects.len().saturating_sub(options.object_slots);
            if dropped > 0 {
                warn!(
                    "event=pivot_export module=transfer status=truncated process={:?} frame={:?} dropped={dropped}",
                    process.name, frame.frame_name
                );
                dropped_total += dropped;
            }

            let mut row = Vec::with_capacity(headers.len());
            row.push(frame.frame_id.to_string());
            row.push(frame.frame_name);
            let mut slots = frame.objects.into_iter();
            row.extend((0..options.object_slots).map(|_| slots.next().unwrap_or_default()));
            sheet.push_row(row);
        }

        let stored_as = workbook.add_sheet(sheet);
        if stored_as != process.name {
            info!(
                "event=pivot_export module=transfer status=renamed process={:?} sheet={stored_as:?}",
                process.name
            );
        }
    }

    info!(
        "event=pivot_export module=transfer status=ok sheets={} dropped_objects={dropped_total} duration_ms={}",
        workbook.sheets().len(),
        started_at.elapsed().as_millis()
    );
    Ok(workbook)
}

/// Dumps all six tables in the layout [`crate::transfer::import`] reads.
pub fn export_dataset(conn: &mut Connection) -> TransferResult<Workbook> {
    let started_at = Instant::now();
    let dataset = SqliteDatasetRepository::new(conn).load_dataset()?;
    let workbook = dataset_workbook(&dataset);
    info!(
        "event=dataset_export module=transfer status=ok sheets={} duration_ms={}",
        workbook.sheets().len(),
        started_at.elapsed().as_millis()
    );
    Ok(workbook)
}

/// Renders a dataset as the six import sheets.
pub fn dataset_workbook(dataset: &Dataset) -> Workbook {
    let mut workbook = Workbook::new();
    for (kind, entities) in [
        (EntityKind::Process, &dataset.processes),
        (EntityKind::Frame, &dataset.frames),
        (EntityKind::Object, &dataset.objects),
    ] {
        let mut sheet = Sheet::new(kind.table(), vec!["id".to_string(), "name".to_string()]);
        for entity in entities {
            sheet.push_row(vec![entity.id.to_string(), entity.name.clone()]);
        }
        workbook.add_sheet(sheet);
    }
    for table in LinkTable::ALL {
        let (left, right) = table.columns();
        let mut sheet = Sheet::new(table.table(), vec![left.to_string(), right.to_string()]);
        for link in dataset.links(table) {
            sheet.push_row(vec![link.left.to_string(), link.right.to_string()]);
        }
        workbook.add_sheet(sheet);
    }
    workbook
}

/// Rebuilds an importable dataset from a pivoted export.
///
/// Each sheet becomes a process named after the sheet, so a process comes
/// back under its sheet name: cut to 31 characters with any `~N`
/// suffix kept. A sheet read from a CSV directory carries its file-safe
/// spelling (`Paint/Dry` becomes `Paint_Dry`). Frames keep their
/// exported ids (first name seen wins); processes and objects get fresh
/// sequential ids, objects deduplicated case-insensitively. Objects dropped
/// by slot truncation are not recoverable.
pub fn dataset_from_pivot_export(workbook: &Workbook) -> Result<Dataset, ValidationIssue> {
    let mut dataset = Dataset::default();
    let mut frame_names: BTreeMap<EntityId, String> = BTreeMap::new();
    let mut object_ids: BTreeMap<String, EntityId> = BTreeMap::new();
    let mut process_frames = BTreeSet::new();
    let mut process_objects = BTreeSet::new();
    let mut frame_objects = BTreeSet::new();

    for (process_id, sheet) in (1..).zip(workbook.sheets()) {
        let missing = |column: &str| ValidationIssue::MissingColumn {
            sheet: sheet.name.clone(),
            column: column.to_string(),
        };
        let id_idx = sheet
            .column_index(FRAME_ID_COLUMN)
            .ok_or_else(|| missing(FRAME_ID_COLUMN))?;
        let name_idx = sheet
            .column_index(FRAME_NAME_COLUMN)
            .ok_or_else(|| missing(FRAME_NAME_COLUMN))?;
        let slot_indices: Vec<usize> = sheet
            .headers
            .iter()
            .enumerate()
            .filter(|(_, header)| SLOT_HEADER_RE.is_match(header.trim()))
            .map(|(idx, _)| idx)
            .collect();

        dataset.processes.push(NamedEntity {
            id: process_id,
            name: sheet.name.clone(),
        });

        for row in 0..sheet.rows.len() {
            let raw_id = sheet.cell(row, id_idx).trim();
            if raw_id.is_empty() && sheet.cell(row, name_idx).trim().is_empty() {
                continue;
            }
            let frame_id = raw_id
                .strip_suffix(".0")
                .unwrap_or(raw_id)
                .parse::<EntityId>()
                .map_err(|_| ValidationIssue::InvalidInteger {
                    sheet: sheet.name.clone(),
                    row: row + 2,
                    column: FRAME_ID_COLUMN.to_string(),
                    value: raw_id.to_string(),
                })?;
            let frame_name = normalize_display_name(sheet.cell(row, name_idx)).ok_or_else(|| {
                ValidationIssue::BlankName {
                    sheet: sheet.name.clone(),
                    row: row + 2,
                }
            })?;
            frame_names.entry(frame_id).or_insert(frame_name);
            process_frames.insert(LinkRow {
                left: process_id,
                right: frame_id,
            });

            for &slot in &slot_indices {
                let Some(object_name) = normalize_display_name(sheet.cell(row, slot)) else {
                    continue;
                };
                let next_id = EntityId::try_from(object_ids.len()).unwrap_or(EntityId::MAX) + 1;
                let object_id = *object_ids.entry(name_key(&object_name)).or_insert_with(|| {
                    dataset.objects.push(NamedEntity {
                        id: next_id,
                        name: object_name,
                    });
                    next_id
                });
                process_objects.insert(LinkRow {
                    left: process_id,
                    right: object_id,
                });
                frame_objects.insert(LinkRow {
                    left: frame_id,
                    right: object_id,
                });
            }
        }
    }

    dataset.frames = frame_names
        .into_iter()
        .map(|(id, name)| NamedEntity { id, name })
        .collect();
    dataset.process_frames = process_frames.into_iter().collect();
    dataset.process_objects = process_objects.into_iter().collect();
    dataset.frame_objects = frame_objects.into_iter().collect();
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::{dataset_from_pivot_export, dataset_workbook, slot_header};
    use crate::transfer::import::parse_dataset;
    use crate::transfer::workbook::{Sheet, Workbook};
    use crate::transfer::ValidationIssue;

    fn pivot_sheet(name: &str, rows: &[&[&str]]) -> Sheet {
        let mut headers = vec!["frame_id".to_string(), "frame_name".to_string()];
        headers.extend((1..=3).map(slot_header));
        let mut sheet = Sheet::new(name, headers);
        for row in rows {
            sheet.push_row(row.iter().map(|c| c.to_string()).collect());
        }
        sheet
    }

    #[test]
    fn slot_headers_are_one_based() {
        assert_eq!(slot_header(1), "Obj 1");
        assert_eq!(slot_header(5), "Obj 5");
    }

    #[test]
    fn pivot_export_converts_back_to_links() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(pivot_sheet(
            "Welding",
            &[
                &["10", "F1", "Fixture A", "", ""],
                &["11", "F2", "Clamp B", "fixture a", ""],
            ],
        ));
        workbook.add_sheet(pivot_sheet("Painting", &[&["11", "F2", "Mask", "", ""]]));

        let dataset = dataset_from_pivot_export(&workbook).unwrap();
        assert_eq!(dataset.processes.len(), 2);
        assert_eq!(dataset.frames.len(), 2);
        assert_eq!(dataset.objects.len(), 3);
        assert_eq!(dataset.process_frames.len(), 3);
        assert_eq!(dataset.frame_objects.len(), 4);

        let triples = dataset.assigned_triples();
        assert!(triples.contains(&(
            "Welding".to_string(),
            "F2".to_string(),
            "Fixture A".to_string()
        )));
        assert!(triples.contains(&(
            "Painting".to_string(),
            "F2".to_string(),
            "Mask".to_string()
        )));
    }

    #[test]
    fn missing_frame_id_column_is_reported() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(Sheet::new("Welding", vec!["frame_name".to_string()]));
        assert_eq!(
            dataset_from_pivot_export(&workbook),
            Err(ValidationIssue::MissingColumn {
                sheet: "Welding".to_string(),
                column: "frame_id".to_string(),
            })
        );
    }

    #[test]
    fn dataset_workbook_is_accepted_by_import_parser() {
        let mut workbook = Workbook::new();
        workbook.add_sheet(pivot_sheet("Welding", &[&["10", "F1", "Fixture A", "", ""]]));
        let dataset = dataset_from_pivot_export(&workbook).unwrap();

        let reparsed = parse_dataset(&dataset_workbook(&dataset)).unwrap();
        assert_eq!(reparsed, dataset);
    }
}
