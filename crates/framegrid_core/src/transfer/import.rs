//! Destructive six-table import.
//!
//! # Invariants
//! - Every sheet's presence and required columns are checked before any
//!   value is parsed, and every value is parsed before storage is touched.
//! - On success the store holds exactly the workbook's rows; on any failure
//!   it holds exactly what it held before.

use crate::model::dataset::{Dataset, DatasetCounts, LinkRow, LinkTable};
use crate::model::entity::{normalize_display_name, EntityKind, NamedEntity};
use crate::repo::dataset_repo::{DatasetRepository, SqliteDatasetRepository};
use crate::transfer::workbook::{Sheet, Workbook};
use crate::transfer::{TransferResult, ValidationIssue};
use log::{error, info, warn};
use rusqlite::Connection;
use std::time::Instant;

const ENTITY_COLUMNS: [&str; 2] = ["id", "name"];

/// Required `(sheet, columns)` pairs, in load order.
pub fn required_columns() -> Vec<(&'static str, [&'static str; 2])> {
    let mut required = vec![
        (EntityKind::Process.table(), ENTITY_COLUMNS),
        (EntityKind::Frame.table(), ENTITY_COLUMNS),
        (EntityKind::Object.table(), ENTITY_COLUMNS),
    ];
    for table in LinkTable::ALL {
        let (left, right) = table.columns();
        required.push((table.table(), [left, right]));
    }
    required
}

/// Checks that all six sheets exist with their required columns.
pub fn validate_workbook(workbook: &Workbook) -> Result<(), ValidationIssue> {
    for (sheet_name, columns) in required_columns() {
        let sheet = workbook
            .sheet(sheet_name)
            .ok_or_else(|| ValidationIssue::MissingSheet(sheet_name.to_string()))?;
        for column in columns {
            if sheet.column_index(column).is_none() {
                return Err(ValidationIssue::MissingColumn {
                    sheet: sheet_name.to_string(),
                    column: column.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Validates and converts a six-sheet workbook into a dataset.
pub fn parse_dataset(workbook: &Workbook) -> Result<Dataset, ValidationIssue> {
    validate_workbook(workbook)?;

    let entities = |kind: EntityKind| -> Result<Vec<NamedEntity>, ValidationIssue> {
        parse_entities(required_sheet(workbook, kind.table())?)
    };
    let links = |table: LinkTable| -> Result<Vec<LinkRow>, ValidationIssue> {
        let (left, right) = table.columns();
        parse_links(required_sheet(workbook, table.table())?, left, right)
    };

    Ok(Dataset {
        processes: entities(EntityKind::Process)?,
        frames: entities(EntityKind::Frame)?,
        objects: entities(EntityKind::Object)?,
        process_frames: links(LinkTable::ProcessFrame)?,
        process_objects: links(LinkTable::ProcessObject)?,
        frame_objects: links(LinkTable::FrameObject)?,
    })
}

/// Replaces the whole store with the workbook's contents.
///
/// Precondition: no other reader or editor uses the store concurrently.
///
/// # Errors
/// - `TransferError::Validation` when a sheet, column or value is invalid;
///   storage is untouched.
/// - `TransferError::Repo` when loading fails (duplicate names, dangling
///   references); the transaction is rolled back and storage is untouched.
pub fn import_workbook(conn: &mut Connection, workbook: &Workbook) -> TransferResult<DatasetCounts> {
    let started_at = Instant::now();
    info!("event=dataset_import module=transfer status=start");

    let dataset = parse_dataset(workbook).map_err(|issue| {
        warn!(
            "event=dataset_import module=transfer status=rejected duration_ms={} error={issue}",
            started_at.elapsed().as_millis()
        );
        issue
    })?;

    let mut repo = SqliteDatasetRepository::new(conn);
    let counts = repo.replace_dataset(&dataset).map_err(|err| {
        error!(
            "event=dataset_import module=transfer status=error duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        );
        err
    })?;

    info!(
        "event=dataset_import module=transfer status=ok duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(counts)
}

fn required_sheet<'w>(workbook: &'w Workbook, name: &str) -> Result<&'w Sheet, ValidationIssue> {
    workbook
        .sheet(name)
        .ok_or_else(|| ValidationIssue::MissingSheet(name.to_string()))
}

fn parse_entities(sheet: &Sheet) -> Result<Vec<NamedEntity>, ValidationIssue> {
    let id_idx = column(sheet, "id")?;
    let name_idx = column(sheet, "name")?;

    let mut entities = Vec::with_capacity(sheet.rows.len());
    for row in data_rows(sheet) {
        let id = parse_id(sheet, row, id_idx, "id")?;
        let name = normalize_display_name(sheet.cell(row, name_idx)).ok_or_else(|| {
            ValidationIssue::BlankName {
                sheet: sheet.name.clone(),
                row: spreadsheet_row(row),
            }
        })?;
        entities.push(NamedEntity { id, name });
    }
    Ok(entities)
}

fn parse_links(sheet: &Sheet, left: &str, right: &str) -> Result<Vec<LinkRow>, ValidationIssue> {
    let left_idx = column(sheet, left)?;
    let right_idx = column(sheet, right)?;

    data_rows(sheet)
        .map(|row| -> Result<LinkRow, ValidationIssue> {
            Ok(LinkRow {
                left: parse_id(sheet, row, left_idx, left)?,
                right: parse_id(sheet, row, right_idx, right)?,
            })
        })
        .collect()
}

fn column(sheet: &Sheet, name: &str) -> Result<usize, ValidationIssue> {
    sheet
        .column_index(name)
        .ok_or_else(|| ValidationIssue::MissingColumn {
            sheet: sheet.name.clone(),
            column: name.to_string(),
        })
}

/// Indices of rows that are not entirely blank.
fn data_rows(sheet: &Sheet) -> impl Iterator<Item = usize> + '_ {
    (0..sheet.rows.len())
        .filter(move |&row| sheet.rows[row].iter().any(|cell| !cell.trim().is_empty()))
}

/// Parses an integer id; spreadsheet tools often write `3` as `3.0`.
fn parse_id(sheet: &Sheet, row: usize, column: usize, name: &str) -> Result<i64, ValidationIssue> {
    let raw = sheet.cell(row, column).trim();
    let integral = raw.strip_suffix(".0").unwrap_or(raw);
    integral
        .parse::<i64>()
        .map_err(|_| ValidationIssue::InvalidInteger {
            sheet: sheet.name.clone(),
            row: spreadsheet_row(row),
            column: name.to_string(),
            value: raw.to_string(),
        })
}

fn spreadsheet_row(data_row: usize) -> usize {
    data_row + 2
}
