use framegrid_core::db::open_db_in_memory;
use framegrid_core::repo::assignment_repo::{CellWrite, SqliteAssignmentRepository};
use framegrid_core::repo::catalog_repo::SqliteCatalogRepository;
use framegrid_core::{
    diff_tables, CatalogService, CellChange, EntityKind, GridError, GridSession, Marker,
    ShapeContractError, SyncService,
};
use rusqlite::Connection;

fn welding_store() -> Connection {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
        catalog.add_process("Welding").unwrap();
        for frame in ["F1", "F2", "F3"] {
            catalog.add_frame_to_process("Welding", frame).unwrap();
        }
        for object in ["Fixture A", "Fixture B", "Clamp"] {
            catalog.add_object_to_process("Welding", object).unwrap();
        }
    }
    conn
}

fn change(frame: &str, object: &str, new: Marker) -> CellChange {
    let old = match new {
        Marker::Assigned => Marker::Unassigned,
        Marker::Unassigned => Marker::Assigned,
    };
    CellChange {
        frame: frame.to_string(),
        column: object.trim().to_lowercase(),
        object: object.to_string(),
        old,
        new,
    }
}

fn frame_object_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM frame_object", [], |row| row.get(0))
        .unwrap()
}

fn selection() -> Vec<String> {
    vec!["Fixture A".to_string(), "Fixture B".to_string()]
}

#[test]
fn welding_edit_commits_one_change_and_refreshes() {
    let mut conn = welding_store();
    let mut session = GridSession::open(
        SqliteAssignmentRepository::new(&mut conn),
        "Welding",
        selection(),
    )
    .unwrap();
    let mut seeded = session.snapshot().clone();
    seeded.set_cell("F1", "fixture a", Marker::Assigned).unwrap();
    session.commit(&seeded).unwrap();

    let mut edited = session.snapshot().clone();
    edited.set_cell("F2", "fixture b", Marker::Assigned).unwrap();
    let outcome = session.commit(&edited).unwrap();

    assert_eq!(outcome.changes.len(), 1);
    assert_eq!(outcome.changes[0], change("F2", "Fixture B", Marker::Assigned));
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.report.applied[0].write, CellWrite::Inserted);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.cell("F2", "fixture a"), Some(Marker::Unassigned));
    assert_eq!(snapshot.cell("F2", "fixture b"), Some(Marker::Assigned));
    assert_eq!(snapshot.cell("F1", "fixture a"), Some(Marker::Assigned));

    drop(session);
    assert_eq!(frame_object_rows(&conn), 2);
}

#[test]
fn reapplying_changes_is_idempotent() {
    let mut conn = welding_store();
    {
        let mut sync = SyncService::new(SqliteAssignmentRepository::new(&mut conn));
        let assign = [change("F1", "fixture a", Marker::Assigned)];
        let first = sync.apply(&assign);
        let second = sync.apply(&assign);
        assert_eq!(first.applied[0].write, CellWrite::Inserted);
        assert_eq!(second.applied[0].write, CellWrite::AlreadyAssigned);
        assert_eq!(second.rows_changed(), 0);

        let unassign_missing = sync.apply(&[change("F2", "clamp", Marker::Unassigned)]);
        assert!(unassign_missing.is_clean());
        assert_eq!(unassign_missing.applied[0].write, CellWrite::AlreadyUnassigned);
    }
    assert_eq!(frame_object_rows(&conn), 1);
}

#[test]
fn unresolved_names_fail_per_cell_without_stopping_the_batch() {
    let mut conn = welding_store();
    let report = SyncService::new(SqliteAssignmentRepository::new(&mut conn)).apply(&[
        change("F1", "fixture a", Marker::Assigned),
        change("F9", "fixture a", Marker::Assigned),
        change("F1", "ghost", Marker::Assigned),
        change("F3", "clamp", Marker::Assigned),
    ]);

    assert!(!report.is_clean());
    assert_eq!(report.applied.len(), 2);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].unresolved_kind(), Some(EntityKind::Frame));
    assert_eq!(report.failures[1].unresolved_kind(), Some(EntityKind::Object));
    assert_eq!(frame_object_rows(&conn), 2);
}

#[test]
fn diff_reports_exactly_the_changed_cells() {
    let mut conn = welding_store();
    let session = GridSession::open(
        SqliteAssignmentRepository::new(&mut conn),
        "Welding",
        vec!["Fixture A".to_string(), "Fixture B".to_string(), "Clamp".to_string()],
    )
    .unwrap();
    let before = session.snapshot();

    let edits = [
        ("F1", "fixture a"),
        ("F2", "clamp"),
        ("F3", "fixture b"),
        ("F3", "clamp"),
    ];
    let mut after = before.clone();
    for (frame, column) in edits {
        after.set_cell(frame, column, Marker::Assigned).unwrap();
    }

    let changes = diff_tables(before, &after).unwrap();
    assert_eq!(changes.len(), edits.len());
    for (frame, column) in edits {
        assert!(changes
            .iter()
            .any(|c| c.frame == frame && c.column == column && c.new == Marker::Assigned));
    }
    assert!(diff_tables(before, before).unwrap().is_empty());
}

#[test]
fn grid_rows_with_changed_shape_are_rejected_without_writes() {
    let mut conn = welding_store();
    {
        let mut session = GridSession::open(
            SqliteAssignmentRepository::new(&mut conn),
            "Welding",
            selection(),
        )
        .unwrap();

        let missing_frame = vec![
            vec!["F1".to_string(), "✔".to_string(), "✘".to_string()],
            vec!["F2".to_string(), "✘".to_string(), "✘".to_string()],
        ];
        assert!(matches!(
            session.commit_grid(&missing_frame),
            Err(GridError::Shape(ShapeContractError::RowCountMismatch { before: 3, after: 2 }))
        ));

        let bad_marker = vec![
            vec!["F1".to_string(), "yes".to_string(), "✘".to_string()],
            vec!["F2".to_string(), "✘".to_string(), "✘".to_string()],
            vec!["F3".to_string(), "✘".to_string(), "✘".to_string()],
        ];
        assert!(matches!(
            session.commit_grid(&bad_marker),
            Err(GridError::Shape(ShapeContractError::InvalidMarker { .. }))
        ));

        let legacy_marker = vec![
            vec!["F1".to_string(), "✔".to_string(), "❌".to_string()],
            vec!["F2".to_string(), "✘".to_string(), "✘".to_string()],
            vec!["F3".to_string(), "✘".to_string(), "✘".to_string()],
        ];
        let outcome = session.commit_grid(&legacy_marker).unwrap();
        assert_eq!(outcome.changes.len(), 1);
    }
    assert_eq!(frame_object_rows(&conn), 1);
}

#[test]
fn commit_changes_only_the_edited_cell_of_a_populated_grid() {
    let mut conn = welding_store();
    let mut session = GridSession::open(
        SqliteAssignmentRepository::new(&mut conn),
        "Welding",
        vec!["Fixture A".to_string(), "Fixture B".to_string(), "Clamp".to_string()],
    )
    .unwrap();
    let mut seeded = session.snapshot().clone();
    for (frame, column) in [("F1", "fixture a"), ("F2", "clamp"), ("F3", "fixture b")] {
        seeded.set_cell(frame, column, Marker::Assigned).unwrap();
    }
    session.commit(&seeded).unwrap();
    let before = session.snapshot().records();

    let mut edited = session.snapshot().clone();
    edited.set_cell("F2", "fixture a", Marker::Assigned).unwrap();
    session.commit(&edited).unwrap();
    let after = session.snapshot().records();

    assert_eq!(before.len(), after.len());
    for (old_row, new_row) in before.iter().zip(&after) {
        assert_eq!(old_row.keys().collect::<Vec<_>>(), new_row.keys().collect::<Vec<_>>());
        for (key, old_value) in old_row {
            let edited_cell = new_row["frame"] == "F2" && key == "fixture a";
            if edited_cell {
                assert_eq!(old_value, "✘");
                assert_eq!(new_row[key], "✔");
            } else {
                assert_eq!(&new_row[key], old_value, "row {} column {key}", new_row["frame"]);
            }
        }
    }
}

#[test]
fn object_named_frame_keeps_the_frame_column_and_syncs() {
    let mut conn = welding_store();
    CatalogService::new(SqliteCatalogRepository::new(&mut conn))
        .add_object_to_process("Welding", "Frame")
        .unwrap();
    let mut session = GridSession::open(
        SqliteAssignmentRepository::new(&mut conn),
        "Welding",
        vec!["Frame".to_string()],
    )
    .unwrap();
    assert_eq!(session.snapshot().header(), vec!["frame", "frame_2"]);
    assert_eq!(session.snapshot().records()[0]["frame"], "F1");

    let mut edited = session.snapshot().clone();
    edited.set_cell("F1", "frame_2", Marker::Assigned).unwrap();
    let outcome = session.commit(&edited).unwrap();

    assert!(outcome.report.is_clean());
    assert_eq!(outcome.changes[0].object, "Frame");
    let records = session.snapshot().records();
    assert_eq!(records[0]["frame"], "F1");
    assert_eq!(records[0]["frame_2"], "✔");
    drop(session);
    assert_eq!(frame_object_rows(&conn), 1);
}

#[test]
fn lowercase_frame_names_address_stored_rows() {
    let mut conn = welding_store();
    let mut session = GridSession::open(
        SqliteAssignmentRepository::new(&mut conn),
        "Welding",
        selection(),
    )
    .unwrap();
    let mut edited = session.snapshot().clone();
    edited.set_cell("f1", "fixture a", Marker::Assigned).unwrap();
    session.commit(&edited).unwrap();
    assert_eq!(session.snapshot().cell("F1", "fixture a"), Some(Marker::Assigned));
}
