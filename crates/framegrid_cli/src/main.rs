//! `framegrid` command-line front end.
//!
//! # Responsibility
//! - Expose catalog, pivot, edit and bulk transfer operations of
//!   `framegrid_core` against one store file.
//! - Render grids and reports as plain text.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use framegrid_core::config::{
    CoreConfig, DB_PATH_ENV, EXPORT_SLOTS_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV,
};
use framegrid_core::model::pivot::{ASSIGNED_MARKER, UNASSIGNED_MARKER};
use framegrid_core::repo::assignment_repo::SqliteAssignmentRepository;
use framegrid_core::repo::catalog_repo::SqliteCatalogRepository;
use framegrid_core::transfer::export::{
    export_dataset, export_pivot_workbook, ExportOptions,
};
use framegrid_core::transfer::import::import_workbook;
use framegrid_core::transfer::workbook::{read_workbook_dir, write_workbook_dir};
use framegrid_core::{
    init_logging, open_db, CatalogService, DatasetCounts, GridSession, Marker, NamedEntity,
    PivotService, PivotTable, SyncReport,
};
use log::info;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "framegrid")]
#[command(version, about = "Edit frame/object assignments of manufacturing processes")]
struct Cli {
    /// Store file; created and migrated on first use.
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long, global = true, env = LOG_LEVEL_ENV)]
    log_level: Option<String>,
    /// Absolute directory for rotated log files; stderr when unset.
    #[arg(long, global = true, env = LOG_DIR_ENV)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List processes.
    Processes,
    /// Create a process (no-op when it exists).
    AddProcess { name: String },
    /// Make an object selectable for a process.
    AddObject { process: String, name: String },
    /// Add a frame row to a process.
    AddFrame { process: String, name: String },
    /// List the objects of a process.
    Objects { process: String },
    /// List the frames of a process.
    Frames { process: String },
    /// Print the frame x object grid of a process.
    Pivot {
        process: String,
        /// Object column, repeatable; defaults to the first objects by name.
        #[arg(short, long = "object")]
        objects: Vec<String>,
    },
    /// Set one cell and commit it through diff and sync.
    Set {
        process: String,
        frame: String,
        object: String,
        /// `✔`/`✘`, or `on`/`off`.
        #[arg(value_parser = parse_marker)]
        marker: Marker,
    },
    /// Write the pivoted per-process workbook as a directory of CSV sheets.
    Export {
        dir: PathBuf,
        /// Object columns per frame row.
        #[arg(long, env = EXPORT_SLOTS_ENV)]
        slots: Option<usize>,
    },
    /// Write all six tables in the import layout.
    ExportDataset { dir: PathBuf },
    /// Replace the whole store with a six-sheet workbook directory.
    Import { dir: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.log_dir.is_some() {
        config.log_dir = cli.log_dir;
    }
    init_logging(&config.logging())?;

    run(cli.command, &config)
}

fn run(command: Commands, config: &CoreConfig) -> Result<()> {
    let mut conn = open_db(&config.db_path)
        .with_context(|| format!("opening store `{}`", config.db_path.display()))?;

    match command {
        Commands::Processes => {
            let catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
            print_entities(&catalog.list_processes()?);
        }
        Commands::AddProcess { name } => {
            let mut catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
            let upsert = catalog.add_process(&name)?;
            println!("process id={} created={}", upsert.id, upsert.created);
        }
        Commands::AddObject { process, name } => {
            let mut catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
            let outcome = catalog.add_object_to_process(&process, &name)?;
            println!(
                "object id={} created={} linked={}",
                outcome.member.id, outcome.member.created, outcome.linked
            );
        }
        Commands::AddFrame { process, name } => {
            let mut catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
            let outcome = catalog.add_frame_to_process(&process, &name)?;
            println!(
                "frame id={} created={} linked={}",
                outcome.member.id, outcome.member.created, outcome.linked
            );
        }
        Commands::Objects { process } => {
            let catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
            print_entities(&catalog.objects_for_process(&process)?);
        }
        Commands::Frames { process } => {
            let catalog = CatalogService::new(SqliteCatalogRepository::new(&mut conn));
            print_entities(&catalog.frames_for_process(&process)?);
        }
        Commands::Pivot { process, objects } => {
            let pivot = PivotService::new(SqliteAssignmentRepository::new(&mut conn));
            let selection = if objects.is_empty() {
                pivot.default_selection(&process)?
            } else {
                objects
            };
            print_table(&pivot.build(&process, &selection)?);
        }
        Commands::Set {
            process,
            frame,
            object,
            marker,
        } => {
            let repo = SqliteAssignmentRepository::new(&mut conn);
            let mut session = GridSession::open(repo, &process, vec![object.clone()])?;
            let Some(column) = session.snapshot().columns().first().map(|c| c.key.clone()) else {
                bail!("`{object}` is not a valid object name");
            };
            let mut edited = session.snapshot().clone();
            edited.set_cell(&frame, &column, marker)?;
            let outcome = session.commit(&edited)?;
            print_report(&outcome.report);
            print_table(session.snapshot());
            if !outcome.report.is_clean() {
                bail!("{} cell(s) failed to sync", outcome.report.failures.len());
            }
        }
        Commands::Export { dir, slots } => {
            let options = ExportOptions {
                object_slots: slots.unwrap_or(config.object_slots),
            };
            let workbook = export_pivot_workbook(&mut conn, &options)?;
            write_workbook_dir(&workbook, &dir)?;
            println!(
                "exported {} sheet(s) to {}",
                workbook.sheets().len(),
                dir.display()
            );
        }
        Commands::ExportDataset { dir } => {
            let workbook = export_dataset(&mut conn)?;
            write_workbook_dir(&workbook, &dir)?;
            println!("exported dataset to {}", dir.display());
        }
        Commands::Import { dir } => {
            let workbook = read_workbook_dir(&dir)?;
            let counts = import_workbook(&mut conn, &workbook)?;
            info!(
                "event=cli_import module=cli status=ok source={}",
                dir.display()
            );
            print_counts(&counts);
        }
    }
    Ok(())
}

fn parse_marker(raw: &str) -> Result<Marker, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "assigned" => Ok(Marker::Assigned),
        "off" | "no" | "unassigned" => Ok(Marker::Unassigned),
        _ => Marker::from_str(raw).map_err(|value| {
            format!("`{value}` is not a marker; use {ASSIGNED_MARKER}/{UNASSIGNED_MARKER} or on/off")
        }),
    }
}

fn print_entities(entities: &[NamedEntity]) {
    for entity in entities {
        println!("{}\t{}", entity.id, entity.name);
    }
}

fn print_table(table: &PivotTable) {
    let labels = std::iter::once("frame")
        .chain(table.columns().iter().map(|c| c.label.as_str()))
        .collect::<Vec<_>>();
    println!("{}", labels.join("\t"));
    for row in table.rows() {
        let cells = row.cells.iter().map(|m| m.as_str()).collect::<Vec<_>>();
        println!("{}\t{}", row.frame, cells.join("\t"));
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "applied={} rows_changed={} failures={}",
        report.applied.len(),
        report.rows_changed(),
        report.failures.len()
    );
    for failure in &report.failures {
        println!(
            "failed frame={:?} column={:?}: {}",
            failure.change.frame, failure.change.column, failure.error
        );
    }
}

fn print_counts(counts: &DatasetCounts) {
    println!(
        "process={} frame={} object={} process_frame={} process_object={} frame_object={}",
        counts.processes,
        counts.frames,
        counts.objects,
        counts.process_frames,
        counts.process_objects,
        counts.frame_objects
    );
}
