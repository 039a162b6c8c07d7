//! Process/frame/object catalog with an editable frame x object crosstab.
//! Storage, pivot, diff, sync and bulk transfer live here; front ends only
//! render tables and collect edits.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod transfer;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::dataset::{Dataset, DatasetCounts};
pub use model::entity::{EntityId, EntityKind, NamedEntity};
pub use model::pivot::{CellChange, Marker, PivotColumn, PivotRow, PivotTable, ShapeContractError};
pub use repo::{RepoError, RepoResult};
pub use service::catalog_service::{CatalogError, CatalogService};
pub use service::diff_engine::diff_tables;
pub use service::grid_session::{CommitOutcome, GridError, GridSession};
pub use service::pivot_service::{build_pivot, PivotError, PivotService};
pub use service::sync_service::{sync_changes, SyncReport, SyncService};
pub use transfer::{TransferError, TransferResult, ValidationIssue};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
