//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into catalog, pivot and sync use-cases.
//! - Keep grid/CLI callers decoupled from SQL.
//!
//! # Invariants
//! - Services receive their repository (and so their connection) explicitly.

pub mod catalog_service;
pub mod diff_engine;
pub mod grid_session;
pub mod pivot_service;
pub mod sync_service;
