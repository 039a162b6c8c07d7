//! Domain model for the process/frame/object dataset and its pivot view.
//!
//! # Responsibility
//! - Define entity identities shared by repositories and services.
//! - Define the pivot grid shape exchanged with the grid UI.
//! - Define the whole-dataset snapshot moved by bulk transfer.
//!
//! # Invariants
//! - Entity names are compared through their canonical `name_key`.
//! - A pivot cell is always one of two markers; there is no third state.

pub mod dataset;
pub mod entity;
pub mod pivot;
