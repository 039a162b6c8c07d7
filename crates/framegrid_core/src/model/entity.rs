//! Named entity identities.
//!
//! # Invariants
//! - `name_key` is the only value used for lookups and uniqueness.
//! - Display names are stored trimmed, with their original casing.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Integer identity of a process, frame or object row.
pub type EntityId = i64;

/// The three named entity kinds of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Process,
    Frame,
    Object,
}

impl EntityKind {
    /// Backing table name. Only ever a compile-time constant.
    pub fn table(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Frame => "frame",
            Self::Object => "object",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// One stored entity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: EntityId,
    pub name: String,
}

/// Canonical lookup key for a display name: trimmed and lowercased.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trims a user-supplied name, returning `None` when nothing is left.
pub fn normalize_display_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{name_key, normalize_display_name, EntityKind};

    #[test]
    fn name_key_ignores_case_and_surrounding_whitespace() {
        assert_eq!(name_key("  Fixture A "), "fixture a");
        assert_eq!(name_key("FIXTURE a"), name_key("fixture A"));
    }

    #[test]
    fn blank_display_names_are_rejected() {
        assert_eq!(normalize_display_name("   "), None);
        assert_eq!(normalize_display_name(" F1 ").as_deref(), Some("F1"));
    }

    #[test]
    fn entity_kind_displays_as_table_name() {
        assert_eq!(EntityKind::Object.to_string(), "object");
    }
}
