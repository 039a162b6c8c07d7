//! Whole-dataset snapshot used by bulk transfer.
//!
//! # Invariants
//! - Link rows reference entity ids present in the same snapshot once it has
//!   been accepted by the store.

use crate::model::entity::{EntityId, NamedEntity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One association row: `(process|frame id, frame|object id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkRow {
    pub left: EntityId,
    pub right: EntityId,
}

/// The three association tables and their key columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTable {
    ProcessFrame,
    ProcessObject,
    FrameObject,
}

impl LinkTable {
    pub const ALL: [LinkTable; 3] = [Self::ProcessFrame, Self::ProcessObject, Self::FrameObject];

    pub fn table(self) -> &'static str {
        match self {
            Self::ProcessFrame => "process_frame",
            Self::ProcessObject => "process_object",
            Self::FrameObject => "frame_object",
        }
    }

    /// `(left, right)` foreign key column names.
    pub fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::ProcessFrame => ("process_id", "frame_id"),
            Self::ProcessObject => ("process_id", "object_id"),
            Self::FrameObject => ("frame_id", "object_id"),
        }
    }
}

/// Every row of the six tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub processes: Vec<NamedEntity>,
    pub frames: Vec<NamedEntity>,
    pub objects: Vec<NamedEntity>,
    pub process_frames: Vec<LinkRow>,
    pub process_objects: Vec<LinkRow>,
    pub frame_objects: Vec<LinkRow>,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub processes: usize,
    pub frames: usize,
    pub objects: usize,
    pub process_frames: usize,
    pub process_objects: usize,
    pub frame_objects: usize,
}

impl Dataset {
    pub fn links(&self, table: LinkTable) -> &[LinkRow] {
        match table {
            LinkTable::ProcessFrame => &self.process_frames,
            LinkTable::ProcessObject => &self.process_objects,
            LinkTable::FrameObject => &self.frame_objects,
        }
    }

    pub fn counts(&self) -> DatasetCounts {
        DatasetCounts {
            processes: self.processes.len(),
            frames: self.frames.len(),
            objects: self.objects.len(),
            process_frames: self.process_frames.len(),
            process_objects: self.process_objects.len(),
            frame_objects: self.frame_objects.len(),
        }
    }

    /// `(process, frame, object)` names for every assigned object of every
    /// frame reached through its processes.
    ///
    /// This is the relation the pivoted export carries, so it is what an
    /// export/import round trip preserves.
    pub fn assigned_triples(&self) -> BTreeSet<(String, String, String)> {
        let names = |entities: &[NamedEntity]| -> BTreeMap<EntityId, String> {
            entities.iter().map(|e| (e.id, e.name.clone())).collect()
        };
        let process_names = names(&self.processes);
        let frame_names = names(&self.frames);
        let object_names = names(&self.objects);

        let mut objects_by_frame: BTreeMap<EntityId, Vec<EntityId>> = BTreeMap::new();
        for link in &self.frame_objects {
            objects_by_frame.entry(link.left).or_default().push(link.right);
        }

        let mut triples = BTreeSet::new();
        for link in &self.process_frames {
            let (Some(process), Some(frame)) =
                (process_names.get(&link.left), frame_names.get(&link.right))
            else {
                continue;
            };
            for object_id in objects_by_frame.get(&link.right).into_iter().flatten() {
                if let Some(object) = object_names.get(object_id) {
                    triples.insert((process.clone(), frame.clone(), object.clone()));
                }
            }
        }
        triples
    }
}
