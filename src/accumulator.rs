use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::record::ReviewRecord;
use crate::registry::FIELD_COUNT;

/// A kept record tagged with its position among every card seen in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub source_index: u64,
    pub record: ReviewRecord,
}

impl Serialize for IndexedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT + 1))?;
        map.serialize_entry("source_index", &self.source_index)?;
        self.record.serialize_fields(&mut map)?;
        map.end()
    }
}

/// Append-only table of kept records for one run.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    rows: Vec<IndexedRecord>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, source_index: u64, record: ReviewRecord) {
        debug_assert!(
            self.rows.last().map_or(true, |r| r.source_index < source_index),
            "source index must increase"
        );
        self.rows.push(IndexedRecord {
            source_index,
            record,
        });
    }

    pub fn kept(&self) -> usize {
        self.rows.len()
    }

    pub fn records(&self) -> &[IndexedRecord] {
        &self.rows
    }
}
