//! Output column schema
//!
//! `FeatureSchema` is the append-only list of column names discovered so far
//! for one brand. A new file's header is the union over every record the
//! brand yields in the run. A file that already exists keeps its header
//! (`FrozenSchema`); records with columns outside it are rejected.

use crate::storage::record::{DeviceRecord, BRAND_COLUMN, MODEL_IMAGE_COLUMN, MODEL_NAME_COLUMN};
use std::collections::HashSet;

/// Ordered, unique, append-only list of column names
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    columns: Vec<String>,
    seen: HashSet<String>,
}

impl FeatureSchema {
    /// Creates a schema holding only the required columns
    pub fn new() -> Self {
        let mut schema = Self {
            columns: Vec::new(),
            seen: HashSet::new(),
        };
        schema.append(BRAND_COLUMN);
        schema.append(MODEL_NAME_COLUMN);
        schema
    }

    /// Appends a column name; returns false if it was already present
    pub fn append(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.columns.push(name.to_string());
        true
    }

    /// Builds the union schema of a set of records
    ///
    /// `Model Image` sits right after the required columns whenever any
    /// record has an image; the remaining columns follow in discovery order.
    pub fn from_records(records: &[DeviceRecord]) -> Self {
        let mut schema = Self::new();
        if records.iter().any(|r| r.image.is_some()) {
            schema.append(MODEL_IMAGE_COLUMN);
        }
        for record in records {
            schema.absorb(record);
        }
        schema
    }

    /// Appends every column of the record not yet known; returns how many were new
    pub fn absorb(&mut self, record: &DeviceRecord) -> usize {
        record
            .columns()
            .into_iter()
            .filter(|(name, _)| self.append(name))
            .count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Snapshots the current columns as a file header
    pub fn freeze(&self) -> FrozenSchema {
        FrozenSchema {
            columns: self.columns.clone(),
        }
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Header of one output file; never changes once written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenSchema {
    columns: Vec<String>,
}

impl FrozenSchema {
    /// Wraps a header read back from an existing file
    pub fn from_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: header.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the record's columns that are missing from this header
    pub fn violations(&self, record: &DeviceRecord) -> Vec<String> {
        record
            .columns()
            .into_iter()
            .filter(|(name, _)| !self.columns.iter().any(|c| c == name))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Lays the record out in header order, blank where it has no value
    pub fn row_for(&self, record: &DeviceRecord) -> Vec<String> {
        let columns = record.columns();
        self.columns
            .iter()
            .map(|header| {
                columns
                    .iter()
                    .find(|(name, _)| name == header)
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }
}
