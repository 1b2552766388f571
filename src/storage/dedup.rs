//! Registry of devices already persisted
//!
//! The index is rebuilt at startup from the `Model Name` column of every CSV
//! file in the output directory, then updated after each successful write. No
//! separate index file is kept: the output files are the source of truth.

use crate::storage::record::MODEL_NAME_COLUMN;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Known (brand, model name) pairs, compared case-insensitively
#[derive(Debug, Clone, Default)]
pub struct DedupIndex {
    brands: HashMap<String, HashSet<String>>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from every `*.csv` file in `output_dir`
    ///
    /// The brand key is the file stem (`Acme.csv` -> `acme`). A file that fails
    /// to parse part-way keeps whatever rows were read before the failure. A
    /// missing directory yields an empty index.
    pub fn seed(output_dir: &Path) -> Self {
        let mut index = Self::new();

        let entries = match std::fs::read_dir(output_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    "No existing output in {}: {}",
                    output_dir.display(),
                    e
                );
                return index;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_csv = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv || !path.is_file() {
                continue;
            }

            let Some(brand) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let brand = brand.to_string();

            let seeded = index.seed_file(&brand, &path);
            tracing::debug!(
                "Seeded {} known models for '{}' from {}",
                seeded,
                brand,
                path.display()
            );
        }

        tracing::info!(
            "Dedup index seeded: {} models across {} brands",
            index.len(),
            index.brand_count()
        );
        index
    }

    /// Reads the `Model Name` column of one file into the brand's known set
    ///
    /// Returns the number of rows read. Parse failures are logged and end the
    /// scan of that file.
    pub fn seed_file(&mut self, brand: &str, path: &Path) -> usize {
        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!("Cannot open {} for seeding: {}", path.display(), e);
                return 0;
            }
        };

        let model_idx = match reader.headers() {
            Ok(headers) => headers.iter().position(|h| h == MODEL_NAME_COLUMN),
            Err(e) => {
                tracing::warn!("Cannot read header of {}: {}", path.display(), e);
                return 0;
            }
        };

        let Some(model_idx) = model_idx else {
            tracing::warn!(
                "{} has no '{}' column; nothing seeded",
                path.display(),
                MODEL_NAME_COLUMN
            );
            return 0;
        };

        let mut count = 0;
        for record in reader.records() {
            match record {
                Ok(record) => {
                    if let Some(model) = record.get(model_idx) {
                        if !model.trim().is_empty() {
                            self.record(brand, model);
                            count += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Stopped seeding {} after {} rows: {}",
                        path.display(),
                        count,
                        e
                    );
                    break;
                }
            }
        }

        count
    }

    /// Returns true if the model is already known for the brand
    pub fn contains(&self, brand: &str, model_name: &str) -> bool {
        self.brands
            .get(&normalize(brand))
            .map_or(false, |models| models.contains(&normalize(model_name)))
    }

    /// Marks a model as persisted; returns false if it was already known
    pub fn record(&mut self, brand: &str, model_name: &str) -> bool {
        self.brands
            .entry(normalize(brand))
            .or_default()
            .insert(normalize(model_name))
    }

    /// Number of known models for a brand
    pub fn known_for(&self, brand: &str) -> usize {
        self.brands.get(&normalize(brand)).map_or(0, HashSet::len)
    }

    /// Total number of known models
    pub fn len(&self) -> usize {
        self.brands.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn brand_count(&self) -> usize {
        self.brands.len()
    }

    /// Known model counts per brand key, sorted by key
    pub fn brand_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .brands
            .iter()
            .map(|(brand, models)| (brand.as_str(), models.len()))
            .collect();
        counts.sort_unstable();
        counts
    }
}
