//! Operator-supplied target list
//!
//! The target list is a CSV file with a required `Brand` column and an optional
//! `Model` column. A brand listed without models is crawled in "capture all new
//! models" mode.

use crate::ConfigError;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// One target brand and the models wanted from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Case-folded brand name
    pub brand: String,

    /// Wanted models in file order; empty means every new model
    pub models: Vec<String>,
}

/// The full, immutable target list
#[derive(Debug, Clone, Default)]
pub struct TargetList {
    specs: Vec<TargetSpec>,
}

impl TargetList {
    /// Builds a target list from already-parsed specs, merging repeated brands
    pub fn new(specs: impl IntoIterator<Item = TargetSpec>) -> Self {
        let mut list = Self::default();
        for spec in specs {
            let brand = spec.brand.trim().to_lowercase();
            for model in spec.models {
                list.push(&brand, Some(&model));
            }
            list.push(&brand, None);
        }
        list
    }

    fn push(&mut self, brand: &str, model: Option<&str>) {
        let index = match self.specs.iter().position(|s| s.brand == brand) {
            Some(index) => index,
            None => {
                self.specs.push(TargetSpec {
                    brand: brand.to_string(),
                    models: Vec::new(),
                });
                self.specs.len() - 1
            }
        };

        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            let models = &mut self.specs[index].models;
            if !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
    }

    /// Case-folded brand names, for brand resolution
    pub fn brands(&self) -> HashSet<String> {
        self.specs.iter().map(|s| s.brand.clone()).collect()
    }

    /// Wanted models for a brand (matched case-insensitively)
    pub fn models_for(&self, brand: &str) -> &[String] {
        let brand = brand.trim().to_lowercase();
        self.specs
            .iter()
            .find(|s| s.brand == brand)
            .map(|s| s.models.as_slice())
            .unwrap_or(&[])
    }

    pub fn specs(&self) -> &[TargetSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Loads the target list from a CSV file
///
/// # Errors
///
/// * `ConfigError::Csv` - The file cannot be read or is not valid CSV
/// * `ConfigError::Targets` - The `Brand` column is missing, a row has an
///   empty brand, or the list is empty
pub fn load_targets(path: &Path) -> Result<TargetList, ConfigError> {
    let reader = csv::Reader::from_path(path)?;
    read_targets(reader)
}

/// Parses a target list from any CSV source
pub fn parse_targets<R: Read>(source: R) -> Result<TargetList, ConfigError> {
    read_targets(csv::Reader::from_reader(source))
}

fn read_targets<R: Read>(mut reader: csv::Reader<R>) -> Result<TargetList, ConfigError> {
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let brand_idx = column("Brand")
        .ok_or_else(|| ConfigError::Targets("missing required 'Brand' column".to_string()))?;
    let model_idx = column("Model");

    let mut list = TargetList::default();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let brand = record.get(brand_idx).unwrap_or("").trim().to_lowercase();
        if brand.is_empty() {
            return Err(ConfigError::Targets(format!(
                "row {} has an empty Brand",
                row + 2
            )));
        }
        let model = model_idx.and_then(|idx| record.get(idx));
        list.push(&brand, model);
    }

    if list.is_empty() {
        return Err(ConfigError::Targets("target list has no rows".to_string()));
    }

    tracing::debug!("Loaded {} target brands", list.len());
    Ok(list)
}
