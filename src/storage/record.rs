//! Device record type
//!
//! A `DeviceRecord` carries the two required columns (`Brand`, `Model Name`),
//! the optional main image, and an ordered list of specification fields in the
//! order they were discovered on the device page.

/// Column holding the brand display name
pub const BRAND_COLUMN: &str = "Brand";

/// Column holding the device name; the dedup key within a brand
pub const MODEL_NAME_COLUMN: &str = "Model Name";

/// Column holding the main image URL (full extraction policy only)
pub const MODEL_IMAGE_COLUMN: &str = "Model Image";

/// One extracted device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub brand: String,
    pub model_name: String,
    pub image: Option<String>,
    specs: Vec<(String, String)>,
}

impl DeviceRecord {
    pub fn new(brand: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            model_name: model_name.into(),
            image: None,
            specs: Vec::new(),
        }
    }

    /// Returns true if the record already has a column with this name
    pub fn has_column(&self, name: &str) -> bool {
        name == BRAND_COLUMN
            || name == MODEL_NAME_COLUMN
            || (name == MODEL_IMAGE_COLUMN && self.image.is_some())
            || self.specs.iter().any(|(key, _)| key == name)
    }

    /// Adds a specification field and returns the column name it was stored under
    ///
    /// The first occurrence of a name keeps the bare name. Later occurrences get
    /// the first free numeric suffix: `Network`, `Network_1`, `Network_2`, ...
    pub fn insert_spec(&mut self, name: &str, value: impl Into<String>) -> String {
        let key = if self.has_column(name) {
            (1..)
                .map(|n| format!("{}_{}", name, n))
                .find(|candidate| !self.has_column(candidate))
                .unwrap_or_else(|| name.to_string())
        } else {
            name.to_string()
        };

        self.specs.push((key.clone(), value.into()));
        key
    }

    /// Specification fields in discovery order
    pub fn specs(&self) -> &[(String, String)] {
        &self.specs
    }

    /// Every column of the record, in output order
    pub fn columns(&self) -> Vec<(&str, &str)> {
        let mut columns = vec![
            (BRAND_COLUMN, self.brand.as_str()),
            (MODEL_NAME_COLUMN, self.model_name.as_str()),
        ];
        if let Some(image) = &self.image {
            columns.push((MODEL_IMAGE_COLUMN, image.as_str()));
        }
        columns.extend(self.specs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        columns
    }

    /// Value of a column, if the record has it
    pub fn value(&self, column: &str) -> Option<&str> {
        self.columns()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// True when extraction found neither a model name nor any specification
    pub fn is_empty(&self) -> bool {
        self.model_name.trim().is_empty() && self.specs.is_empty()
    }

    /// Replaces carriage returns and line feeds in every value with a space
    pub fn normalize_whitespace(&mut self) {
        self.brand = clean_value(&self.brand);
        self.model_name = clean_value(&self.model_name);
        if let Some(image) = self.image.take() {
            self.image = Some(clean_value(&image));
        }
        for (_, value) in self.specs.iter_mut() {
            *value = clean_value(value);
        }
    }
}

fn clean_value(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}
