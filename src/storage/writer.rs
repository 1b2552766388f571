//! Per-brand CSV writer with one durable row per record
//!
//! Each accepted record is appended, flushed, and synced to disk before
//! `persist` returns, so an interrupted run always leaves a readable file that
//! the next run's dedup seeding can pick up.

use crate::storage::schema::{FeatureSchema, FrozenSchema};
use crate::storage::DeviceRecord;
use crate::OutputError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// File name for a brand's output (`acme` -> `Acme.csv`)
///
/// The first letter of every alphabetic run is upper-cased and the rest
/// lower-cased, so `sony_ericsson` becomes `Sony_Ericsson.csv`.
pub fn output_file_name(brand_id: &str) -> String {
    let mut name = String::with_capacity(brand_id.len() + 4);
    let mut previous_alphabetic = false;
    for c in brand_id.chars() {
        if c.is_alphabetic() {
            if previous_alphabetic {
                name.extend(c.to_lowercase());
            } else {
                name.extend(c.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            name.push(c);
            previous_alphabetic = false;
        }
    }
    name.push_str(".csv");
    name
}

/// Appends records to one brand's output file
pub struct IncrementalWriter {
    path: PathBuf,
    header: Option<FrozenSchema>,
    writer: Option<csv::Writer<File>>,
}

impl IncrementalWriter {
    /// Opens the writer for `path`
    ///
    /// If the file already exists with a header, that header becomes the frozen
    /// schema. Otherwise the file is created on the first `persist`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, OutputError> {
        let path = path.into();

        let header = if path.is_file() && std::fs::metadata(&path)?.len() > 0 {
            let mut reader = csv::Reader::from_path(&path)?;
            let headers = reader.headers()?;
            Some(FrozenSchema::from_header(headers.iter()))
        } else {
            None
        };

        if let Some(header) = &header {
            tracing::debug!(
                "Appending to {} ({} columns)",
                path.display(),
                header.columns().len()
            );
        }

        Ok(Self {
            path,
            header,
            writer: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The frozen header, once the file has one
    pub fn header(&self) -> Option<&FrozenSchema> {
        self.header.as_ref()
    }

    /// Writes one record under the file's frozen header
    ///
    /// On first use the file is created with `schema` frozen as its header.
    ///
    /// # Errors
    ///
    /// * `OutputError::SchemaViolation` - The record has columns the header
    ///   lacks; nothing is written
    /// * `OutputError::Io` / `OutputError::Csv` - The write or sync failed
    pub fn persist(
        &mut self,
        record: &DeviceRecord,
        schema: &FeatureSchema,
    ) -> Result<(), OutputError> {
        let header = match &self.header {
            Some(header) => header.clone(),
            None => schema.freeze(),
        };

        let violations = header.violations(record);
        if !violations.is_empty() {
            return Err(OutputError::SchemaViolation {
                file: self.path.display().to_string(),
                model: record.model_name.clone(),
                fields: violations,
            });
        }

        if self.header.is_none() {
            self.create_with_header(header.clone())?;
        }

        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new().append(true).open(&self.path)?;
                csv::Writer::from_writer(file)
            }
        };
        let writer = self.writer.insert(writer);

        writer.write_record(header.row_for(record))?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        Ok(())
    }

    fn create_with_header(&mut self, header: FrozenSchema) -> Result<(), OutputError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header.columns())?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        tracing::info!(
            "Created {} with {} columns",
            self.path.display(),
            header.columns().len()
        );

        self.header = Some(header);
        self.writer = Some(writer);
        Ok(())
    }
}
