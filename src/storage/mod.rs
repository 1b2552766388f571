//! Storage module for persisting extracted devices
//!
//! This module handles everything that touches the output directory:
//! - The `DeviceRecord` type and its column layout
//! - Run-wide column discovery (`FeatureSchema`) and per-file headers
//! - Dedup seeding from existing output files
//! - Durable, one-row-at-a-time CSV writes

mod dedup;
mod record;
mod schema;
mod writer;

pub use dedup::DedupIndex;
pub use record::{DeviceRecord, BRAND_COLUMN, MODEL_IMAGE_COLUMN, MODEL_NAME_COLUMN};
pub use schema::{FeatureSchema, FrozenSchema};
pub use writer::{output_file_name, IncrementalWriter};

use crate::OutputError;
use std::path::{Path, PathBuf};

/// Path of a brand's output file inside the output directory
pub fn brand_output_path(output_dir: &Path, brand_id: &str) -> PathBuf {
    output_dir.join(output_file_name(brand_id))
}

/// Opens the writer for a brand's output file
///
/// # Arguments
///
/// * `output_dir` - Directory holding one CSV file per brand
/// * `brand_id` - Brand identifier taken from the brand's listing link
pub fn open_brand_output(output_dir: &Path, brand_id: &str) -> Result<IncrementalWriter, OutputError> {
    IncrementalWriter::open(brand_output_path(output_dir, brand_id))
}
