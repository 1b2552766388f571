//! Configuration module for Device-Catalog
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file and the CSV target list.
//!
//! # Example
//!
//! ```no_run
//! use device_catalog::config::{load_config, load_targets};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("catalog.toml")).unwrap();
//! let targets = load_targets(Path::new(&config.input.targets_path)).unwrap();
//! println!("{} target brands", targets.len());
//! ```

mod parser;
mod targets;
mod types;
mod validation;

// Re-export types
pub use targets::{TargetList, TargetSpec};
pub use types::{
    Config, ExtractionConfig, ExtractionPolicy, FetcherConfig, InputConfig, OutputConfig,
    SelectorConfig, SiteConfig, Transport,
};

// Re-export loader functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, stamp_output_dir, ConfigStamp,
    CONFIG_STAMP_FILE,
};
pub use targets::{load_targets, parse_targets};

pub(crate) use validation::parse_selector;
