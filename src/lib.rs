//! Device-Catalog: an incremental device specification harvester
//!
//! This crate walks a paginated device listing site for an operator-supplied set
//! of brands, extracts each device's specification table into a flat record, and
//! appends new records to per-brand CSV files, skipping devices already captured
//! by earlier runs.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Device-Catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Invalid brand phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::BrandPhase,
        to: state::BrandPhase,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// Every variant is fatal at startup: the process exits before any network
/// activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Malformed target list: {0}")]
    Targets(String),

    #[error("Failed to read target list: {0}")]
    Csv(#[from] csv::Error),
}

/// Page fetch errors
///
/// Callers treat every variant as "no document for this path" and move on to
/// the next page, link or brand.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport failure for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Still rate limited after {attempts} attempts: {url}")]
    RateLimited { url: String, attempts: u32 },

    #[error("Cannot resolve path '{path}': {source}")]
    InvalidPath {
        path: String,
        source: ::url::ParseError,
    },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Output file errors
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Record for '{model}' has fields outside the header of {file}: {fields:?}")]
    SchemaViolation {
        file: String,
        model: String,
        fields: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Device-Catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::{Config, ExtractionPolicy, TargetList};
pub use state::BrandPhase;
pub use storage::{DedupIndex, DeviceRecord, FeatureSchema};
