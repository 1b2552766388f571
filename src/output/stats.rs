//! Run statistics and output directory summaries
//!
//! `RunStatistics` is filled in by the coordinator while it runs and printed
//! when the run ends. `load_output_summary` reads the output directory for the
//! `--stats` command.

use crate::storage::MODEL_NAME_COLUMN;
use crate::CatalogError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// Counters for one crawl run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Target brands found on the brand index
    pub brands_resolved: usize,

    /// Resolved brands with no candidate links
    pub brands_skipped: usize,

    /// Links that reached extraction
    pub candidates: usize,

    /// Records appended to output files
    pub persisted: usize,

    /// Records dropped by the post-extraction dedup check
    pub duplicates: usize,

    /// Device pages that yielded nothing usable
    pub empty: usize,

    /// Records dropped for lacking a model name
    pub missing_name: usize,

    /// Records rejected for fields outside their file's header
    pub schema_violations: usize,

    /// Requests sent, retries included
    pub requests: u64,

    /// Rate-limited responses received
    pub rate_limited: u64,

    /// Records appended per brand display name
    pub persisted_by_brand: BTreeMap<String, usize>,
}

impl RunStatistics {
    /// Starts a new set of counters stamped with the current time
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            brands_resolved: 0,
            brands_skipped: 0,
            candidates: 0,
            persisted: 0,
            duplicates: 0,
            empty: 0,
            missing_name: 0,
            schema_violations: 0,
            requests: 0,
            rate_limited: 0,
            persisted_by_brand: BTreeMap::new(),
        }
    }

    pub fn record_persisted(&mut self, brand: &str) {
        self.persisted += 1;
        *self.persisted_by_brand.entry(brand.to_string()).or_insert(0) += 1;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Run duration in seconds, once finished
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Candidates that were not persisted
    pub fn dropped(&self) -> usize {
        self.empty + self.duplicates + self.missing_name + self.schema_violations
    }
}

/// Prints run statistics to stdout
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    if let Some(finished) = stats.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(seconds) = stats.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    println!(
        "  Brands: {} resolved, {} without new models",
        stats.brands_resolved, stats.brands_skipped
    );
    println!(
        "  Requests: {} ({} rate limited)",
        stats.requests, stats.rate_limited
    );
    println!();

    println!("Devices:");
    println!("  Candidates: {}", stats.candidates);
    println!("  Persisted: {}", stats.persisted);
    println!("  Duplicates: {}", stats.duplicates);
    println!("  Empty pages: {}", stats.empty);
    println!("  Missing model name: {}", stats.missing_name);
    println!("  Schema violations: {}", stats.schema_violations);
    println!();

    if !stats.persisted_by_brand.is_empty() {
        println!("New Devices by Brand:");
        for (brand, count) in &stats.persisted_by_brand {
            println!("  {}: {}", brand, count);
        }
        println!();
    }
}

/// One per-brand output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandFileSummary {
    /// File name, e.g. `Acme.csv`
    pub file: String,
    /// Header width
    pub columns: usize,
    /// Data rows
    pub rows: usize,
}

/// Summarises every CSV file in the output directory, sorted by file name
///
/// A missing directory yields an empty summary.
pub fn load_output_summary(output_dir: &Path) -> Result<Vec<BrandFileSummary>, CatalogError> {
    let entries = match std::fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut summaries = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv || !path.is_file() {
            continue;
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let columns = reader.headers()?.len();
        let mut rows = 0;
        for record in reader.records() {
            record?;
            rows += 1;
        }

        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        summaries.push(BrandFileSummary {
            file,
            columns,
            rows,
        });
    }

    summaries.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(summaries)
}

/// Prints the output directory summary to stdout
pub fn print_output_summary(output_dir: &Path, summaries: &[BrandFileSummary]) {
    println!("=== Output Summary: {} ===\n", output_dir.display());

    if summaries.is_empty() {
        println!("  No output files yet");
        return;
    }

    for summary in summaries {
        println!(
            "  {}: {} devices, {} columns",
            summary.file, summary.rows, summary.columns
        );
    }

    let total: usize = summaries.iter().map(|s| s.rows).sum();
    println!();
    println!(
        "Total: {} devices across {} brands (keyed by '{}')",
        total,
        summaries.len(),
        MODEL_NAME_COLUMN
    );
}
