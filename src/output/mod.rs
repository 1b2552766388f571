//! Output module for reporting run results
//!
//! This module handles:
//! - Recording per-run counters while the coordinator works
//! - Printing run statistics when a run ends
//! - Summarising the per-brand output files for `--stats`

pub mod stats;

pub use stats::{
    load_output_summary, print_output_summary, print_statistics, BrandFileSummary, RunStatistics,
};
