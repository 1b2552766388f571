//! Crawler module for page fetching and device extraction
//!
//! This module contains the core crawling logic, including:
//! - Interchangeable page transports behind `PageSource`
//! - Paced fetching with bounded rate-limit recovery
//! - Brand resolution, listing traversal and specification extraction
//! - Overall crawl coordination

mod brands;
mod coordinator;
mod extractor;
mod fetcher;
mod listing;
mod selectors;
mod source;

pub use brands::{brand_id_from_path, parse_brand_index, BrandEntry, BrandResolver};
pub use coordinator::{run_crawl, Coordinator};
pub use extractor::{parse_specifications, Extraction, SpecificationExtractor};
pub use fetcher::{Document, RateLimitedFetcher, RetryPolicy};
pub use listing::{
    derive_model_name, pagination_order, parse_listing_entries, Listing, ListingEntry, ModelFilter,
    ModelLink, ModelLinkCollector,
};
pub use selectors::Selectors;
pub use source::{build_http_client, build_source, HttpSource, MirrorSource, PageSource, RawPage};

use crate::config::{Config, TargetList};
use crate::output::RunStatistics;
use crate::CatalogError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Seed the dedup index from the output directory
/// 2. Build the configured transport
/// 3. Resolve target brands on the brand index
/// 4. Collect, extract and persist new devices brand by brand
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `targets` - Brands and models to collect
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Crawl completed
/// * `Err(CatalogError)` - Setup failed or an output file could not be written
pub async fn crawl(config: Config, targets: TargetList) -> Result<RunStatistics, CatalogError> {
    run_crawl(config, targets).await
}
