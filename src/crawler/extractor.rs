//! Specification extraction
//!
//! Turns one device page into a `DeviceRecord`: the page title becomes the
//! model name, the main image URL is captured under the full policy, and every
//! two-cell table row becomes a specification field.

use crate::config::ExtractionPolicy;
use crate::crawler::fetcher::RateLimitedFetcher;
use crate::crawler::listing::ModelLink;
use crate::crawler::selectors::Selectors;
use crate::storage::{DeviceRecord, FeatureSchema};
use scraper::{ElementRef, Html};
use std::collections::HashSet;

/// Outcome of extracting one device page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Record(DeviceRecord),
    /// Fetch failed, or the page had neither a title nor specification rows
    Empty,
}

/// Concatenated text of an element, trimmed
fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Returns true if the policy keeps a field of this name
fn policy_keeps(policy: ExtractionPolicy, name: &str) -> bool {
    match policy {
        ExtractionPolicy::Full => true,
        ExtractionPolicy::Narrow => name.to_lowercase().contains("price"),
    }
}

/// Builds a record from a parsed device page
///
/// # Arguments
///
/// * `document` - Parsed device page
/// * `selectors` - Compiled document selectors
/// * `policy` - Which specification rows to keep
/// * `brand` - Brand display name stored in the `Brand` column
///
/// # Returns
///
/// The record, with a blank model name when the page has no title element.
pub fn parse_specifications(
    document: &Html,
    selectors: &Selectors,
    policy: ExtractionPolicy,
    brand: &str,
) -> DeviceRecord {
    let model_name = document
        .select(&selectors.title)
        .next()
        .map(|title| element_text(&title))
        .unwrap_or_default();

    let mut record = DeviceRecord::new(brand, model_name);

    if policy == ExtractionPolicy::Full {
        record.image = document
            .select(&selectors.main_image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| src.trim().to_string())
            .filter(|src| !src.is_empty());
    }

    // Nested tables match the table selector more than once; read each row once
    let mut seen_rows = HashSet::new();

    for table in document.select(&selectors.spec_table) {
        for row in table.select(&selectors.row) {
            if !seen_rows.insert(row.id()) {
                continue;
            }

            let cells: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| cell.value().name() == "td")
                .collect();
            if cells.len() != 2 {
                continue;
            }

            let name = element_text(&cells[0]).replace(['\n', '\r'], "");
            if name.is_empty() || !policy_keeps(policy, &name) {
                continue;
            }
            let value = element_text(&cells[1]).replace(['\n', '\r'], "");

            record.insert_spec(&name, value);
        }
    }

    record
}

/// Fetches device pages and extracts their records
pub struct SpecificationExtractor<'a> {
    fetcher: &'a RateLimitedFetcher,
    selectors: &'a Selectors,
    policy: ExtractionPolicy,
}

impl<'a> SpecificationExtractor<'a> {
    pub fn new(
        fetcher: &'a RateLimitedFetcher,
        selectors: &'a Selectors,
        policy: ExtractionPolicy,
    ) -> Self {
        Self {
            fetcher,
            selectors,
            policy,
        }
    }

    pub fn policy(&self) -> ExtractionPolicy {
        self.policy
    }

    /// Extracts one device page, appending newly seen field names to `schema`
    pub async fn extract(
        &self,
        link: &ModelLink,
        brand_display_name: &str,
        schema: &mut FeatureSchema,
    ) -> Extraction {
        let document = match self.fetcher.fetch(&link.relative_path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Skipping device page {}: {}", link.relative_path, e);
                return Extraction::Empty;
            }
        };

        let mut record = parse_specifications(
            &document.parse(),
            self.selectors,
            self.policy,
            brand_display_name,
        );
        record.normalize_whitespace();

        if record.model_name.is_empty() {
            tracing::warn!("No model name on {}", document.url());
        }

        if record.is_empty() {
            return Extraction::Empty;
        }

        let added = schema.absorb(&record);
        if added > 0 {
            tracing::debug!("Feature schema grew by {} columns to {}", added, schema.len());
        }

        tracing::debug!(
            "Extracted {} fields for '{}'",
            record.specs().len(),
            record.model_name
        );
        Extraction::Record(record)
    }
}
