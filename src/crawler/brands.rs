//! Brand resolution
//!
//! Turns the site's brand index into the ordered list of brands the operator
//! asked for.

use crate::crawler::fetcher::RateLimitedFetcher;
use crate::crawler::selectors::Selectors;
use scraper::Html;
use std::collections::HashSet;

/// A target brand found on the brand index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandEntry {
    /// Token before the first hyphen of the listing link; names the output file
    pub id: String,
    /// Brand name as shown on the index
    pub display_name: String,
    /// Site-relative link to the brand's listing page
    pub index_path: String,
}

impl BrandEntry {
    /// Key used for dedup lookups and output file matching
    pub fn key(&self) -> String {
        self.id.to_lowercase()
    }
}

/// Derives a brand identifier from its listing link
///
/// `samsung-phones-9.php` -> `samsung`
pub fn brand_id_from_path(path: &str) -> String {
    let file = path.trim().rsplit('/').next().unwrap_or("");
    file.split('-').next().unwrap_or("").to_string()
}

/// Extracts target brands from a parsed brand index
///
/// Only the first element matching the brand table selector is read. Brands
/// are kept in page order; anchors whose case-folded text is not in `targets`
/// are dropped.
pub fn parse_brand_index(
    document: &Html,
    selectors: &Selectors,
    targets: &HashSet<String>,
) -> Vec<BrandEntry> {
    let Some(table) = document.select(&selectors.brand_table).next() else {
        tracing::warn!("Brand index has no brand table");
        return Vec::new();
    };

    let mut brands: Vec<BrandEntry> = Vec::new();
    for anchor in table.select(&selectors.link) {
        // The anchor text is followed by a nested device count; the first text
        // node is the brand name
        let Some(display_name) = anchor
            .text()
            .map(str::trim)
            .find(|text| !text.is_empty())
        else {
            continue;
        };

        if !targets.contains(&display_name.to_lowercase()) {
            continue;
        }

        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        let id = brand_id_from_path(href);
        if id.is_empty() || brands.iter().any(|b| b.id == id) {
            continue;
        }

        brands.push(BrandEntry {
            id,
            display_name: display_name.to_string(),
            index_path: href.trim().to_string(),
        });
    }

    brands
}

/// Resolves target brands against the live brand index
pub struct BrandResolver<'a> {
    fetcher: &'a RateLimitedFetcher,
    selectors: &'a Selectors,
}

impl<'a> BrandResolver<'a> {
    pub fn new(fetcher: &'a RateLimitedFetcher, selectors: &'a Selectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Fetches the brand index once and returns the target brands in page order
    ///
    /// A failed fetch yields an empty list: there is nothing to do, but it is
    /// not fatal.
    pub async fn resolve(&self, index_path: &str, targets: &HashSet<String>) -> Vec<BrandEntry> {
        let document = match self.fetcher.fetch(index_path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Cannot fetch brand index {}: {}", index_path, e);
                return Vec::new();
            }
        };

        let brands = parse_brand_index(&document.parse(), self.selectors, targets);

        for wanted in targets {
            if !brands.iter().any(|b| b.display_name.to_lowercase() == *wanted) {
                tracing::warn!("Target brand '{}' not found on the brand index", wanted);
            }
        }

        tracing::info!("Resolved {} of {} target brands", brands.len(), targets.len());
        brands
    }
}
