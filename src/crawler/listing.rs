//! Model link collection
//!
//! For one brand, walks the listing page and its pagination to collect links
//! to device pages, dropping devices already in the dedup index and devices
//! outside the brand's target models.

use crate::crawler::brands::BrandEntry;
use crate::crawler::fetcher::RateLimitedFetcher;
use crate::crawler::selectors::Selectors;
use crate::storage::DedupIndex;
use scraper::Html;

/// A device page still to be extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLink {
    pub brand: BrandEntry,
    pub relative_path: String,
    /// Listing display name, or the name derived from the path
    pub derived_name: Option<String>,
}

/// One anchor found in a listing's results container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub path: String,
    /// Display name when the listing carries one
    pub name: Option<String>,
}

impl ListingEntry {
    /// The listing name, falling back to the name derived from the path
    pub fn model_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| derive_model_name(&self.path))
    }
}

/// Keeps only links whose name mentions one of the brand's target models
///
/// Matching is a case-insensitive substring test. With no target models every
/// link is kept.
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    models: Vec<String>,
}

impl ModelFilter {
    pub fn new(models: &[String]) -> Self {
        Self {
            models: models
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.models.is_empty()
    }

    /// Returns true if any target model appears in any of the names
    pub fn keeps(&self, names: &[&str]) -> bool {
        if self.models.is_empty() {
            return true;
        }
        names.iter().any(|name| {
            let name = name.to_lowercase();
            self.models.iter().any(|model| name.contains(model.as_str()))
        })
    }
}

/// Derives a model name from a device link
///
/// The file extension and everything from the first hyphen are dropped,
/// underscores become spaces, and the result is upper-cased:
/// `acme_x1-1.php` -> `ACME X1`.
pub fn derive_model_name(path: &str) -> String {
    let file = path.trim().rsplit('/').next().unwrap_or("");
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    let base = stem.split('-').next().unwrap_or(stem);
    base.replace('_', " ").trim().to_uppercase()
}

/// Orders the listing pages: the entry page first, then pagination links as
/// displayed
///
/// Empty and fragment-only links and repeats (such as "next" arrows pointing
/// at an already-listed page) are dropped.
pub fn pagination_order(listing_path: &str, document: &Html, selectors: &Selectors) -> Vec<String> {
    let mut pages = vec![listing_path.trim().to_string()];

    let Some(nav) = document.select(&selectors.pagination).next() else {
        return pages;
    };

    for anchor in nav.select(&selectors.link) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        if !pages.iter().any(|p| p == href) {
            pages.push(href.to_string());
        }
    }

    pages
}

/// Reads device anchors from a listing page's results container
pub fn parse_listing_entries(document: &Html, selectors: &Selectors) -> Vec<ListingEntry> {
    let mut entries = Vec::new();

    for container in document.select(&selectors.results) {
        for anchor in container.select(&selectors.link) {
            let Some(href) = anchor.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }

            let name = anchor
                .select(&selectors.listing_name)
                .next()
                .map(|el| {
                    el.text()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .filter(|name| !name.is_empty());

            entries.push(ListingEntry {
                path: href.to_string(),
                name,
            });
        }
    }

    entries
}

/// Result of walking one brand's listing
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Links still needing extraction, in listing order
    pub links: Vec<ModelLink>,
    /// Listing pages successfully fetched
    pub pages_visited: usize,
    /// Entries skipped because the dedup index already knows them
    pub skipped_known: usize,
    /// Entries dropped by the model filter
    pub filtered_out: usize,
}

impl Listing {
    /// Applies dedup, model filter and repeat suppression to one page's entries
    pub fn absorb(
        &mut self,
        entries: Vec<ListingEntry>,
        brand: &BrandEntry,
        dedup: &DedupIndex,
        filter: &ModelFilter,
    ) {
        let brand_key = brand.key();

        for entry in entries {
            if self.links.iter().any(|l| l.relative_path == entry.path) {
                continue;
            }

            let name = entry.model_name();
            // Listings often omit the brand from the device name
            let prefixed = if name
                .to_lowercase()
                .starts_with(&brand.display_name.to_lowercase())
            {
                name.clone()
            } else {
                format!("{} {}", brand.display_name, name)
            };

            if dedup.contains(&brand_key, &name) || dedup.contains(&brand_key, &prefixed) {
                tracing::debug!("Skipping known model '{}'", name);
                self.skipped_known += 1;
                continue;
            }

            if !filter.keeps(&[name.as_str(), prefixed.as_str()]) {
                tracing::trace!("Model '{}' not in target list", name);
                self.filtered_out += 1;
                continue;
            }

            if !filter.is_unrestricted() {
                tracing::info!("Found matching model: {}", name);
            }

            self.links.push(ModelLink {
                brand: brand.clone(),
                relative_path: entry.path,
                derived_name: Some(name),
            });
        }
    }
}

/// Walks a brand's listing pages
pub struct ModelLinkCollector<'a> {
    fetcher: &'a RateLimitedFetcher,
    selectors: &'a Selectors,
}

impl<'a> ModelLinkCollector<'a> {
    pub fn new(fetcher: &'a RateLimitedFetcher, selectors: &'a Selectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Collects the links of `entry` that still need extraction
    ///
    /// Listing pages that fail to fetch are skipped; if the entry page itself
    /// fails the result is empty.
    pub async fn collect(
        &self,
        entry: &BrandEntry,
        dedup: &DedupIndex,
        filter: &ModelFilter,
    ) -> Listing {
        let mut listing = Listing::default();

        let first = match self.fetcher.fetch(&entry.index_path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Cannot fetch listing for {}: {}", entry.display_name, e);
                return listing;
            }
        };

        let (pages, first_entries) = {
            let html = first.parse();
            (
                pagination_order(&entry.index_path, &html, self.selectors),
                parse_listing_entries(&html, self.selectors),
            )
        };
        listing.pages_visited += 1;
        listing.absorb(first_entries, entry, dedup, filter);

        if pages.len() > 1 {
            tracing::debug!("{} has {} listing pages", entry.display_name, pages.len());
        }

        for page in pages.iter().skip(1) {
            let document = match self.fetcher.fetch(page).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("Skipping listing page {}: {}", page, e);
                    continue;
                }
            };

            let entries = parse_listing_entries(&document.parse(), self.selectors);
            listing.pages_visited += 1;
            listing.absorb(entries, entry, dedup, filter);
        }

        tracing::info!(
            "{}: {} candidate links ({} already known, {} not targeted) across {} pages",
            entry.display_name,
            listing.links.len(),
            listing.skipped_known,
            listing.filtered_out,
            listing.pages_visited
        );

        listing
    }
}
