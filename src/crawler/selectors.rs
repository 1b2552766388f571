//! Compiled document selectors
//!
//! Selectors come from the `[selectors]` configuration table and are parsed
//! once at startup; an unparsable selector is a configuration error.

use crate::config::{parse_selector, SelectorConfig};
use crate::ConfigError;
use scraper::Selector;

#[derive(Debug, Clone)]
pub struct Selectors {
    pub brand_table: Selector,
    pub pagination: Selector,
    pub results: Selector,
    pub listing_name: Selector,
    pub title: Selector,
    pub main_image: Selector,
    pub spec_table: Selector,
    /// `a[href]`, used inside brand tables, pagination blocks and results
    pub link: Selector,
    /// `tr`, used inside specification tables
    pub row: Selector,
}

impl Selectors {
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            brand_table: parse_selector(&config.brand_table)?,
            pagination: parse_selector(&config.pagination)?,
            results: parse_selector(&config.results)?,
            listing_name: parse_selector(&config.listing_name)?,
            title: parse_selector(&config.title)?,
            main_image: parse_selector(&config.main_image)?,
            spec_table: parse_selector(&config.spec_table)?,
            link: parse_selector("a[href]")?,
            row: parse_selector("tr")?,
        })
    }
}
