use serde::Deserialize;

/// Main configuration structure for Device-Catalog
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// The site being catalogued
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root URL every relative path is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Relative path of the page listing every brand
    #[serde(rename = "brand-index-path", default = "default_brand_index_path")]
    pub brand_index_path: String,
}

/// Which transport serves pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Live HTTP requests against the site
    Http,
    /// Saved pages read from a local directory
    Mirror,
}

/// Fetch behaviour: pacing, timeouts and rate-limit recovery
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_transport")]
    pub transport: Transport,

    /// Directory holding the saved site when `transport = "mirror"`
    #[serde(rename = "mirror-dir", default)]
    pub mirror_dir: Option<String>,

    /// Fixed delay before every request (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Transport timeout per request (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Base cooldown after an HTTP 429 (milliseconds)
    #[serde(
        rename = "rate-limit-cooldown-ms",
        default = "default_rate_limit_cooldown_ms"
    )]
    pub rate_limit_cooldown_ms: u64,

    /// Retries allowed after rate-limited responses before giving up
    #[serde(
        rename = "max-rate-limit-retries",
        default = "default_max_rate_limit_retries"
    )]
    pub max_rate_limit_retries: u32,

    /// Cooldown multiplier applied per additional rate-limited attempt
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// User-Agent header sent by the HTTP transport
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Which specification rows survive extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPolicy {
    /// Keep every two-cell row and grow the schema as names are discovered
    #[default]
    Full,
    /// Keep only price-related rows; no main image column
    Narrow,
}

impl std::str::FromStr for ExtractionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "narrow" => Ok(Self::Narrow),
            other => Err(format!("unknown extraction policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub policy: ExtractionPolicy,
}

/// Input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Path to the CSV file with `Brand` and optional `Model` columns
    #[serde(rename = "targets-path")]
    pub targets_path: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one CSV file per brand
    pub directory: String,
}

/// CSS selectors for every element the crawler reads
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Table on the brand index holding one anchor per brand (first match used)
    #[serde(rename = "brand-table", default = "default_brand_table")]
    pub brand_table: String,

    /// Pagination block on a brand listing page
    #[serde(default = "default_pagination")]
    pub pagination: String,

    /// Container of device anchors on a listing page
    #[serde(default = "default_results")]
    pub results: String,

    /// Element inside a device anchor carrying its display name
    #[serde(rename = "listing-name", default = "default_listing_name")]
    pub listing_name: String,

    /// Device page title
    #[serde(default = "default_title")]
    pub title: String,

    /// Main device image (its `src` is captured)
    #[serde(rename = "main-image", default = "default_main_image")]
    pub main_image: String,

    /// Tables scanned for two-cell specification rows
    #[serde(rename = "spec-table", default = "default_spec_table")]
    pub spec_table: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            brand_table: default_brand_table(),
            pagination: default_pagination(),
            results: default_results(),
            listing_name: default_listing_name(),
            title: default_title(),
            main_image: default_main_image(),
            spec_table: default_spec_table(),
        }
    }
}

impl FetcherConfig {
    /// Builds a fetcher configuration with the documented defaults
    pub fn with_defaults(transport: Transport) -> Self {
        Self {
            transport,
            mirror_dir: None,
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            backoff_factor: default_backoff_factor(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_brand_index_path() -> String {
    "makers.php3".to_string()
}

fn default_transport() -> Transport {
    Transport::Http
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_rate_limit_cooldown_ms() -> u64 {
    30_000
}

fn default_max_rate_limit_retries() -> u32 {
    3
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_brand_table() -> String {
    "table".to_string()
}

fn default_pagination() -> String {
    ".nav-pages".to_string()
}

fn default_results() -> String {
    ".section-body".to_string()
}

fn default_listing_name() -> String {
    "strong".to_string()
}

fn default_title() -> String {
    ".specs-phone-name-title".to_string()
}

fn default_main_image() -> String {
    ".specs-photo-main img".to_string()
}

fn default_spec_table() -> String {
    "table".to_string()
}
