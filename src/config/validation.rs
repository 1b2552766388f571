use crate::config::types::{
    Config, FetcherConfig, InputConfig, OutputConfig, SelectorConfig, SiteConfig, Transport,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    validate_selectors(&config.selectors)?;
    Ok(())
}

/// Validates the site root and index path
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use HTTP or HTTPS",
            config.base_url
        )));
    }

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' cannot be used to resolve relative paths",
            config.base_url
        )));
    }

    if config.brand_index_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "brand-index-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Smallest delay between live requests to the site
pub const MIN_REQUEST_DELAY_MS: u64 = 2_000;

/// Validates fetcher pacing and retry limits
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and 120, got {}",
            config.timeout_secs
        )));
    }

    // Saved mirror pages may be read back without pacing
    if config.transport == Transport::Http && config.request_delay_ms < MIN_REQUEST_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "request-delay-ms must be >= {}ms for the http transport, got {}ms",
            MIN_REQUEST_DELAY_MS, config.request_delay_ms
        )));
    }

    if config.request_delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "request-delay-ms must be <= 60000ms, got {}ms",
            config.request_delay_ms
        )));
    }

    if config.max_rate_limit_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-rate-limit-retries must be <= 10, got {}",
            config.max_rate_limit_retries
        )));
    }

    if config.backoff_factor < 1 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be >= 1, got {}",
            config.backoff_factor
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.transport == Transport::Mirror
        && config
            .mirror_dir
            .as_deref()
            .map_or(true, |dir| dir.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "mirror-dir is required when transport = \"mirror\"".to_string(),
        ));
    }

    Ok(())
}

fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.targets_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "targets-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.brand_table,
        &config.pagination,
        &config.results,
        &config.listing_name,
        &config.title,
        &config.main_image,
        &config.spec_table,
    ] {
        parse_selector(selector)?;
    }

    Ok(())
}

/// Parses a CSS selector, mapping failures to a configuration error
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}
