//! Page transports
//!
//! The pipeline only needs "give me the status and body for this URL". Two
//! interchangeable transports provide it:
//! - `HttpSource`: live requests through reqwest
//! - `MirrorSource`: pages saved on disk under their site-relative paths

use crate::config::{FetcherConfig, Transport};
use crate::{CatalogError, ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Status and body of one response, before any rate-limit handling
#[derive(Debug, Clone)]
pub struct RawPage {
    pub status: u16,
    pub body: String,
}

impl RawPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// A transport able to fetch one page at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url`, returning any HTTP status as data and only transport
    /// failures as errors
    async fn get(&self, url: &Url) -> Result<RawPage, FetchError>;

    /// Short transport name for logs
    fn name(&self) -> &'static str;
}

/// Builds an HTTP client with the configured user agent and timeout
///
/// # Example
///
/// ```no_run
/// use device_catalog::config::{FetcherConfig, Transport};
/// use device_catalog::crawler::build_http_client;
///
/// let config = FetcherConfig::with_defaults(Transport::Http);
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Live HTTP transport
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn get(&self, url: &Url) -> Result<RawPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        Ok(RawPage { status, body })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn classify_reqwest_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Transport {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Offline transport reading saved pages from a directory
///
/// `https://site/acme-phones-1.php` is served from `<root>/acme-phones-1.php`;
/// the site root itself maps to `<root>/index.html`. Missing files answer 404.
pub struct MirrorSource {
    root: PathBuf,
}

impl MirrorSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local file backing a URL
    pub fn file_for(&self, url: &Url) -> PathBuf {
        let relative = url.path().trim_start_matches('/');
        if relative.is_empty() {
            self.root.join("index.html")
        } else {
            self.root.join(relative)
        }
    }
}

#[async_trait]
impl PageSource for MirrorSource {
    async fn get(&self, url: &Url) -> Result<RawPage, FetchError> {
        let path = self.file_for(url);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(RawPage { status: 200, body }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RawPage {
                status: 404,
                body: String::new(),
            }),
            Err(e) => Err(FetchError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mirror"
    }
}

/// Builds the transport selected by the configuration
pub fn build_source(config: &FetcherConfig) -> Result<Box<dyn PageSource>, CatalogError> {
    match config.transport {
        Transport::Http => Ok(Box::new(HttpSource::new(config)?)),
        Transport::Mirror => {
            let dir = config.mirror_dir.as_deref().ok_or_else(|| {
                ConfigError::Validation("mirror-dir is required for the mirror transport".to_string())
            })?;
            Ok(Box::new(MirrorSource::new(dir)))
        }
    }
}
