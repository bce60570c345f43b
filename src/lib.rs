//! podcrawl: a polite, high-throughput, single-machine web crawler core.
//!
//! Three subsystems compose the crawl loop: the [`frontier`] (per-domain
//! append-only files coordinated through the [`store`]), the [`politeness`]
//! layer (robots.txt, crawl-delay, manual exclusions), and the pod-based
//! [`crawler`] runtime (fetcher pods, parser pods, orchestrator).

pub mod config;
pub mod content;
pub mod crawler;
pub mod frontier;
pub mod metrics;
pub mod politeness;
pub mod store;
pub mod url;

use thiserror::Error;

/// The closed set of error kinds the core branches on, per the design note
/// replacing dynamic error hierarchies with typed kinds: callers match on
/// kind, not on a class hierarchy.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("transient store error: {0}")]
    TransientStore(#[from] store::StoreError),

    #[error("transient I/O error on {path}: {source}")]
    TransientIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transient HTTP error fetching {url}: {source}")]
    TransientHttp {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("parse failed for {url}: {message}")]
    ParseFailed { url: String, message: String },

    #[error("policy rejected {url}: {reason}")]
    PolicyReject { url: String, reason: String },

    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<ConfigError> for CrawlError {
    fn from(e: ConfigError) -> Self {
        CrawlError::Fatal(format!("configuration error: {e}"))
    }
}

impl From<UrlError> for CrawlError {
    fn from(e: UrlError) -> Self {
        CrawlError::ParseFailed {
            url: String::new(),
            message: e.to_string(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("failed to parse URL: {0}")]
    Parse(String),

    #[error("invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("missing domain in URL")]
    MissingDomain,

    #[error("malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for core crawl operations.
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations.
pub type UrlResult<T> = std::result::Result<T, UrlError>;

pub use config::Config;
pub use url::{extract_domain, is_non_text_resource, matches_wildcard, normalize_url};
