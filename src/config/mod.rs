//! Configuration loading, parsing, and validation for a crawl run.
//!
//! # Example
//!
//! ```no_run
//! use podcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("data dir: {}", config.crawler.data_dir);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, PodConfig, StoreConfig, UserAgentConfig, DEFAULT_NON_TEXT_EXTENSIONS,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate_domain_pattern;
