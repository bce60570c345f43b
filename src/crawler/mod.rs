//! The crawl runtime: HTTP fetching, HTML parsing, seed loading, the
//! fetcher/parser worker pools, and the orchestrator that supervises them.

mod fetcher;
mod fetcher_pool;
mod orchestrator;
mod parse_job;
mod parser;
mod parser_pool;
mod seed;

pub use fetcher::{build_http_client, fetch_url, fetch_url_with_retry, FetchOutcome, RetryPolicy};
pub use fetcher_pool::FetcherPod;
pub use orchestrator::Orchestrator;
pub use parse_job::ParseJob;
pub use parser::{extract_links_simple, parse_html, ParsedPage};
pub use parser_pool::ParserPod;
pub use seed::{load_seeds, Seed};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl operation: brings up the orchestrator and drives
/// it until a stopping condition or shutdown signal fires.
pub async fn crawl(config: Config) -> Result<(), CrawlError> {
    let orchestrator = Orchestrator::bootstrap(config).await?;
    orchestrator.run().await
}
