//! Robots.txt handling, manual exclusions, and per-domain crawl-delay
//! enforcement.

mod enforcer;
mod robots_cache;
mod robots_parser;

pub use enforcer::{load_exclusion_patterns, PolitenessEnforcer, UrlVerdict};
pub use robots_parser::ParsedRobots;
