//! The hybrid frontier: per-domain append-only files coordinated through
//! the coordination store's ready index, active-claim set, and visited
//! bloom filter.

mod entry;
mod file_manager;
mod hybrid;
mod visited;

pub use entry::FrontierEntry;
pub use file_manager::FrontierFileManager;
pub use hybrid::HybridFrontier;
pub use visited::VisitedSet;
