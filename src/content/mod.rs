//! Content-to-disk persistence: an optional collaborator that writes
//! fetched bodies to `{data_dir}/content/{prefix}/{hash}.html`. Disabled by
//! default — the parser and frontier work fine with an empty `content_path`
//! on every visited record.

use crate::CrawlError;
use std::path::PathBuf;

pub struct ContentStore {
    data_dir: PathBuf,
    enabled: bool,
}

impl ContentStore {
    /// `mode` is the `content-storage` config value: `"disabled"` turns the
    /// collaborator into a no-op; any other value enables writing under
    /// `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, mode: &str) -> Self {
        Self {
            data_dir: data_dir.into(),
            enabled: mode != "disabled",
        }
    }

    /// Writes `body` for `url`, returning the path (relative to `data_dir`)
    /// it was stored at, or an empty string when storage is disabled.
    pub async fn store(&self, url: &str, body: &str) -> Result<String, CrawlError> {
        if !self.enabled {
            return Ok(String::new());
        }

        let relative_path = crate::store::content_relative_path(url);
        let full_path = self.data_dir.join(&relative_path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CrawlError::TransientIo {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&full_path, body)
            .await
            .map_err(|source| CrawlError::TransientIo {
                path: full_path.display().to_string(),
                source,
            })?;
        Ok(relative_path)
    }
}
