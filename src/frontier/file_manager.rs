use super::entry::FrontierEntry;
use crate::CrawlError;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Manages the per-domain append-only frontier files on disk.
///
/// Appends for a given domain are serialized by a per-domain mutex held only
/// for the duration of the write; reads never take the mutex, since offsets
/// advance monotonically and writers only ever append complete lines.
pub struct FrontierFileManager {
    data_dir: PathBuf,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FrontierFileManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_locks: DashMap::new(),
        }
    }

    fn file_path(&self, domain: &str) -> PathBuf {
        self.data_dir
            .join(crate::store::frontier_relative_path(domain))
    }

    fn lock_for(&self, domain: &str) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Appends `entries` to `domain`'s frontier file, creating the file and
    /// its parent directory on first write. Returns `(bytes_written, new_size)`.
    pub async fn append(
        &self,
        domain: &str,
        entries: &[FrontierEntry],
    ) -> Result<(u64, u64), CrawlError> {
        let path = self.file_path(domain);
        let lock = self.lock_for(domain);
        let _guard = lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CrawlError::TransientIo {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&entry.serialize());
        }
        let bytes_written = buf.len() as u64;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| CrawlError::TransientIo {
                path: path.display().to_string(),
                source,
            })?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|source| CrawlError::TransientIo {
                path: path.display().to_string(),
                source,
            })?;

        let new_size = file
            .metadata()
            .await
            .map_err(|source| CrawlError::TransientIo {
                path: path.display().to_string(),
                source,
            })?
            .len();

        Ok((bytes_written, new_size))
    }

    /// Reads one line starting at `offset`. Returns `None` if `offset` is at
    /// or past end-of-file, or if the line at `offset` has no trailing
    /// newline yet (a writer's append is still in flight).
    pub async fn read_one(
        &self,
        domain: &str,
        offset: u64,
    ) -> Result<Option<(FrontierEntry, u64)>, CrawlError> {
        let path = self.file_path(domain);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CrawlError::TransientIo {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        file.seek(std::io::SeekFrom::Start(offset))
            .await
            .map_err(|source| CrawlError::TransientIo {
                path: path.display().to_string(),
                source,
            })?;

        let mut rest = String::new();
        file.read_to_string(&mut rest)
            .await
            .map_err(|source| CrawlError::TransientIo {
                path: path.display().to_string(),
                source,
            })?;

        if rest.is_empty() {
            return Ok(None);
        }

        let newline_pos = match rest.find('\n') {
            Some(pos) => pos,
            None => return Ok(None), // partial line, writer still in flight
        };

        let line = &rest[..newline_pos];
        let entry = FrontierEntry::parse(line)
            .map_err(|e| CrawlError::ParseFailed {
                url: String::new(),
                message: format!("corrupt frontier line for {domain}: {e}"),
            })?;
        let new_offset = offset + newline_pos as u64 + 1;
        Ok(Some((entry, new_offset)))
    }
}
