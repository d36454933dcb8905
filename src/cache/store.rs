//! On-disk layout and store access
//!
//! ```text
//! <root>/
//!   store/<digest>   committed, immutable entries
//!   tmp/<digest>     in-progress fetches; existence is the writer lock
//! ```

use crate::cache::digest::Digest;
use crate::cache::hasher::{self, HashFactory};
use crate::error::{HoardError, HoardResult};
use crate::source::reader_chunks;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tracing::{debug, info};

/// Path mapping for a cache root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Durable location of a committed entry
    pub fn store_path(&self, digest: &Digest) -> PathBuf {
        self.store_dir().join(digest.as_str())
    }

    /// Location of the in-progress fetch for a digest
    pub fn tmp_path(&self, digest: &Digest) -> PathBuf {
        self.tmp_dir().join(digest.as_str())
    }
}

/// Time since the file was last modified; zero if its clock is ahead of ours
pub fn age(meta: &Metadata) -> Duration {
    meta.modified()
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .unwrap_or_default()
}

/// Shortest heartbeat or staleness-check period
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Heartbeat period for a staleness timeout: half of it, at least [`MIN_PERIOD`]
pub fn half_period(timeout: Duration) -> Duration {
    (timeout / 2).max(MIN_PERIOD)
}

/// Stream an open store file, tagging read errors with its path
pub fn file_chunks(file: File, path: PathBuf) -> BoxStream<'static, HoardResult<Bytes>> {
    reader_chunks(file)
        .map(move |chunk| {
            chunk.map_err(|e| HoardError::store_io(format!("reading {}", path.display()), e))
        })
        .boxed()
}

/// Read access to committed entries
#[derive(Clone)]
pub struct Store {
    layout: Layout,
    paranoid: bool,
    hash: Arc<dyn HashFactory>,
}

impl Store {
    pub fn new(layout: Layout, paranoid: bool, hash: Arc<dyn HashFactory>) -> Self {
        Self {
            layout,
            paranoid,
            hash,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Open the committed entry for `digest`.
    ///
    /// `Ok(None)` means the entry does not exist and must be acquired.
    /// In paranoid mode the entry is hashed before it is handed out,
    /// unless `verified` says its bytes were just checked.
    pub async fn open(&self, digest: &Digest, verified: bool) -> HoardResult<Option<File>> {
        let Some(file) = self.open_raw(digest).await? else {
            return Ok(None);
        };

        if !self.paranoid || verified {
            return Ok(Some(file));
        }

        debug!("Re-verifying store entry {}", digest);
        let path = self.layout.store_path(digest);
        hasher::verify(file_chunks(file, path), digest, self.hash.as_ref()).await?;

        self.open_raw(digest).await
    }

    /// Whether a committed entry exists
    pub async fn contains(&self, digest: &Digest) -> HoardResult<bool> {
        let path = self.layout.store_path(digest);
        fs::try_exists(&path)
            .await
            .map_err(|e| HoardError::store_io(format!("checking {}", path.display()), e))
    }

    /// Hash a committed entry against its name, regardless of paranoid mode
    pub async fn verify_entry(&self, digest: &Digest) -> HoardResult<()> {
        let path = self.layout.store_path(digest);
        let file = self
            .open_raw(digest)
            .await?
            .ok_or_else(|| HoardError::NotCached(digest.to_string()))?;
        hasher::verify(file_chunks(file, path), digest, self.hash.as_ref()).await
    }

    /// Digests of every committed entry, sorted
    pub async fn entries(&self) -> HoardResult<Vec<Digest>> {
        let mut digests = Vec::new();
        for name in list_names(&self.layout.store_dir()).await? {
            match Digest::parse(&name) {
                Ok(digest) if digest.as_str() == name => digests.push(digest),
                _ => debug!("Ignoring foreign store entry {}", name),
            }
        }
        digests.sort();
        Ok(digests)
    }

    /// Remove temp entries not modified for longer than `max_age`.
    ///
    /// Returns the reclaimed paths with their ages. With `dry_run` nothing
    /// is deleted.
    pub async fn reclaim_temps(
        &self,
        max_age: Duration,
        dry_run: bool,
    ) -> HoardResult<Vec<(PathBuf, Duration)>> {
        let tmp_dir = self.layout.tmp_dir();
        let mut reclaimed = Vec::new();

        for name in list_names(&tmp_dir).await? {
            let path = tmp_dir.join(&name);
            let meta = match fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(HoardError::store_io(
                        format!("reading metadata of {}", path.display()),
                        e,
                    ))
                }
            };

            let elapsed = age(&meta);
            if !meta.is_file() || elapsed <= max_age {
                continue;
            }

            if !dry_run {
                match fs::remove_file(&path).await {
                    Ok(()) => info!("Reclaimed stale temp entry {}", path.display()),
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(HoardError::store_io(
                            format!("removing {}", path.display()),
                            e,
                        ))
                    }
                }
            }
            reclaimed.push((path, elapsed));
        }

        Ok(reclaimed)
    }

    async fn open_raw(&self, digest: &Digest) -> HoardResult<Option<File>> {
        let path = self.layout.store_path(digest);
        match File::open(&path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HoardError::store_io(
                format!("opening {}", path.display()),
                e,
            )),
        }
    }
}

/// File names in `dir`; a missing directory is empty
async fn list_names(dir: &Path) -> HoardResult<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(HoardError::store_io(
                format!("reading directory {}", dir.display()),
                e,
            ))
        }
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HoardError::store_io(format!("reading entry in {}", dir.display()), e))?
    {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
