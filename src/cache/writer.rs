//! Fresh acquisition: the exclusive writer for a missing digest
//!
//! Exclusive creation of `tmp/<digest>` is the cross-process lock. The
//! writer that wins it streams the source through the hasher into the
//! temp file, and only verified content is renamed into `store/`.
//! While writing, the temp file's mtime is refreshed so watchers in other
//! processes can tell a slow writer from a dead one.

use crate::cache::digest::Digest;
use crate::cache::hasher::{HashFactory, HashingStream};
use crate::cache::rollback::Rollback;
use crate::cache::store::{half_period, Layout};
use crate::error::{HoardError, HoardResult};
use crate::source::SourceStream;
use futures_util::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Result of trying to become the writer for a digest
#[derive(Debug)]
pub enum Claim {
    /// This attempt owns the temp file
    Acquired(TempFile),
    /// Another writer holds the temp file
    Busy,
}

/// Try to create `tmp/<digest>` exclusively
pub async fn claim(layout: &Layout, digest: &Digest) -> HoardResult<Claim> {
    let path = layout.tmp_path(digest);
    ensure_parent(&path).await?;

    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(file) => {
            debug!("Claimed {}", path.display());
            let mut rollback = Rollback::new();
            rollback.remove_file(&path);
            Ok(Claim::Acquired(TempFile {
                path,
                file,
                rollback,
                heartbeat: None,
            }))
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("{} is held by another writer", path.display());
            Ok(Claim::Busy)
        }
        Err(e) => Err(HoardError::store_io(
            format!("creating {}", path.display()),
            e,
        )),
    }
}

/// An exclusively owned temp file and everything to undo if it fails
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    file: File,
    rollback: Rollback,
    heartbeat: Option<AbortHandle>,
}

impl TempFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Refresh the file's mtime every half `timeout` until writing ends.
    ///
    /// A zero timeout disables the heartbeat.
    pub async fn start_heartbeat(&mut self, timeout: Duration) -> HoardResult<()> {
        if timeout.is_zero() || self.heartbeat.is_some() {
            return Ok(());
        }

        let handle = self
            .file
            .try_clone()
            .await
            .map_err(|e| HoardError::store_io(format!("cloning {}", self.path.display()), e))?
            .into_std()
            .await;
        let handle = Arc::new(handle);
        let path = self.path.clone();
        let period = half_period(timeout);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let handle = handle.clone();
                match tokio::task::spawn_blocking(move || handle.set_modified(SystemTime::now()))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Failed to refresh {}: {}", path.display(), e),
                    Err(_) => break,
                }
            }
        });

        self.heartbeat = Some(task.abort_handle());
        self.rollback.abort(task);
        Ok(())
    }

    /// Stop refreshing the mtime
    pub fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }

    /// Stream `source` into the file, returning the hex digest of what was written.
    ///
    /// The file is flushed and synced before returning.
    pub async fn fill(
        &mut self,
        source: SourceStream,
        hash: &dyn HashFactory,
        digest: &Digest,
    ) -> HoardResult<String> {
        let mut hashing = HashingStream::new(source, hash);

        while let Some(chunk) = hashing.next().await {
            let chunk = chunk.map_err(|e| {
                HoardError::source(format!("reading source stream for {}", digest), e)
            })?;
            self.file
                .write_all(&chunk)
                .await
                .map_err(|e| HoardError::store_io(format!("writing {}", self.path.display()), e))?;
        }

        self.file
            .flush()
            .await
            .map_err(|e| HoardError::store_io(format!("flushing {}", self.path.display()), e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| HoardError::store_io(format!("syncing {}", self.path.display()), e))?;

        debug!("Wrote {} bytes to {}", hashing.bytes(), self.path.display());
        Ok(hashing.finish())
    }

    /// Atomically move verified content into the store.
    ///
    /// A failed rename is not retried and the temp path is left as is:
    /// a watcher may have reclaimed this writer's file, and the path may
    /// already belong to another writer.
    pub async fn promote(mut self, layout: &Layout, digest: &Digest) -> HoardResult<()> {
        self.stop_heartbeat();
        let store_path = layout.store_path(digest);

        if let Err(e) = ensure_parent(&store_path).await {
            self.abandon().await;
            return Err(e);
        }

        match fs::rename(&self.path, &store_path).await {
            Ok(()) => {
                info!("Committed {}", store_path.display());
                self.rollback.disarm();
                Ok(())
            }
            Err(e) => {
                let err = HoardError::store_io(
                    format!(
                        "renaming {} to {}",
                        self.path.display(),
                        store_path.display()
                    ),
                    e,
                );
                warn!("{}", err);
                self.rollback.disarm();
                Err(err)
            }
        }
    }

    /// Run every registered rollback action
    pub async fn abandon(mut self) {
        self.stop_heartbeat();
        debug!("Abandoning {}", self.path.display());
        let TempFile { file, rollback, .. } = self;
        drop(file);
        rollback.run().await;
    }
}

async fn ensure_parent(path: &Path) -> HoardResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            HoardError::store_io(format!("creating directory {}", parent.display()), e)
        })?;
    }
    Ok(())
}
