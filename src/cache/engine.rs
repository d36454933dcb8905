//! The cache handle

use crate::cache::acquire;
use crate::cache::delivery::ReadStream;
use crate::cache::digest::Digest;
use crate::cache::hasher::HashFactory;
use crate::cache::pending::{Join, Pending};
use crate::cache::store::{Layout, Store};
use crate::error::HoardResult;
use crate::source::Source;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default poll period while waiting on another writer
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Behavioural options of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Re-hash every store hit before serving it
    pub paranoid: bool,
    /// Silence after which another writer's temp file is reclaimed (zero disables)
    pub timeout: Duration,
    /// Poll period while waiting on another writer
    pub watch_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            paranoid: false,
            timeout: Duration::ZERO,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }
}

impl CacheOptions {
    pub fn with_paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = paranoid;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }
}

pub(crate) struct Shared<S> {
    pub(crate) layout: Layout,
    pub(crate) store: Store,
    pub(crate) options: CacheOptions,
    pub(crate) source: S,
    pub(crate) hash: Arc<dyn HashFactory>,
    pending: Pending,
}

/// A content-addressed cache rooted at one directory.
///
/// Cloning is cheap; clones share the same in-flight table, so
/// concurrent requests through any clone are coalesced.
pub struct Cache<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: Source> Cache<S> {
    pub fn new(
        root: impl Into<PathBuf>,
        options: CacheOptions,
        source: S,
        hash: impl HashFactory,
    ) -> Self {
        let layout = Layout::new(root);
        let hash: Arc<dyn HashFactory> = Arc::new(hash);
        let store = Store::new(layout.clone(), options.paranoid, hash.clone());

        Self {
            shared: Arc::new(Shared {
                layout,
                store,
                options,
                source,
                hash,
                pending: Pending::new(),
            }),
        }
    }

    /// Stream the content for `digest`, fetching it with `args` if needed.
    ///
    /// A malformed digest is rejected here, before any filesystem access.
    /// Every other failure is delivered through the returned stream.
    /// Concurrent requests for the same digest share one acquisition.
    /// Must be called from within a tokio runtime.
    pub fn create_read_stream(&self, digest: &str, args: S::Args) -> HoardResult<ReadStream> {
        let digest = Digest::parse(digest)?;

        match self.shared.pending.join(&digest) {
            Join::Attached(stream) => Ok(stream),
            Join::Started(stream, publisher) => {
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    acquire::run(&shared, digest, args, publisher).await;
                });
                Ok(stream)
            }
        }
    }

    pub fn root(&self) -> &Path {
        self.shared.layout.root()
    }

    pub fn options(&self) -> &CacheOptions {
        &self.shared.options
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    /// Read access to committed entries
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    pub fn store_path(&self, digest: &Digest) -> PathBuf {
        self.shared.layout.store_path(digest)
    }

    pub fn tmp_path(&self, digest: &Digest) -> PathBuf {
        self.shared.layout.tmp_path(digest)
    }

    /// Whether `digest` is committed to the store
    pub async fn contains(&self, digest: &Digest) -> HoardResult<bool> {
        self.shared.store.contains(digest).await
    }

    /// Number of acquisitions currently in flight in this process
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }
}
