//! In-memory source
//!
//! Serves fixed payloads keyed by digest. Counts every `open` so callers
//! can observe how many fetches the cache actually performed.

use crate::cache::Digest;
use crate::source::{Source, SourceStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source backed by a map of digest to payload
#[derive(Debug, Clone)]
pub struct StaticSource {
    entries: Arc<Mutex<HashMap<String, Bytes>>>,
    opens: Arc<AtomicUsize>,
    chunk_size: usize,
    delay: Duration,
}

impl Default for StaticSource {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            opens: Arc::default(),
            chunk_size: 8 * 1024,
            delay: Duration::ZERO,
        }
    }
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit payloads in chunks of at most `size` bytes
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Wait `delay` before every chunk
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serve `content` for the digest `key`.
    ///
    /// The content is not checked against the key.
    pub fn insert(&self, key: impl Into<String>, content: impl Into<Bytes>) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.into().to_ascii_lowercase(), content.into());
    }

    /// Number of fetches started so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for StaticSource {
    type Args = ();

    async fn open(&self, digest: &Digest, _args: &()) -> io::Result<SourceStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let content = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(digest.as_str())
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no content for {}", digest))
            })?;

        let chunk_size = self.chunk_size;
        let delay = self.delay;
        let chunks = stream::unfold(content, move |mut rest| async move {
            if rest.is_empty() {
                return None;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let chunk = rest.split_to(chunk_size.min(rest.len()));
            Some((Ok(chunk), rest))
        });

        Ok(chunks.boxed())
    }
}
