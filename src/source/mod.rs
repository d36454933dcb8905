//! Byte sources the cache fetches missing content from
//!
//! The cache calls [`Source::open`] exactly once per fresh acquisition and
//! forwards the caller's arguments verbatim. Anything that can produce a
//! chunked byte stream for a digest can back a cache.

pub mod memory;
pub mod url;

pub use memory::StaticSource;
pub use url::UrlSource;

use crate::cache::Digest;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read size for streaming from readers
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A chunked byte stream produced by a source
pub type SourceStream = BoxStream<'static, io::Result<Bytes>>;

/// Provider of content for digests missing from the store
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// Caller-supplied arguments forwarded to every fetch (e.g. a URL)
    type Args: Send + Sync + 'static;

    /// Start streaming the content for `digest`
    async fn open(&self, digest: &Digest, args: &Self::Args) -> io::Result<SourceStream>;
}

/// Stream any async reader in chunks of at most [`CHUNK_SIZE`] bytes.
///
/// The stream ends after the first error.
pub fn reader_chunks<R>(reader: R) -> SourceStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        match reader.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), Some(reader))),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}
