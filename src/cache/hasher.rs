//! Streaming integrity verification
//!
//! Wraps an incremental hash accumulator around a chunked byte stream so
//! payloads are verified as they flow, without ever being buffered whole.

use crate::cache::digest::Digest;
use crate::error::{HoardError, HoardResult};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

/// An incremental hash computation
pub trait HashAccumulator: Send {
    /// Feed the next chunk of input
    fn update(&mut self, bytes: &[u8]);

    /// Consume the accumulator and return the lowercase hex digest
    fn finish_hex(self: Box<Self>) -> String;
}

impl<D> HashAccumulator for D
where
    D: sha2::Digest + Send + 'static,
{
    fn update(&mut self, bytes: &[u8]) {
        sha2::Digest::update(self, bytes);
    }

    fn finish_hex(self: Box<Self>) -> String {
        hex::encode(sha2::Digest::finalize(*self))
    }
}

/// Produces a fresh accumulator for every payload that must be hashed
pub trait HashFactory: Send + Sync + 'static {
    fn create(&self) -> Box<dyn HashAccumulator>;
}

impl<F> HashFactory for F
where
    F: Fn() -> Box<dyn HashAccumulator> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn HashAccumulator> {
        self()
    }
}

/// Built-in hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SHA-256 (64 hex characters)
    #[default]
    Sha256,
    /// SHA-512 (128 hex characters)
    Sha512,
    /// SHA-1 (40 hex characters), for legacy digests
    Sha1,
}

impl HashFactory for Algorithm {
    fn create(&self) -> Box<dyn HashAccumulator> {
        match self {
            Self::Sha256 => Box::new(Sha256::default()),
            Self::Sha512 => Box::new(Sha512::default()),
            Self::Sha1 => Box::new(Sha1::default()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Sha1 => "sha1",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "sha1" => Ok(Self::Sha1),
            other => Err(format!("unknown hash algorithm: {}", other)),
        }
    }
}

/// Check a computed digest against the expected one
pub fn check(expected: &Digest, actual: String) -> HoardResult<()> {
    if expected.matches(&actual) {
        Ok(())
    } else {
        Err(HoardError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Drain `stream`, hashing every chunk, and compare the result to `expected`.
///
/// Errors yielded by the stream are returned unchanged.
pub async fn verify<S>(stream: S, expected: &Digest, factory: &dyn HashFactory) -> HoardResult<()>
where
    S: Stream<Item = HoardResult<Bytes>> + Unpin,
{
    let mut hashing = HashingStream::new(stream, factory);
    while let Some(chunk) = hashing.next().await {
        chunk?;
    }
    check(expected, hashing.finish())
}

/// Pass-through stream that hashes every chunk it forwards
pub struct HashingStream<S> {
    inner: S,
    hash: Box<dyn HashAccumulator>,
    bytes: u64,
}

impl<S> HashingStream<S> {
    pub fn new(inner: S, factory: &dyn HashFactory) -> Self {
        Self {
            inner,
            hash: factory.create(),
            bytes: 0,
        }
    }

    /// Bytes forwarded so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Hex digest of everything forwarded so far
    pub fn finish(self) -> String {
        self.hash.finish_hex()
    }
}

impl<S, E> Stream for HashingStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.hash.update(&chunk);
                this.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}
