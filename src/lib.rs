//! Hoard - content-addressed download cache
//!
//! Streams content by digest from a filesystem store, fetching and
//! verifying it exactly once across every process sharing the cache root.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod source;
pub mod ui;

pub use cache::{Cache, CacheOptions, Digest, ReadStream};
pub use error::{HoardError, HoardResult};
