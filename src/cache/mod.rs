//! Content-addressed download cache
//!
//! Callers ask for content by digest. The cache either serves the
//! committed copy under `store/`, waits on a fetch already in flight, or
//! becomes the single writer that fetches, verifies and commits it.
//!
//! # Coordination
//!
//! | Scope | Mechanism |
//! |-------|-----------|
//! | Same process | Pending table: one delivery per digest, fanned out to every caller |
//! | Across processes | Exclusive create of `tmp/<digest>` plus atomic rename into `store/` |
//! | Crashed writers | mtime heartbeat on the temp file; silent ones are reclaimed after `timeout` |
//!
//! # Integrity
//!
//! Content is hashed while it streams into the temp file and is only
//! promoted when the hash matches the digest. Paranoid mode re-hashes
//! every store hit as well.

mod acquire;
pub mod delivery;
pub mod digest;
pub mod engine;
pub mod hasher;
pub mod pending;
pub mod rollback;
pub mod store;
pub mod watcher;
pub mod writer;

pub use delivery::ReadStream;
pub use digest::{Digest, MIN_DIGEST_LEN};
pub use engine::{Cache, CacheOptions, DEFAULT_WATCH_INTERVAL};
pub use hasher::{Algorithm, HashAccumulator, HashFactory};
pub use store::{Layout, Store};
