//! CLI command implementations

pub mod clean;
pub mod config;
pub mod get;
pub mod path;
pub mod verify;

pub use clean::execute as clean;
pub use config::execute as config;
pub use get::execute as get;
pub use path::execute as path;
pub use verify::execute as verify;

use crate::cache::{Cache, Store};
use crate::config::Config;
use crate::source::UrlSource;
use std::sync::Arc;

/// Build the cache every fetching command shares
pub(crate) fn open_cache(config: &Config) -> Cache<UrlSource> {
    Cache::new(
        config.cache_root(),
        config.cache_options(),
        UrlSource::new(config.source.user_agent.clone()),
        config.cache.algorithm,
    )
}

/// Read-only access to committed entries, without a source
pub(crate) fn open_store(config: &Config) -> Store {
    Store::new(
        crate::cache::Layout::new(config.cache_root()),
        config.cache.paranoid,
        Arc::new(config.cache.algorithm),
    )
}
