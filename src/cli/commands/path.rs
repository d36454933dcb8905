//! Path command - locate a committed entry

use crate::cache::Digest;
use crate::cli::args::PathArgs;
use crate::cli::commands::open_store;
use crate::config::Config;
use crate::error::{HoardError, HoardResult};

/// Execute the path command
pub async fn execute(args: PathArgs, config: &Config) -> HoardResult<()> {
    let digest = Digest::parse(&args.digest)?;
    let store = open_store(config);

    if !store.contains(&digest).await? {
        return Err(HoardError::NotCached(digest.to_string()));
    }

    println!("{}", store.layout().store_path(&digest).display());
    Ok(())
}
