//! One acquisition, as an explicit state machine
//!
//! ```text
//! ReadingStore ──hit──────────────────────────────▶ Delivering
//!      │ miss                                            ▲
//!      ▼                                                 │
//! CreatingTemp ──busy──▶ Watching ──released──▶ ReadingStore
//!      │ claimed                                         ▲
//!      ▼                                                 │ verified
//! Fetching ──▶ Verifying ──▶ Promoting ──────────────────┘
//!
//! any state ──error──▶ Failed
//! ```
//!
//! Every exit publishes exactly one terminal event to the delivery.

use crate::cache::delivery::Publisher;
use crate::cache::digest::Digest;
use crate::cache::engine::Shared;
use crate::cache::hasher;
use crate::cache::store::file_chunks;
use crate::cache::watcher::{self, Wake};
use crate::cache::writer::{self, Claim, TempFile};
use crate::error::HoardError;
use crate::source::Source;
use futures_util::StreamExt;
use std::fmt;
use tokio::fs::File;
use tracing::debug;

pub(crate) enum AcquireState {
    ReadingStore { verified: bool },
    CreatingTemp,
    Watching,
    Fetching(TempFile),
    Verifying(TempFile, String),
    Promoting(TempFile),
    Delivering(File),
    Failed(HoardError),
}

impl fmt::Display for AcquireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadingStore { verified: false } => "reading store",
            Self::ReadingStore { verified: true } => "reading verified store entry",
            Self::CreatingTemp => "creating temp",
            Self::Watching => "watching",
            Self::Fetching(_) => "fetching",
            Self::Verifying(..) => "verifying",
            Self::Promoting(_) => "promoting",
            Self::Delivering(_) => "delivering",
            Self::Failed(_) => "failed",
        };
        f.write_str(name)
    }
}

/// Drive the acquisition of `digest` to completion
pub(crate) async fn run<S: Source>(
    shared: &Shared<S>,
    digest: Digest,
    args: S::Args,
    publisher: Publisher,
) {
    let mut state = AcquireState::ReadingStore { verified: false };

    loop {
        debug!("{}: {}", digest, state);
        state = match state {
            AcquireState::ReadingStore { verified } => {
                match shared.store.open(&digest, verified).await {
                    Ok(Some(file)) => AcquireState::Delivering(file),
                    Ok(None) => AcquireState::CreatingTemp,
                    Err(e) => AcquireState::Failed(e),
                }
            }

            AcquireState::CreatingTemp => match writer::claim(&shared.layout, &digest).await {
                Ok(Claim::Acquired(temp)) => AcquireState::Fetching(temp),
                Ok(Claim::Busy) => AcquireState::Watching,
                Err(e) => AcquireState::Failed(e),
            },

            AcquireState::Watching => {
                let tmp_path = shared.layout.tmp_path(&digest);
                match watcher::watch(
                    &tmp_path,
                    shared.options.timeout,
                    shared.options.watch_interval,
                )
                .await
                {
                    Ok(Wake::Released) | Ok(Wake::Reclaimed) => {
                        AcquireState::ReadingStore { verified: false }
                    }
                    Err(e) => AcquireState::Failed(e),
                }
            }

            AcquireState::Fetching(mut temp) => {
                let written = fetch(shared, &digest, &args, &mut temp).await;
                temp.stop_heartbeat();
                match written {
                    Ok(actual) => AcquireState::Verifying(temp, actual),
                    Err(e) => {
                        temp.abandon().await;
                        AcquireState::Failed(e)
                    }
                }
            }

            AcquireState::Verifying(temp, actual) => match hasher::check(&digest, actual) {
                Ok(()) => AcquireState::Promoting(temp),
                Err(e) => {
                    temp.abandon().await;
                    AcquireState::Failed(e)
                }
            },

            AcquireState::Promoting(temp) => match temp.promote(&shared.layout, &digest).await {
                Ok(()) => AcquireState::ReadingStore { verified: true },
                Err(e) => AcquireState::Failed(e),
            },

            AcquireState::Delivering(file) => {
                deliver(shared, &digest, file, publisher).await;
                return;
            }

            AcquireState::Failed(err) => {
                publisher.fail(err);
                return;
            }
        };
    }
}

/// Open the source and stream it into the temp file
async fn fetch<S: Source>(
    shared: &Shared<S>,
    digest: &Digest,
    args: &S::Args,
    temp: &mut TempFile,
) -> Result<String, HoardError> {
    temp.start_heartbeat(shared.options.timeout).await?;

    let source = shared
        .source
        .open(digest, args)
        .await
        .map_err(|e| HoardError::source(format!("opening source for {}", digest), e))?;

    temp.fill(source, shared.hash.as_ref(), digest).await
}

/// Stream a committed entry to every consumer
async fn deliver<S: Source>(
    shared: &Shared<S>,
    digest: &Digest,
    file: File,
    mut publisher: Publisher,
) {
    let mut chunks = file_chunks(file, shared.layout.store_path(digest));

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                publisher.send(chunk);
                if !publisher.has_consumers() {
                    debug!("{}: every consumer went away", digest);
                    return;
                }
            }
            Err(e) => {
                publisher.fail(e);
                return;
            }
        }
    }

    publisher.finish();
}
