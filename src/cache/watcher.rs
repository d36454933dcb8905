//! Waiting on another writer
//!
//! When `tmp/<digest>` already exists some writer, in this process or
//! another, is fetching the digest. The watcher waits until the temp file
//! disappears (promoted, abandoned, or reclaimed) and then asks for the
//! whole acquisition to start over. With a nonzero timeout it also
//! reclaims temp files whose mtime heartbeat has gone silent.

use crate::cache::store::{age, half_period, MIN_PERIOD};
use crate::error::{HoardError, HoardResult};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Longest wait before the first staleness check
const MAX_INITIAL_STALE_DELAY: Duration = Duration::from_secs(1);

/// How the watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The temp file went away
    Released,
    /// The temp file was stale and this watcher removed it
    Reclaimed,
}

/// Watch `tmp_path` until the acquisition should be retried.
///
/// `timeout` of zero disables staleness detection; `interval` is the poll
/// period for noticing the temp file disappear.
pub async fn watch(tmp_path: &Path, timeout: Duration, interval: Duration) -> HoardResult<Wake> {
    debug!("Watching {}", tmp_path.display());

    let mut poll = time::interval(interval.max(MIN_PERIOD));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stale_enabled = !timeout.is_zero();
    let mut next_stale_check = Instant::now() + half_period(timeout).min(MAX_INITIAL_STALE_DELAY);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let exists = fs::try_exists(tmp_path).await.map_err(|e| {
                    HoardError::store_io(format!("checking {}", tmp_path.display()), e)
                })?;
                if !exists {
                    debug!("{} released", tmp_path.display());
                    return Ok(Wake::Released);
                }
            }
            _ = time::sleep_until(next_stale_check), if stale_enabled => {
                if let Some(wake) = check_stale(tmp_path, timeout).await? {
                    return Ok(wake);
                }
                next_stale_check = Instant::now() + half_period(timeout);
            }
        }
    }
}

/// Reclaim the temp file if its heartbeat is older than `timeout`
async fn check_stale(tmp_path: &Path, timeout: Duration) -> HoardResult<Option<Wake>> {
    let meta = match fs::metadata(tmp_path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Some(Wake::Released)),
        Err(e) => {
            return Err(HoardError::store_io(
                format!("reading metadata of {}", tmp_path.display()),
                e,
            ))
        }
    };

    let silent = age(&meta);
    if silent <= timeout {
        return Ok(None);
    }

    info!(
        "Reclaiming {} (no heartbeat for {:.1}s)",
        tmp_path.display(),
        silent.as_secs_f64()
    );
    match fs::remove_file(tmp_path).await {
        Ok(()) => Ok(Some(Wake::Reclaimed)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Some(Wake::Released)),
        Err(e) => Err(HoardError::store_io(
            format!("removing stale {}", tmp_path.display()),
            e,
        )),
    }
}
