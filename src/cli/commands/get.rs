//! Get command - fetch content by digest

use crate::cache::ReadStream;
use crate::cli::args::GetArgs;
use crate::cli::commands::open_cache;
use crate::config::Config;
use crate::error::{HoardError, HoardResult};
use crate::ui::{self, TransferProgress, UiContext};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> HoardResult<()> {
    let ctx = UiContext::detect();
    let cache = open_cache(config);
    let stream = cache.create_read_stream(&args.digest, args.source)?;

    match args.output {
        Some(path) => {
            let label = short_digest(&args.digest);
            let progress = TransferProgress::new(&ctx, &label);
            let written = write_file(stream, &path, &progress).await;
            progress.finish();

            let written = written?;
            ui::step_ok_detail(
                &ctx,
                &format!("Wrote {}", path.display()),
                &ui::format_bytes(written),
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let written = stream.copy_to(&mut stdout).await?;
            debug!("Wrote {} bytes to stdout", written);
        }
    }

    Ok(())
}

/// Write the stream to `path`, removing the partial file on failure
async fn write_file(
    stream: ReadStream,
    path: &Path,
    progress: &TransferProgress,
) -> HoardResult<u64> {
    let mut file = File::create(path)
        .await
        .map_err(|e| HoardError::io(format!("creating {}", path.display()), e))?;

    match pump(stream, &mut file, progress).await {
        Ok(written) => {
            file.sync_all()
                .await
                .map_err(|e| HoardError::io(format!("syncing {}", path.display()), e))?;
            Ok(written)
        }
        Err(e) => {
            drop(file);
            if let Err(remove) = fs::remove_file(path).await {
                debug!("Could not remove partial {}: {}", path.display(), remove);
            }
            Err(e)
        }
    }
}

async fn pump<W>(
    mut stream: ReadStream,
    writer: &mut W,
    progress: &TransferProgress,
) -> HoardResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = stream.next_chunk().await? {
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| HoardError::io("writing output", e))?;
        written += chunk.len() as u64;
        progress.inc(chunk.len() as u64);
    }
    writer
        .flush()
        .await
        .map_err(|e| HoardError::io("flushing output", e))?;
    Ok(written)
}

fn short_digest(digest: &str) -> String {
    digest.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_digest_truncates() {
        assert_eq!(short_digest("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_digest("abc"), "abc");
    }
}
