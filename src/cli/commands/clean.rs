//! Clean command - reclaim abandoned temp files

use crate::cli::args::CleanArgs;
use crate::cli::commands::open_store;
use crate::config::Config;
use crate::error::HoardResult;
use crate::ui::{self, UiContext};
use std::time::Duration;

/// Age threshold when neither the flag nor a heartbeat timeout is set
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Execute the clean command
pub async fn execute(args: CleanArgs, config: &Config) -> HoardResult<()> {
    let ctx = UiContext::detect();
    let store = open_store(config);
    let max_age = max_age(args.older_than, config.cache.timeout_secs);

    let reclaimed = store.reclaim_temps(max_age, args.dry_run).await?;

    if reclaimed.is_empty() {
        ui::step_info(&ctx, "No abandoned temp files");
        return Ok(());
    }

    for (path, age) in &reclaimed {
        let detail = format!("idle {}s", age.as_secs());
        if args.dry_run {
            ui::step_info(&ctx, &format!("Would remove {} ({})", path.display(), detail));
        } else {
            ui::step_ok_detail(&ctx, &format!("Removed {}", path.display()), &detail);
        }
    }

    if args.dry_run {
        ui::step_warn_hint(
            &ctx,
            &format!("{} temp files eligible", reclaimed.len()),
            "Run without --dry-run to remove them",
        );
    }

    Ok(())
}

fn max_age(older_than: Option<u64>, timeout_secs: u64) -> Duration {
    match older_than {
        Some(secs) => Duration::from_secs(secs),
        None if timeout_secs > 0 => Duration::from_secs(timeout_secs),
        None => DEFAULT_MAX_AGE,
    }
}
