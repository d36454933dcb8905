//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, InitOutcome};
use crate::error::HoardResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> HoardResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> HoardResult<()> {
    let mut effective = config.clone();
    effective.cache.root = Some(config.cache_root());
    println!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> HoardResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path().display().to_string();

    match manager.init(force).await? {
        InitOutcome::Written => ui::step_ok_detail(&ctx, "Configuration initialized", &path),
        InitOutcome::Kept => ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path),
            "Use --force to overwrite",
        ),
    }

    Ok(())
}
