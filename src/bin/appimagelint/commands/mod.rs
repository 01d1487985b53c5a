//! Command implementations

pub mod cache;
pub mod check;
pub mod completions;

use anyhow::Result;

use appimagelint::util::shell::{ColorChoice, Shell};
use appimagelint::util::{Config, GlobalContext};

/// Context and configuration for a run, with CLI overrides applied.
pub fn load_context(offline: bool) -> Result<(GlobalContext, Config)> {
    let mut ctx = GlobalContext::new();
    let mut config = Config::load_or_default(ctx.config_path())?;
    ctx.apply_config(&config);

    if offline {
        config.net.offline = true;
    }

    tracing::debug!("cache directory: {}", ctx.cache_dir().display());
    Ok((ctx, config))
}

pub fn shell(force_colors: bool) -> Shell {
    Shell::new(if force_colors {
        ColorChoice::Always
    } else {
        ColorChoice::Auto
    })
}
