//! `vidx config show` and `vidx config auto-update`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::state::{ConfigProvider, FileConfigProvider};
use crate::status::format_ts_iso;

/// Print the effective configuration, including persisted overrides.
pub fn run_show(config: &Config) -> Result<()> {
    let provider = FileConfigProvider::new(config.clone());
    let auto = provider.auto_update_settings();
    let state = provider.state();

    println!("[vault]");
    println!("  root:            {}", config.vault_root().display());
    println!("  include_globs:   {}", config.vault.include_globs.join(", "));
    if !config.vault.exclude_globs.is_empty() {
        println!("  exclude_globs:   {}", config.vault.exclude_globs.join(", "));
    }
    println!("  follow_symlinks: {}", config.vault.follow_symlinks);
    println!();
    println!("[state]");
    println!("  dir:             {}", config.state_dir().display());
    println!();
    println!("[embedding]");
    println!("  provider:        {}", config.embedding.provider);
    if let Some(model) = &config.embedding.model {
        println!("  model:           {}", model);
    }
    if let Some(dims) = config.embedding.dims {
        println!("  dims:            {}", dims);
    }
    println!();
    println!("[auto_update]");
    println!(
        "  enabled:         {}{}",
        auto.enabled,
        override_note(state.auto_update_enabled.is_some())
    );
    println!(
        "  interval:        {} min{}",
        auto.interval_secs / 60,
        override_note(state.auto_update_interval_secs.is_some())
    );
    println!("  threshold:       {}", provider.rebuild_threshold());
    println!(
        "  last scan:       {}",
        if auto.last_scan_timestamp > 0.0 {
            format_ts_iso(auto.last_scan_timestamp)
        } else {
            "never".to_string()
        }
    );
    Ok(())
}

/// Persist auto-update overrides. With no flags, print the current settings.
pub fn run_auto_update(
    config: &Config,
    enable: bool,
    disable: bool,
    interval_minutes: Option<u64>,
) -> Result<()> {
    if enable && disable {
        bail!("--enable and --disable are mutually exclusive");
    }
    if interval_minutes == Some(0) {
        bail!("--interval must be at least 1 minute");
    }
    let interval_secs = match interval_minutes {
        Some(m) => match m.checked_mul(60) {
            Some(secs) => Some(secs),
            None => bail!("--interval of {} minutes is too large", m),
        },
        None => None,
    };

    let mut provider = FileConfigProvider::new(config.clone());
    let enabled = match (enable, disable) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    if enabled.is_some() || interval_secs.is_some() {
        provider.set_auto_update(enabled, interval_secs)?;
    }

    let auto = provider.auto_update_settings();
    println!("auto-update");
    println!("  enabled: {}", auto.enabled);
    println!("  interval: {} min", auto.interval_secs / 60);
    Ok(())
}

fn override_note(overridden: bool) -> &'static str {
    if overridden {
        " (set via `vidx config auto-update`)"
    } else {
        ""
    }
}
