//! `appimagelint cache` command
//!
//! Manage the reference data cache (distribution data and the AppImage runtime).

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use appimagelint::cache::digest::codebase_digest;
use appimagelint::cache::runtime::RuntimeCache;
use appimagelint::cache::{CacheLocation, RecordState, RecordStatus};
use appimagelint::ops::update_all;
use appimagelint::sources::all_cache_keys;
use appimagelint::util::display_error_chain;
use appimagelint::util::fs::remove_dir_all_if_exists;
use appimagelint::util::shell::Status;
use appimagelint::CompatibilityCache;

use crate::cli::{CacheArgs, CacheCommands};
use crate::commands::{load_context, shell};

pub fn execute(args: CacheArgs, offline: bool, force_colors: bool) -> Result<()> {
    match args.command {
        CacheCommands::Update(update_args) => update_cache(update_args.bundled, offline, force_colors),
        CacheCommands::List => list_cache(offline),
        CacheCommands::Path => show_path(offline),
        CacheCommands::Clean => clean_cache(offline, force_colors),
        CacheCommands::Digest => show_digest(),
    }
}

fn open_cache(offline: bool) -> Result<CompatibilityCache> {
    let (ctx, config) = load_context(offline)?;
    CompatibilityCache::new(&ctx, &config).context("failed to set up the reference data cache")
}

/// Refresh every record.
fn update_cache(bundled: bool, offline: bool, force_colors: bool) -> Result<()> {
    let cache = open_cache(offline)?;
    let shell = shell(force_colors);

    let location = if bundled {
        CacheLocation::Bundled
    } else {
        CacheLocation::Primary
    };
    let dir = cache.location_dir(location)?;
    tracing::info!("updating reference data in {}", dir.display());

    let outcomes = update_all(&cache, location);
    let total = outcomes.len();
    let mut failed = 0;

    for outcome in &outcomes {
        match &outcome.result {
            Ok(()) => shell.status(Status::Updated, &outcome.key),
            Err(e) => {
                failed += 1;
                shell.status(
                    Status::Error,
                    format!("{}: {}", outcome.key, display_error_chain(e)),
                );
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} records could not be updated", failed, total);
    }

    Ok(())
}

/// List every record and its state.
fn list_cache(offline: bool) -> Result<()> {
    let cache = open_cache(offline)?;

    println!("Cache directory: {}", cache.primary_dir().display());
    match cache.fallback_dir() {
        Some(dir) => println!("Bundled data:    {}", dir.display()),
        None => println!("Bundled data:    (none)"),
    }
    println!("Codebase digest: {}", cache.digest());
    println!();

    let mut keys = all_cache_keys();
    if let Some(runtime) = RuntimeCache::for_host(&cache) {
        keys.push(runtime.record_key());
    }

    for key in keys {
        println!("{}", key);
        for status in cache.status(&key) {
            println!("  {}", format_status(&status));
        }
    }

    println!();
    let size = dir_size(cache.primary_dir())?;
    println!("Total size: {}", format_size(size));

    Ok(())
}

fn format_status(status: &RecordStatus) -> String {
    let location = match status.location {
        CacheLocation::Primary => "primary",
        CacheLocation::Bundled => "bundled",
    };

    let state = match &status.state {
        RecordState::Missing => "missing".to_string(),
        RecordState::Invalid(reason) => format!("invalid ({})", reason),
        RecordState::DigestMismatch => "outdated format".to_string(),
        RecordState::Expired => "expired".to_string(),
        RecordState::Fresh => "fresh".to_string(),
    };

    match (&status.state, status.age) {
        (RecordState::Missing, _) | (_, None) => format!("{}: {}", location, state),
        (_, Some(age)) => format!("{}: {}, {} old", location, state, format_age(age)),
    }
}

/// Remove the user cache. Bundled data is never touched.
fn clean_cache(offline: bool, force_colors: bool) -> Result<()> {
    let (ctx, _) = load_context(offline)?;
    let shell = shell(force_colors);
    let cache_dir = ctx.cache_dir();

    if cache_dir.exists() {
        remove_dir_all_if_exists(cache_dir)
            .with_context(|| format!("failed to remove {}", cache_dir.display()))?;
        shell.status(Status::Removed, cache_dir.display());
    } else {
        eprintln!("     Nothing to clean");
    }

    Ok(())
}

/// Show cache directory path.
fn show_path(offline: bool) -> Result<()> {
    let (ctx, _) = load_context(offline)?;
    println!("{}", ctx.cache_dir().display());
    Ok(())
}

fn show_digest() -> Result<()> {
    println!("{}", codebase_digest());
    Ok(())
}

/// Calculate the total size of a directory recursively.
fn dir_size(path: &Path) -> Result<u64> {
    let mut size: u64 = 0;

    if path.is_file() {
        return Ok(fs::metadata(path).map(|m| m.len()).unwrap_or(0));
    }

    if !path.is_dir() {
        return Ok(0);
    }

    for entry in
        fs::read_dir(path).with_context(|| format!("failed to read: {}", path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            size += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        } else if path.is_dir() {
            size += dir_size(&path)?;
        }
    }

    Ok(size)
}

/// Format a size in bytes to a human-readable string.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Coarse age: `45s`, `12m`, `5h`, `3d`.
fn format_age(age: Duration) -> String {
    let secs = age.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 60 * 60 {
        format!("{}m", secs / 60)
    } else if secs < 24 * 60 * 60 {
        format!("{}h", secs / (60 * 60))
    } else {
        format!("{}d", secs / (24 * 60 * 60))
    }
}
