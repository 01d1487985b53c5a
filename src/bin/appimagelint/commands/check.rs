//! Default command: check bundles
//!
//! Loads all reference data up front, then checks each bundle in turn. A
//! bundle that can't be checked is reported and skipped.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use appimagelint::cache::runtime::RuntimeCache;
use appimagelint::core::bundle::BundleKind;
use appimagelint::elf::{IntrospectorKind, SymbolVersionExtractor};
use appimagelint::ops::{AppImageMounter, CheckError, CompatibilityEngine, JsonReport};
use appimagelint::sources::CachedReferenceData;
use appimagelint::util::display_error_chain;
use appimagelint::util::signal::interrupted;
use appimagelint::util::Config;
use appimagelint::{Bundle, CompatibilityCache, Distro, SymbolFamily};

use crate::cli::CheckArgs;
use crate::commands::{load_context, shell};

pub fn execute(args: CheckArgs, offline: bool, force_colors: bool) -> Result<()> {
    let (ctx, config) = load_context(offline)?;

    let distros = selected_distros(&args, &config)?;
    let families = selected_families(&args, &config)?;
    let introspector = selected_introspector(&args, &config)?;

    if let Some(jobs) = args.jobs.or(config.check.jobs) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok(); // Ignore if already set
    }

    let bundles = args
        .paths
        .iter()
        .map(|path| open_bundle(path))
        .collect::<Result<Vec<_>>>()?;

    let cache = CompatibilityCache::new(&ctx, &config)
        .context("failed to set up the reference data cache")?;
    let data = CachedReferenceData::new(&cache);

    data.prefetch(&distros, &families)
        .context("failed to load reference data")?;

    let runtime = if bundles.iter().any(|b| b.kind() == BundleKind::AppImage) {
        mount_runtime(&cache)
    } else {
        None
    };

    let extractor = SymbolVersionExtractor::new(
        introspector
            .create()
            .with_context(|| format!("failed to set up {} introspection", introspector))?,
    );
    let engine = CompatibilityEngine::new(&data, extractor, AppImageMounter::new(runtime))
        .with_distros(distros);

    let shell = shell(force_colors);
    let mut report = JsonReport::new();

    for bundle in &bundles {
        if interrupted() {
            bail!("interrupted by user");
        }

        tracing::info!("checking {}", bundle);

        match engine.evaluate_all(bundle, &families) {
            Ok(checks) => {
                for check in checks.iter().filter(|c| !c.results.is_empty()) {
                    shell.check_results(check.family.check_name(), &check.results);
                }
                report.add(bundle, &checks);
            }
            Err(CheckError::Interrupted) => bail!("interrupted by user"),
            Err(e) => {
                tracing::error!("failed to check {}: {}", bundle, display_error_chain(&e));
            }
        }
    }

    if let Some(path) = &args.json_report {
        report.write(path)?;
    }

    Ok(())
}

fn open_bundle(path: &Path) -> Result<Bundle> {
    Bundle::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Runtime used to mount AppImages; without one they mount themselves.
fn mount_runtime(cache: &CompatibilityCache) -> Option<std::path::PathBuf> {
    let runtime = RuntimeCache::for_host(cache)?;

    match runtime.get(false) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(
                "AppImage runtime unavailable, AppImages will mount themselves: {}",
                display_error_chain(&e)
            );
            None
        }
    }
}

fn selected_distros(args: &CheckArgs, config: &Config) -> Result<Vec<Distro>> {
    if !args.distros.is_empty() {
        return Ok(args.distros.clone());
    }

    if config.check.distros.is_empty() {
        return Ok(Distro::ALL.to_vec());
    }

    config
        .check
        .distros
        .iter()
        .map(|d| d.parse().map_err(|e: String| anyhow!(e)))
        .collect::<Result<Vec<_>>>()
        .context("invalid `check.distros` in config")
}

fn selected_families(args: &CheckArgs, config: &Config) -> Result<Vec<SymbolFamily>> {
    if !args.checks.is_empty() {
        return Ok(args.checks.clone());
    }

    if config.check.families.is_empty() {
        return Ok(SymbolFamily::ALL.to_vec());
    }

    config
        .check
        .families
        .iter()
        .map(|f| f.parse().map_err(|e: String| anyhow!(e)))
        .collect::<Result<Vec<_>>>()
        .context("invalid `check.families` in config")
}

fn selected_introspector(args: &CheckArgs, config: &Config) -> Result<IntrospectorKind> {
    if let Some(kind) = args.introspector {
        return Ok(kind);
    }

    match &config.check.introspector {
        Some(name) => name
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("invalid `check.introspector` in config"),
        None => Ok(IntrospectorKind::default()),
    }
}
