//! Machine-readable report of a run.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::bundle::Bundle;
use crate::core::check::CheckResult;
use crate::ops::check::FamilyResults;
use crate::util::fs::write_atomic;

/// Results of one check on one bundle.
#[derive(Debug, Clone, Serialize)]
pub struct CheckEntry {
    /// Human readable check name (`GNU libc ABI check`)
    pub name: String,
    pub results: Vec<CheckResult>,
}

/// `{"results": {"<bundle>": [{"name": ..., "results": [...]}]}}`
#[derive(Debug, Clone, Default, Serialize)]
pub struct JsonReport {
    results: BTreeMap<String, Vec<CheckEntry>>,
}

impl JsonReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the checks of one bundle.
    pub fn add(&mut self, bundle: &Bundle, checks: &[FamilyResults]) {
        let entries = self
            .results
            .entry(bundle.path().display().to_string())
            .or_default();

        entries.extend(checks.iter().map(|check| CheckEntry {
            name: check.family.check_name().to_string(),
            results: check.results.clone(),
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize report")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())
            .with_context(|| format!("failed to write report to {}", path.display()))?;

        tracing::info!("wrote JSON report to {}", path.display());
        Ok(())
    }
}
