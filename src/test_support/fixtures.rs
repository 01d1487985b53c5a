//! Reference data fixtures.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheError, CompatibilityCache, ReferenceSource};
use crate::core::distro::{Distro, Release};
use crate::core::family::SymbolFamily;
use crate::sources::{ReferenceData, ReleaseVersionMap, VersionTable};
use crate::util::http::{HttpClient, NetworkError};

/// A cache below `root` that can't reach the network.
///
/// Primary records go to `root/cache`, bundled records to `root/bundled`.
pub fn offline_cache(root: &Path) -> CompatibilityCache {
    let http = HttpClient::new(Duration::from_secs(1), true).unwrap();
    CompatibilityCache::with_dirs(root.join("cache"), Some(root.join("bundled")), http)
}

/// Write a cache record by hand.
pub fn write_record(path: &Path, digest: &str, data: &impl Serialize) {
    let record = serde_json::json!({
        "codebase_digest": digest,
        "data": data,
    });

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(&record).unwrap()).unwrap();
}

/// A reference source returning a fixed JSON value, or failing like the
/// network is down. Counts its fetches.
pub struct ScriptedSource {
    key: String,
    payload: Option<serde_json::Value>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn ok(key: &str, payload: serde_json::Value) -> Self {
        ScriptedSource {
            key: key.to_string(),
            payload: Some(payload),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(key: &str) -> Self {
        ScriptedSource {
            key: key.to_string(),
            payload: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReferenceSource for ScriptedSource {
    type Payload = VersionTable;
    type Raw = serde_json::Value;

    fn cache_key(&self) -> String {
        self.key.clone()
    }

    fn fetch_latest(&self, _cache: &CompatibilityCache) -> Result<Self::Raw, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.payload {
            Some(payload) => Ok(payload.clone()),
            None => Err(CacheError::Network(NetworkError::Offline {
                url: format!("https://example.invalid/{}", self.key),
            })),
        }
    }

    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError> {
        serde_json::from_value(raw).map_err(|e| CacheError::MalformedReferenceData {
            key: self.key.clone(),
            message: e.to_string(),
        })
    }
}

/// In-memory [`ReferenceData`].
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceData {
    releases: HashMap<Distro, Vec<Release>>,
    versions: HashMap<(Distro, SymbolFamily), VersionTable>,
}

impl StaticReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_releases(mut self, distro: Distro, releases: Vec<Release>) -> Self {
        self.releases.insert(distro, releases);
        self
    }

    pub fn with_versions(
        mut self,
        distro: Distro,
        family: SymbolFamily,
        versions: &[(&str, &str)],
    ) -> Self {
        let table: BTreeMap<String, String> = versions
            .iter()
            .map(|(release, version)| (release.to_string(), version.to_string()))
            .collect();
        self.versions.insert((distro, family), table);
        self
    }
}

impl ReferenceData for StaticReferenceData {
    fn releases(&self, distro: Distro) -> Result<Vec<Release>, CacheError> {
        self.releases.get(&distro).cloned().ok_or_else(|| CacheError::OutOfDate {
            key: format!("{}_releases", distro.id()),
            message: "no fixture data".to_string(),
            stale: None,
            source: None,
        })
    }

    fn version_map(
        &self,
        distro: Distro,
        family: SymbolFamily,
    ) -> Result<ReleaseVersionMap, CacheError> {
        let versions = self
            .versions
            .get(&(distro, family))
            .cloned()
            .ok_or_else(|| CacheError::OutOfDate {
                key: format!("{}_{}_versions", distro.id(), family.id()),
                message: "no fixture data".to_string(),
                stale: None,
                source: None,
            })?;

        Ok(ReleaseVersionMap::new(distro, family, versions))
    }
}
