//! Ubuntu reference data: supported releases and glibc versions.

use serde::Deserialize;

use crate::cache::{CacheError, CompatibilityCache, ReferenceSource};
use crate::core::distro::Distro;
use crate::core::version::normalize_package_version;
use crate::sources::packages::{fetch_packages_index, package_field};
use crate::sources::{ReleaseNames, VersionTable};

/// Launchpad API listing every Ubuntu series.
pub const LAUNCHPAD_SERIES_URL: &str = "https://api.launchpad.net/devel/ubuntu/series";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeriesResponse {
    Collection { entries: Vec<Series> },
    List(Vec<Series>),
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    displayname: Option<String>,
    #[serde(default)]
    supported: bool,
}

/// Names of the currently supported Ubuntu releases (`jammy`, `noble`, ...).
///
/// Ubuntu has no rolling aliases, so the names are used directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct UbuntuReleaseNames;

impl ReferenceSource for UbuntuReleaseNames {
    type Payload = ReleaseNames;
    /// JSON body of the Launchpad response
    type Raw = String;

    fn cache_key(&self) -> String {
        "ubuntu_release_names.json".to_string()
    }

    fn fetch_latest(&self, cache: &CompatibilityCache) -> Result<Self::Raw, CacheError> {
        tracing::info!("fetching Ubuntu releases from Launchpad");
        Ok(cache.http().get_text(LAUNCHPAD_SERIES_URL, None)?)
    }

    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError> {
        let response: SeriesResponse = serde_json::from_str(&raw)
            .map_err(|e| CacheError::malformed(self.cache_key(), e.to_string()))?;

        let series = match response {
            SeriesResponse::Collection { entries } => entries,
            SeriesResponse::List(series) => series,
        };

        let names: ReleaseNames = series
            .into_iter()
            .filter(|s| s.supported)
            .filter_map(|s| s.name.or_else(|| s.displayname.map(|d| d.to_lowercase())))
            .collect();

        if names.is_empty() {
            return Err(CacheError::malformed(
                self.cache_key(),
                "no supported releases listed",
            ));
        }

        Ok(names)
    }
}

/// `libc6` version per supported Ubuntu release, from the archive indices.
///
/// Releases come from the cached release names unless a list is given.
#[derive(Debug, Clone, Default)]
pub struct UbuntuGlibcVersions {
    releases: Option<ReleaseNames>,
}

impl UbuntuGlibcVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch exactly `releases`.
    pub fn with_releases(mut self, releases: ReleaseNames) -> Self {
        self.releases = Some(releases);
        self
    }
}

impl ReferenceSource for UbuntuGlibcVersions {
    type Payload = VersionTable;
    /// `(release, Packages index)`
    type Raw = Vec<(String, String)>;

    fn cache_key(&self) -> String {
        "ubuntu_glibc_versions.json".to_string()
    }

    fn fetch_latest(&self, cache: &CompatibilityCache) -> Result<Self::Raw, CacheError> {
        let releases = match &self.releases {
            Some(releases) => releases.clone(),
            None => cache.get(&UbuntuReleaseNames, false)?,
        };

        releases
            .into_iter()
            .map(|release| -> Result<(String, String), CacheError> {
                let index =
                    fetch_packages_index(cache.http(), cache.mirrors(), Distro::Ubuntu, &release)?;
                Ok((release, index))
            })
            .collect()
    }

    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError> {
        let mut versions = VersionTable::new();

        for (release, index) in raw {
            let version = package_field(&index, "libc6", "Version").ok_or_else(|| {
                CacheError::malformed(
                    self.cache_key(),
                    format!("no libc6 package in the {} index", release),
                )
            })?;

            versions.insert(release, normalize_package_version(&version, 3));
        }

        Ok(versions)
    }
}
