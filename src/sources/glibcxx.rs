//! libstdc++ versions, read from the packaged library itself.
//!
//! Neither distribution publishes the `GLIBCXX_` versions its libstdc++
//! provides, so the `libstdc++6` package is downloaded and the version
//! definitions of the shared library are read directly.

use std::collections::BTreeSet;

use crate::cache::{CacheError, CompatibilityCache, ReferenceSource};
use crate::core::distro::Distro;
use crate::core::family::SymbolFamily;
use crate::core::version::max_version;
use crate::elf::{enumerate_binaries, filter_versions, ElfIntrospector, NativeIntrospector, VersionQuery};
use crate::sources::packages::{extract_deb, fetch_packages_index, package_field};
use crate::sources::{suite_codenames, DebianCodenames, UbuntuReleaseNames, VersionTable};
use crate::util::fs::make_tempdir;

const PACKAGE: &str = "libstdc++6";

/// Maximum `GLIBCXX_` version per release of one distribution.
///
/// Debian results are keyed by codename, Ubuntu results by release name.
#[derive(Debug, Clone)]
pub struct GlibcxxVersions {
    distro: Distro,
    releases: Option<Vec<String>>,
}

impl GlibcxxVersions {
    pub fn new(distro: Distro) -> Self {
        GlibcxxVersions {
            distro,
            releases: None,
        }
    }

    /// Fetch exactly `releases` (codenames for Debian) instead of reading
    /// them from the cache.
    pub fn with_releases(mut self, releases: Vec<String>) -> Self {
        self.releases = Some(releases);
        self
    }

    fn releases(&self, cache: &CompatibilityCache) -> Result<Vec<String>, CacheError> {
        if let Some(releases) = &self.releases {
            return Ok(releases.clone());
        }

        match self.distro {
            Distro::Debian => Ok(suite_codenames(&cache.get(&DebianCodenames, false)?)),
            Distro::Ubuntu => cache.get(&UbuntuReleaseNames, false),
        }
    }

    /// Defined `GLIBCXX_` versions of the libstdc++ package of `release`.
    fn package_versions(
        &self,
        cache: &CompatibilityCache,
        release: &str,
    ) -> Result<Vec<String>, CacheError> {
        let index = fetch_packages_index(cache.http(), cache.mirrors(), self.distro, release)?;

        let filename = package_field(&index, PACKAGE, "Filename").ok_or_else(|| {
            CacheError::malformed(
                self.cache_key(),
                format!("no Filename entry for {} in the {} index", PACKAGE, release),
            )
        })?;

        let url = cache.mirrors().url(self.distro, &filename);
        tracing::info!("downloading {}", url);
        let deb = cache.http().get_bytes(&url)?;

        let tmp = make_tempdir().map_err(|e| CacheError::io(std::env::temp_dir(), e))?;
        extract_deb(&deb, tmp.path()).map_err(|e| CacheError::io(tmp.path(), e))?;

        let introspector = NativeIntrospector::new();
        let mut versions = BTreeSet::new();

        for binary in enumerate_binaries(tmp.path()) {
            let names = introspector.version_names(&binary, VersionQuery::Defined)?;
            versions.extend(filter_versions(
                SymbolFamily::Glibcxx.prefix(),
                names.iter().map(String::as_str),
            ));
        }

        Ok(versions.into_iter().collect())
    }
}

impl ReferenceSource for GlibcxxVersions {
    type Payload = VersionTable;
    /// `(release, defined versions)`
    type Raw = Vec<(String, Vec<String>)>;

    fn cache_key(&self) -> String {
        format!("{}_glibcxx_versions.json", self.distro.id())
    }

    fn fetch_latest(&self, cache: &CompatibilityCache) -> Result<Self::Raw, CacheError> {
        tracing::info!("fetching libstdc++ versions for {}", self.distro);

        self.releases(cache)?
            .into_iter()
            .map(|release| -> Result<(String, Vec<String>), CacheError> {
                let versions = self.package_versions(cache, &release)?;
                Ok((release, versions))
            })
            .collect()
    }

    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError> {
        let mut table = VersionTable::new();

        for (release, versions) in raw {
            let max = max_version(versions.iter().map(String::as_str)).ok_or_else(|| {
                CacheError::malformed(
                    self.cache_key(),
                    format!("no {} versions found for {}", PACKAGE, release),
                )
            })?;

            table.insert(release, max.to_string());
        }

        Ok(table)
    }
}
