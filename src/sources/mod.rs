//! Distribution reference data.
//!
//! Each type in this module is a [`ReferenceSource`] describing where one
//! piece of reference data comes from and how it is parsed. The check engine
//! consumes them through the [`ReferenceData`] trait, which
//! [`CachedReferenceData`] implements on top of the compatibility cache.

pub mod debian;
pub mod glibcxx;
pub mod packages;
pub mod ubuntu;

use std::collections::BTreeMap;

use crate::cache::{CacheError, CompatibilityCache};
use crate::core::distro::{Distro, Release, DEBIAN_SUITES};
use crate::core::family::SymbolFamily;
use crate::util::config::{
    NetConfig, DEFAULT_DEBIAN_MIRROR, DEFAULT_RUNTIME_URL, DEFAULT_UBUNTU_MIRROR,
};

pub use debian::{suite_codenames, DebianCodenames, DebianGlibcVersions};
pub use glibcxx::GlibcxxVersions;
pub use ubuntu::{UbuntuGlibcVersions, UbuntuReleaseNames};

/// Rolling suite alias to fixed codename.
pub type CodenameMap = BTreeMap<String, String>;

/// Names of the currently supported releases.
pub type ReleaseNames = Vec<String>;

/// Release to maximum supported version, as stored in the cache.
pub type VersionTable = BTreeMap<String, String>;

/// Cache keys of every reference data record, in dependency order.
pub fn all_cache_keys() -> Vec<String> {
    use crate::cache::ReferenceSource;

    vec![
        DebianCodenames.cache_key(),
        UbuntuReleaseNames.cache_key(),
        DebianGlibcVersions.cache_key(),
        UbuntuGlibcVersions::new().cache_key(),
        GlibcxxVersions::new(Distro::Debian).cache_key(),
        GlibcxxVersions::new(Distro::Ubuntu).cache_key(),
    ]
}

/// Package archive mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirrors {
    pub debian: String,
    pub ubuntu: String,
    /// AppImage runtime release channel
    pub runtime: String,
}

impl Mirrors {
    pub fn from_config(net: &NetConfig) -> Self {
        Mirrors {
            debian: net.debian_mirror.clone(),
            ubuntu: net.ubuntu_mirror.clone(),
            runtime: net.runtime_url.clone(),
        }
    }

    /// URL of `path` on the mirror of `distro`.
    pub fn url(&self, distro: Distro, path: &str) -> String {
        let base = match distro {
            Distro::Debian => &self.debian,
            Distro::Ubuntu => &self.ubuntu,
        };

        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for Mirrors {
    fn default() -> Self {
        Mirrors {
            debian: DEFAULT_DEBIAN_MIRROR.to_string(),
            ubuntu: DEFAULT_UBUNTU_MIRROR.to_string(),
            runtime: DEFAULT_RUNTIME_URL.to_string(),
        }
    }
}

/// Maximum supported versions of one symbol family on one distribution.
///
/// Tagged with both so that a map can't answer a query for another family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersionMap {
    distro: Distro,
    family: SymbolFamily,
    versions: VersionTable,
}

impl ReleaseVersionMap {
    pub fn new(distro: Distro, family: SymbolFamily, versions: VersionTable) -> Self {
        ReleaseVersionMap {
            distro,
            family,
            versions,
        }
    }

    pub fn distro(&self) -> Distro {
        self.distro
    }

    pub fn family(&self) -> SymbolFamily {
        self.family
    }

    /// Maximum version for a release name.
    pub fn get(&self, release: &str) -> Option<&str> {
        self.versions.get(release).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Reference data needed to evaluate compatibility.
pub trait ReferenceData {
    /// Releases of `distro` to check against.
    fn releases(&self, distro: Distro) -> Result<Vec<Release>, CacheError>;

    /// Maximum supported versions of `family` on every release of `distro`.
    fn version_map(
        &self,
        distro: Distro,
        family: SymbolFamily,
    ) -> Result<ReleaseVersionMap, CacheError>;
}

/// [`ReferenceData`] backed by the compatibility cache.
#[derive(Debug, Clone, Copy)]
pub struct CachedReferenceData<'a> {
    cache: &'a CompatibilityCache,
}

impl<'a> CachedReferenceData<'a> {
    pub fn new(cache: &'a CompatibilityCache) -> Self {
        CachedReferenceData { cache }
    }

    /// Load every record the given checks need, refreshing as required.
    pub fn prefetch(&self, distros: &[Distro], families: &[SymbolFamily]) -> Result<(), CacheError> {
        for &distro in distros {
            let releases = self.releases(distro)?;
            tracing::debug!("{} releases: {}", distro, releases.len());

            for &family in families {
                let map = self.version_map(distro, family)?;
                tracing::debug!("{} {} versions known for {} releases", distro, family, map.len());
            }
        }

        Ok(())
    }
}

impl ReferenceData for CachedReferenceData<'_> {
    fn releases(&self, distro: Distro) -> Result<Vec<Release>, CacheError> {
        match distro {
            Distro::Debian => {
                let codenames = self.cache.get(&DebianCodenames, false)?;

                Ok(DEBIAN_SUITES
                    .iter()
                    .map(|suite| Release::alias(*suite, codenames.get(*suite).cloned()))
                    .collect())
            }
            Distro::Ubuntu => {
                let names = self.cache.get(&UbuntuReleaseNames, false)?;
                Ok(names.into_iter().map(Release::fixed).collect())
            }
        }
    }

    fn version_map(
        &self,
        distro: Distro,
        family: SymbolFamily,
    ) -> Result<ReleaseVersionMap, CacheError> {
        let versions = match (distro, family) {
            (Distro::Debian, SymbolFamily::Glibc) => self.cache.get(&DebianGlibcVersions, false)?,
            (Distro::Ubuntu, SymbolFamily::Glibc) => self.cache.get(&UbuntuGlibcVersions::new(), false)?,
            (distro, SymbolFamily::Glibcxx) => self.cache.get(&GlibcxxVersions::new(distro), false)?,
        };

        Ok(ReleaseVersionMap::new(distro, family, versions))
    }
}
