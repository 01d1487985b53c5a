//! The compatibility engine.
//!
//! Collects the symbol versions a bundle requires, from its runtime and from
//! every binary in its payload, and compares the highest one of each family
//! against what each target release ships.

use std::path::Path;

use rayon::iter::{ParallelBridge, ParallelIterator};
use thiserror::Error;

use crate::cache::CacheError;
use crate::core::bundle::Bundle;
use crate::core::check::CheckResult;
use crate::core::distro::{Distro, Release};
use crate::core::family::{SymbolFamily, SymbolVersionSet};
use crate::core::version::Version;
use crate::elf::{enumerate_binaries, filter_versions, SymbolVersionExtractor};
use crate::ops::mount::{AppImageMounter, MountError};
use crate::sources::{ReferenceData, ReleaseVersionMap};
use crate::util::signal::interrupted;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to mount bundle")]
    Mount(#[from] MountError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("interrupted by user")]
    Interrupted,
}

/// Results of one symbol family's check on one bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyResults {
    pub family: SymbolFamily,
    /// Empty when the bundle requires nothing from this family.
    pub results: Vec<CheckResult>,
}

/// Verdict for one release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub passed: bool,
    pub max_supported: Option<String>,
}

/// Compare `required` against the version `map` lists for `release`.
///
/// The release is looked up by codename, then as `<codename>-backports`.
/// A release without data fails, and so does a suite alias that didn't
/// resolve to a codename.
pub fn decide(required: &Version, release: &Release, map: &ReleaseVersionMap) -> Decision {
    let name = match &release.codename {
        Some(codename) => codename.as_str(),
        None if map.distro().uses_suite_aliases() => {
            tracing::warn!(
                "could not resolve {} {} to a codename, assuming incompatible",
                map.distro(),
                release.id
            );
            return Decision {
                passed: false,
                max_supported: None,
            };
        }
        None => release.id.as_str(),
    };
    let backports = format!("{}-backports", name);

    let found = map.get(name).or_else(|| {
        let version = map.get(&backports);
        if version.is_some() {
            tracing::debug!("no {} data for {}, using {}", map.family(), name, backports);
        }
        version
    });

    let Some(max_supported) = found else {
        tracing::warn!(
            "could not find {} version for {} {}, assuming incompatible",
            map.family(),
            map.distro(),
            release.label()
        );
        return Decision {
            passed: false,
            max_supported: None,
        };
    };

    match Version::parse(max_supported) {
        Ok(max) => Decision {
            passed: *required <= max,
            max_supported: Some(max_supported.to_string()),
        },
        Err(e) => {
            tracing::warn!("ignoring {} data for {}: {}", map.distro(), release.label(), e);
            Decision {
                passed: false,
                max_supported: None,
            }
        }
    }
}

/// Runs compatibility checks on bundles.
pub struct CompatibilityEngine<'a, D: ReferenceData> {
    data: &'a D,
    extractor: SymbolVersionExtractor,
    mounter: AppImageMounter,
    distros: Vec<Distro>,
}

impl<'a, D: ReferenceData> CompatibilityEngine<'a, D> {
    pub fn new(data: &'a D, extractor: SymbolVersionExtractor, mounter: AppImageMounter) -> Self {
        CompatibilityEngine {
            data,
            extractor,
            mounter,
            distros: Distro::ALL.to_vec(),
        }
    }

    /// Restrict the target distributions.
    pub fn with_distros(mut self, distros: Vec<Distro>) -> Self {
        self.distros = distros;
        self
    }

    pub fn distros(&self) -> &[Distro] {
        &self.distros
    }

    /// Check one symbol family.
    pub fn evaluate(
        &self,
        bundle: &Bundle,
        family: SymbolFamily,
    ) -> Result<Vec<CheckResult>, CheckError> {
        let mut all = self.evaluate_all(bundle, &[family])?;
        Ok(all.pop().map(|f| f.results).unwrap_or_default())
    }

    /// Check several families, mounting the bundle once.
    pub fn evaluate_all(
        &self,
        bundle: &Bundle,
        families: &[SymbolFamily],
    ) -> Result<Vec<FamilyResults>, CheckError> {
        let required = self.required_versions(bundle, families)?;

        required
            .iter()
            .map(|set| {
                if set.is_empty() {
                    tracing::warn!("no {} dependencies detected in {}", set.family(), bundle);
                } else {
                    tracing::info!(
                        "{} versions required by {}: {}",
                        set.family(),
                        bundle,
                        set.iter().collect::<Vec<_>>().join(", ")
                    );
                }

                Ok(FamilyResults {
                    family: set.family(),
                    results: self.results_for(set)?,
                })
            })
            .collect()
    }

    /// Required versions of each family, from the runtime and the payload.
    pub fn required_versions(
        &self,
        bundle: &Bundle,
        families: &[SymbolFamily],
    ) -> Result<Vec<SymbolVersionSet>, CheckError> {
        let mut sets: Vec<SymbolVersionSet> =
            families.iter().map(|&f| SymbolVersionSet::new(f)).collect();

        if let Some(runtime) = bundle.runtime_path() {
            tracing::debug!("scanning runtime of {}", bundle);
            if let Some(names) = binary_names(&self.extractor, runtime) {
                collect(&mut sets, &names);
            }
        }

        let payload = self
            .mounter
            .with_mounted(bundle, |root| self.scan_payload(root, families))?;

        for (set, found) in sets.iter_mut().zip(payload) {
            set.union(&found);
        }

        Ok(sets)
    }

    /// Versions required by every binary below `root`.
    fn scan_payload(
        &self,
        root: &Path,
        families: &[SymbolFamily],
    ) -> Result<Vec<SymbolVersionSet>, CheckError> {
        tracing::debug!("scanning binaries below {}", root.display());

        let empty = || -> Vec<SymbolVersionSet> {
            families.iter().map(|&f| SymbolVersionSet::new(f)).collect()
        };

        let extractor = &self.extractor;

        let sets = enumerate_binaries(root)
            .par_bridge()
            .filter(|_| !interrupted())
            .filter_map(|path| binary_names(extractor, &path))
            .fold(empty, |mut sets, names| {
                collect(&mut sets, &names);
                sets
            })
            .reduce(empty, |mut left, right| {
                for (l, r) in left.iter_mut().zip(&right) {
                    l.union(r);
                }
                left
            });

        if interrupted() {
            return Err(CheckError::Interrupted);
        }

        Ok(sets)
    }

    /// Verdicts of every target release for an aggregated set.
    pub fn results_for(&self, set: &SymbolVersionSet) -> Result<Vec<CheckResult>, CheckError> {
        let Some(required) = set.max() else {
            return Ok(Vec::new());
        };

        let mut results = Vec::new();

        for &distro in &self.distros {
            let map = self.data.version_map(distro, set.family())?;

            for release in self.data.releases(distro)? {
                let decision = decide(&required, &release, &map);
                results.push(CheckResult::new(
                    set.family(),
                    distro,
                    &release,
                    required.to_string(),
                    decision.max_supported,
                    decision.passed,
                ));
            }
        }

        Ok(results)
    }
}

/// Version names of one binary; failures are logged and skipped.
fn binary_names(extractor: &SymbolVersionExtractor, path: &Path) -> Option<Vec<String>> {
    match extractor.names(path) {
        Ok(names) => Some(names),
        Err(e) => {
            tracing::warn!("skipping {}: {}", path.display(), e);
            None
        }
    }
}

fn collect(sets: &mut [SymbolVersionSet], names: &[String]) {
    for set in sets.iter_mut() {
        let prefix = set.family().prefix();
        set.extend(filter_versions(prefix, names.iter().map(String::as_str)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::NativeIntrospector;
    use crate::test_support::elf::ElfFixture;
    use crate::test_support::StaticReferenceData;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn version_map(entries: &[(&str, &str)]) -> ReleaseVersionMap {
        let versions: BTreeMap<String, String> = entries
            .iter()
            .map(|(r, v)| (r.to_string(), v.to_string()))
            .collect();
        ReleaseVersionMap::new(Distro::Debian, SymbolFamily::Glibc, versions)
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn engine(data: &StaticReferenceData) -> CompatibilityEngine<'_, StaticReferenceData> {
        let extractor = SymbolVersionExtractor::new(Arc::new(NativeIntrospector::new()));
        CompatibilityEngine::new(data, extractor, AppImageMounter::default())
            .with_distros(vec![Distro::Debian])
    }

    fn debian_data() -> StaticReferenceData {
        StaticReferenceData::new()
            .with_releases(
                Distro::Debian,
                vec![Release::fixed("bullseye"), Release::fixed("buster")],
            )
            .with_versions(
                Distro::Debian,
                SymbolFamily::Glibc,
                &[("bullseye", "2.31"), ("buster", "2.24")],
            )
            .with_versions(
                Distro::Debian,
                SymbolFamily::Glibcxx,
                &[("bullseye", "3.4.28"), ("buster", "3.4.25")],
            )
    }

    #[test]
    fn test_decide_boundary() {
        let map = version_map(&[("bookworm", "2.36")]);
        let release = Release::fixed("bookworm");

        assert!(decide(&v("2.35"), &release, &map).passed);
        assert!(decide(&v("2.36"), &release, &map).passed);
        assert!(decide(&v("2.36.0"), &release, &map).passed);
        assert!(!decide(&v("2.36.1"), &release, &map).passed);
        assert!(!decide(&v("2.37"), &release, &map).passed);
    }

    #[test]
    fn test_decide_monotonic() {
        let map = version_map(&[("bullseye", "2.31")]);
        let release = Release::fixed("bullseye");
        let required = ["2.2.5", "2.17", "2.27", "2.31", "2.32", "2.34"];

        let verdicts: Vec<bool> = required
            .iter()
            .map(|r| decide(&v(r), &release, &map).passed)
            .collect();

        // once failing, a higher requirement never passes again
        assert_eq!(verdicts, vec![true, true, true, true, false, false]);
    }

    #[test]
    fn test_decide_uses_codename() {
        let map = version_map(&[("bookworm", "2.36")]);
        let release = Release::alias("stable", Some("bookworm".to_string()));

        let decision = decide(&v("2.36"), &release, &map);
        assert!(decision.passed);
        assert_eq!(decision.max_supported.as_deref(), Some("2.36"));
    }

    #[test]
    fn test_decide_backports_fallback() {
        let map = version_map(&[("stretch-backports", "2.28")]);
        let release = Release::fixed("stretch");

        let decision = decide(&v("2.27"), &release, &map);
        assert!(decision.passed);
        assert_eq!(decision.max_supported.as_deref(), Some("2.28"));
    }

    #[test]
    fn test_decide_unknown_release_fails() {
        let map = version_map(&[("bookworm", "2.36")]);

        let decision = decide(&v("2.2.5"), &Release::alias("unstable", None), &map);
        assert!(!decision.passed);
        assert_eq!(decision.max_supported, None);
    }

    #[test]
    fn test_decide_unresolved_suite_is_not_looked_up() {
        // the map is keyed by codename, a bare suite name must never match
        let map = version_map(&[("testing", "2.40")]);

        let decision = decide(&v("2.2.5"), &Release::alias("testing", None), &map);
        assert!(!decision.passed);
        assert_eq!(decision.max_supported, None);
    }

    #[test]
    fn test_backports_result_reports_original_release() {
        let data = StaticReferenceData::new()
            .with_releases(Distro::Debian, vec![Release::fixed("stretch")])
            .with_versions(Distro::Debian, SymbolFamily::Glibc, &[("stretch-backports", "2.28")]);

        let mut set = SymbolVersionSet::new(SymbolFamily::Glibc);
        set.extend(["2.27".to_string()]);

        let results = engine(&data).results_for(&set).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].release, "stretch");
        assert_eq!(results[0].id, "glibc_abi_check_debian_stretch");
        assert!(results[0].passed);
    }

    #[test]
    fn test_evaluate_appdir() {
        let tmp = TempDir::new().unwrap();
        let appdir = tmp.path().join("Test.AppDir");
        std::fs::create_dir_all(appdir.join("usr/bin")).unwrap();
        std::fs::create_dir_all(appdir.join("usr/lib")).unwrap();

        ElfFixture::new()
            .needs("libc.so.6", &["GLIBC_2.2.5", "GLIBC_2.27"])
            .write(&appdir.join("usr/bin/app"))
            .unwrap();
        ElfFixture::new()
            .needs("libc.so.6", &["GLIBC_2.29", "GLIBC_PRIVATE"])
            .needs("libstdc++.so.6", &["GLIBCXX_3.4.26", "CXXABI_1.3"])
            .write(&appdir.join("usr/lib/libhelper.so"))
            .unwrap();
        std::fs::write(appdir.join("AppRun.desktop"), "[Desktop Entry]\n").unwrap();

        let data = debian_data();
        let bundle = Bundle::open(&appdir).unwrap();
        let results = engine(&data).evaluate(&bundle, SymbolFamily::Glibc).unwrap();

        assert_eq!(results.len(), 2);

        let bullseye = &results[0];
        assert_eq!(bullseye.release, "bullseye");
        assert_eq!(bullseye.required, "2.29");
        assert_eq!(bullseye.max_supported.as_deref(), Some("2.31"));
        assert!(bullseye.passed);

        let buster = &results[1];
        assert_eq!(buster.release, "buster");
        assert!(!buster.passed);
        assert_eq!(buster.message, "AppImage can run on Debian buster");
    }

    #[test]
    fn test_evaluate_all_families_in_one_walk() {
        let tmp = TempDir::new().unwrap();
        ElfFixture::new()
            .needs("libc.so.6", &["GLIBC_2.17"])
            .needs("libstdc++.so.6", &["GLIBCXX_3.4.26", "GLIBCXX_3.4.9"])
            .write(&tmp.path().join("app"))
            .unwrap();

        let data = debian_data();
        let bundle = Bundle::open(tmp.path()).unwrap();
        let all = engine(&data)
            .evaluate_all(&bundle, &[SymbolFamily::Glibc, SymbolFamily::Glibcxx])
            .unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].family, SymbolFamily::Glibc);
        assert!(all[0].results.iter().all(|r| r.passed));

        assert_eq!(all[1].family, SymbolFamily::Glibcxx);
        assert_eq!(all[1].results[0].required, "3.4.26");
        assert!(all[1].results[0].passed);
        assert!(!all[1].results[1].passed);
    }

    #[test]
    fn test_no_requirements_no_results() {
        let tmp = TempDir::new().unwrap();
        ElfFixture::new()
            .needs("libz.so.1", &["ZLIB_1.2.9"])
            .write(&tmp.path().join("app"))
            .unwrap();
        std::fs::write(tmp.path().join("README"), "not a binary").unwrap();

        // no reference data at all: nothing may be looked up
        let data = StaticReferenceData::new();
        let bundle = Bundle::open(tmp.path()).unwrap();

        let results = engine(&data).evaluate(&bundle, SymbolFamily::Glibc).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_missing_reference_data_is_an_error() {
        let tmp = TempDir::new().unwrap();
        ElfFixture::new()
            .needs("libc.so.6", &["GLIBC_2.17"])
            .write(&tmp.path().join("app"))
            .unwrap();

        let data = StaticReferenceData::new();
        let bundle = Bundle::open(tmp.path()).unwrap();

        let err = engine(&data)
            .evaluate(&bundle, SymbolFamily::Glibc)
            .unwrap_err();
        assert!(matches!(err, CheckError::Cache(CacheError::OutOfDate { .. })));
    }

    #[test]
    fn test_broken_binary_is_skipped() {
        let tmp = TempDir::new().unwrap();
        ElfFixture::new()
            .needs("libc.so.6", &["GLIBC_2.17"])
            .write(&tmp.path().join("app"))
            .unwrap();
        // ELF magic, nothing else
        std::fs::write(tmp.path().join("truncated"), b"\x7fELF\x02\x01").unwrap();

        let data = debian_data();
        let bundle = Bundle::open(tmp.path()).unwrap();
        let results = engine(&data).evaluate(&bundle, SymbolFamily::Glibc).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].required, "2.17");
    }
}
