//! Debian reference data: suite codenames and glibc versions.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::cache::{CacheError, CompatibilityCache, ReferenceSource};
use crate::core::distro::{Distro, DEBIAN_SUITES};
use crate::core::version::{normalize_package_version, Version};
use crate::sources::{CodenameMap, VersionTable};

/// Debian sources API endpoint listing every glibc source package version.
pub const DEBIAN_GLIBC_SOURCES_URL: &str = "https://sources.debian.org/api/src/glibc/";

/// Only the head of a `Release` file is needed to read its codename.
const RELEASE_HEAD_RANGE: &str = "bytes=0-512";

/// Maps the rolling suites (`stable`, ...) to their current codenames.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebianCodenames;

impl ReferenceSource for DebianCodenames {
    type Payload = CodenameMap;
    /// `(suite, head of the suite's Release file)`
    type Raw = Vec<(String, String)>;

    fn cache_key(&self) -> String {
        "debian_codenames.json".to_string()
    }

    fn fetch_latest(&self, cache: &CompatibilityCache) -> Result<Self::Raw, CacheError> {
        tracing::info!("fetching Debian codenames");

        DEBIAN_SUITES
            .iter()
            .map(|suite| -> Result<(String, String), CacheError> {
                let url = cache
                    .mirrors()
                    .url(Distro::Debian, &format!("dists/{}/Release", suite));
                let head = cache.http().get_text(&url, Some(RELEASE_HEAD_RANGE))?;
                Ok((suite.to_string(), head))
            })
            .collect()
    }

    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError> {
        let mut codenames = CodenameMap::new();

        for (suite, head) in raw {
            let codename = head
                .lines()
                .find_map(|line| line.strip_prefix("Codename:"))
                .map(str::trim)
                .filter(|codename| !codename.is_empty())
                .ok_or_else(|| {
                    CacheError::malformed(
                        self.cache_key(),
                        format!("no codename in Release file of {}", suite),
                    )
                })?;

            codenames.insert(suite, codename.to_string());
        }

        Ok(codenames)
    }
}

/// Codenames of the checked suites, oldest first.
pub fn suite_codenames(codenames: &CodenameMap) -> Vec<String> {
    DEBIAN_SUITES
        .iter()
        .filter_map(|suite| codenames.get(*suite).cloned())
        .collect()
}

#[derive(Debug, Deserialize)]
struct SourcesApiResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    versions: Vec<SourceVersion>,
}

#[derive(Debug, Deserialize)]
struct SourceVersion {
    version: String,
    #[serde(default)]
    suites: Vec<String>,
}

/// Maximum glibc version per Debian codename, from the sources API.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebianGlibcVersions;

impl ReferenceSource for DebianGlibcVersions {
    type Payload = VersionTable;
    /// JSON body of the sources API response
    type Raw = String;

    fn cache_key(&self) -> String {
        "debian_glibc_versions.json".to_string()
    }

    fn fetch_latest(&self, cache: &CompatibilityCache) -> Result<Self::Raw, CacheError> {
        tracing::info!("fetching glibc package versions from Debian sources API");
        Ok(cache.http().get_text(DEBIAN_GLIBC_SOURCES_URL, None)?)
    }

    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError> {
        let response: SourcesApiResponse = serde_json::from_str(&raw)
            .map_err(|e| CacheError::malformed(self.cache_key(), e.to_string()))?;

        if let Some(error) = response.error {
            return Err(CacheError::malformed(
                self.cache_key(),
                format!("Debian sources API returned an error: {}", error),
            ));
        }

        let mut maxima: BTreeMap<String, Version> = BTreeMap::new();

        for entry in &response.versions {
            let normalized = normalize_package_version(&entry.version, 2);
            let version = match Version::parse(&normalized) {
                Ok(version) => version,
                Err(e) => {
                    tracing::debug!("skipping glibc version {}: {}", entry.version, e);
                    continue;
                }
            };

            for suite in &entry.suites {
                match maxima.get(suite) {
                    Some(current) if *current >= version => {}
                    _ => {
                        maxima.insert(suite.clone(), version.clone());
                    }
                }
            }
        }

        if maxima.is_empty() {
            return Err(CacheError::malformed(
                self.cache_key(),
                "no glibc versions in response",
            ));
        }

        Ok(maxima
            .into_iter()
            .map(|(suite, version)| (suite, version.to_string()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codenames() {
        let raw = vec![
            (
                "stable".to_string(),
                "Origin: Debian\nLabel: Debian\nSuite: stable\nVersion: 12.5\nCodename: bookworm\nDate: Sat, 10 Feb 2024"
                    .to_string(),
            ),
            (
                "unstable".to_string(),
                "Origin: Debian\nSuite: unstable\nCodename: sid\n".to_string(),
            ),
        ];

        let codenames = DebianCodenames.parse(raw).unwrap();
        assert_eq!(codenames.get("stable").map(String::as_str), Some("bookworm"));
        assert_eq!(codenames.get("unstable").map(String::as_str), Some("sid"));
    }

    #[test]
    fn test_parse_codenames_truncated() {
        let raw = vec![("testing".to_string(), "Origin: Debian\nLabel: Deb".to_string())];

        let err = DebianCodenames.parse(raw).unwrap_err();
        assert!(matches!(err, CacheError::MalformedReferenceData { .. }));
    }

    #[test]
    fn test_parse_glibc_versions() {
        let raw = r#"{
            "package": "glibc",
            "versions": [
                {"area": "main", "suites": ["bookworm"], "version": "2.36-9+deb12u4"},
                {"area": "main", "suites": ["bookworm"], "version": "2.36-9"},
                {"area": "main", "suites": ["bullseye"], "version": "2.31-13+deb11u8"},
                {"area": "main", "suites": ["sid", "trixie"], "version": "2.40-3"},
                {"area": "main", "suites": ["sid"], "version": "2.9-1"},
                {"area": "main", "suites": ["buster-backports"], "version": "2.28-10"}
            ]
        }"#;

        let versions = DebianGlibcVersions.parse(raw.to_string()).unwrap();
        assert_eq!(versions.get("bookworm").map(String::as_str), Some("2.36"));
        assert_eq!(versions.get("bullseye").map(String::as_str), Some("2.31"));
        // numeric, not lexicographic: 2.40 beats 2.9
        assert_eq!(versions.get("sid").map(String::as_str), Some("2.40"));
        assert_eq!(versions.get("trixie").map(String::as_str), Some("2.40"));
        assert_eq!(
            versions.get("buster-backports").map(String::as_str),
            Some("2.28")
        );
    }

    #[test]
    fn test_parse_glibc_error_envelope() {
        let raw = r#"{"error": "404 Not Found"}"#.to_string();

        let err = DebianGlibcVersions.parse(raw).unwrap_err();
        assert!(matches!(err, CacheError::MalformedReferenceData { .. }));
    }

    #[test]
    fn test_parse_glibc_garbage() {
        assert!(DebianGlibcVersions.parse("<html>".to_string()).is_err());
        assert!(DebianGlibcVersions
            .parse(r#"{"versions": []}"#.to_string())
            .is_err());
    }
}
