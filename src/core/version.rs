//! Dotted numeric versions as used by GNU symbol versioning (`2.27`, `3.4.29`).
//!
//! Ordering is component-wise on the integers, so `0.1.10 > 0.1.9`. Missing
//! trailing components count as zero.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error parsing a dotted version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version `{input}`: {reason}")]
pub struct VersionParseError {
    pub input: String,
    pub reason: &'static str,
}

/// An ordered dotted numeric version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    components: Vec<u64>,
}

impl Version {
    /// Parse a version, ignoring everything from the first `-` on.
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let error = |reason| VersionParseError {
            input: s.to_string(),
            reason,
        };

        let raw = s.split('-').next().unwrap_or_default().trim();
        if raw.is_empty() {
            return Err(error("empty version"));
        }

        let components = raw
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| error("non-numeric component")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Version {
            raw: raw.to_string(),
            components,
        })
    }

    /// The numeric components.
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// The version as written (after truncation at `-`).
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());

        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);

            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Return the greatest version in `versions`.
///
/// Strings that do not parse are skipped with a debug message. Returns `None`
/// when nothing parseable remains.
pub fn max_version<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<Version> {
    versions
        .into_iter()
        .filter_map(|v| match Version::parse(v) {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::debug!("ignoring {}", e);
                None
            }
        })
        .max()
}

/// Normalize a Debian package version to a comparable upstream version.
///
/// Strips the epoch, cuts at the first `-`, `+` or `~` and keeps at most
/// `components` dotted components: `2.36-9+deb12u4` becomes `2.36`.
pub fn normalize_package_version(version: &str, components: usize) -> String {
    let without_epoch = match version.split_once(':') {
        Some((epoch, rest)) if epoch.chars().all(|c| c.is_ascii_digit()) => rest,
        _ => version,
    };

    let upstream = without_epoch
        .split(['-', '+', '~'])
        .next()
        .unwrap_or_default();

    upstream
        .split('.')
        .take(components)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert!(v("0.1.10") > v("0.1.9"));
        // plain string comparison disagrees
        assert!("0.1.10" < "0.1.9");

        assert!(v("2.10") > v("2.9"));
        assert!(v("3.4.30") > v("3.4.4"));
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(v("2.3"), v("2.3.0"));
        assert!(v("2.3.0") <= v("2.3"));
        assert!(v("2.3.1") > v("2.3"));
    }

    #[test]
    fn test_dash_suffix_is_ignored() {
        let version = v("2.28-10");
        assert_eq!(version.as_str(), "2.28");
        assert_eq!(version.components(), &[2, 28]);
    }

    #[test]
    fn test_invalid_versions() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("PRIVATE").is_err());
        assert!(Version::parse("2..3").is_err());
        assert!(Version::parse("-1").is_err());
    }

    #[test]
    fn test_max_version() {
        let max = max_version(["2.2.5", "2.29", "2.3", "2.27"]).unwrap();
        assert_eq!(max.as_str(), "2.29");

        let max = max_version(["bogus", "3.4.9", "3.4.10"]).unwrap();
        assert_eq!(max.as_str(), "3.4.10");

        assert!(max_version(std::iter::empty()).is_none());
        assert!(max_version(["nope"]).is_none());
    }

    #[test]
    fn test_normalize_package_version() {
        assert_eq!(normalize_package_version("2.36-9+deb12u4", 2), "2.36");
        assert_eq!(normalize_package_version("2.35-0ubuntu3.8", 3), "2.35");
        assert_eq!(normalize_package_version("1:2.31.1-2", 2), "2.31");
        assert_eq!(normalize_package_version("2.39~rc1-1", 2), "2.39");
    }
}
