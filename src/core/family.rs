//! Symbol families and the version sets collected for them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::version::{max_version, Version};

/// A group of versioned dynamic symbols belonging to one system library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolFamily {
    /// GNU C library, `GLIBC_x.y`
    Glibc,
    /// GNU C++ standard library, `GLIBCXX_x.y.z`
    Glibcxx,
}

impl SymbolFamily {
    pub const ALL: [SymbolFamily; 2] = [SymbolFamily::Glibc, SymbolFamily::Glibcxx];

    /// Short identifier used in cache keys and result IDs.
    pub fn id(&self) -> &'static str {
        match self {
            SymbolFamily::Glibc => "glibc",
            SymbolFamily::Glibcxx => "glibcxx",
        }
    }

    /// Symbol version prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            SymbolFamily::Glibc => "GLIBC_",
            SymbolFamily::Glibcxx => "GLIBCXX_",
        }
    }

    /// Human-readable check name.
    pub fn check_name(&self) -> &'static str {
        match self {
            SymbolFamily::Glibc => "GNU libc ABI check",
            SymbolFamily::Glibcxx => "GNU libstdc++ ABI check",
        }
    }

    /// Identifier of the check for this family (`glibc_abi_check`).
    pub fn check_id(&self) -> String {
        format!("{}_abi_check", self.id())
    }
}

impl fmt::Display for SymbolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SymbolFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "glibc" | "libc" => Ok(SymbolFamily::Glibc),
            "glibcxx" | "libstdc++" | "libstdcxx" => Ok(SymbolFamily::Glibcxx),
            _ => Err(format!(
                "invalid symbol family '{}', valid values: glibc, glibcxx",
                s
            )),
        }
    }
}

/// Version suffixes of one symbol family, collected from one or more binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolVersionSet {
    family: SymbolFamily,
    versions: BTreeSet<String>,
}

impl SymbolVersionSet {
    /// Create an empty set.
    pub fn new(family: SymbolFamily) -> Self {
        SymbolVersionSet {
            family,
            versions: BTreeSet::new(),
        }
    }

    pub fn family(&self) -> SymbolFamily {
        self.family
    }

    /// Merge versions into the set.
    pub fn extend(&mut self, versions: impl IntoIterator<Item = String>) {
        self.versions.extend(versions);
    }

    /// Merge another set of the same family.
    pub fn union(&mut self, other: &SymbolVersionSet) {
        debug_assert_eq!(self.family, other.family);
        self.versions.extend(other.versions.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(String::as_str)
    }

    /// The highest version in the set.
    pub fn max(&self) -> Option<Version> {
        max_version(self.iter())
    }
}
