//! ELF symbol version introspection.
//!
//! Binaries linked against GNU libraries record which versioned symbol sets
//! they need (`.gnu.version_r`) and, for the libraries themselves, which sets
//! they provide (`.gnu.version_d`). Reading those lists is enough to tell the
//! oldest library a binary can run against.

pub mod native;
pub mod readelf;
pub mod walker;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

pub use native::NativeIntrospector;
pub use readelf::ReadelfIntrospector;
pub use walker::{enumerate_binaries, is_elf_file, BinaryWalker};

/// Tokens that share a family prefix but are not versions.
const NON_VERSION_TOKENS: [&str; 2] = ["DEBUG_MESSAGE_LENGTH", "PRIVATE"];

/// Failure to introspect one binary.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a valid ELF file", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: goblin::error::Error,
    },

    #[error("{} is not an ELF file", .path.display())]
    NotElf { path: PathBuf },

    #[error("`{command}` failed: {message}")]
    Tool { command: String, message: String },

    #[error("readelf not found in PATH")]
    ToolNotFound,
}

/// Which version sections to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionQuery {
    /// Versions the binary needs from its dependencies
    Required,
    /// Versions the binary provides
    Defined,
    /// Both of the above
    Both,
}

impl VersionQuery {
    pub fn includes_required(&self) -> bool {
        matches!(self, VersionQuery::Required | VersionQuery::Both)
    }

    pub fn includes_defined(&self) -> bool {
        matches!(self, VersionQuery::Defined | VersionQuery::Both)
    }
}

/// A way of listing the version names recorded in an ELF file.
pub trait ElfIntrospector: Send + Sync {
    /// Raw version names (`GLIBC_2.27`, `GLIBCXX_3.4.29`, ...) in the selected sections.
    ///
    /// A file without version sections yields an empty list.
    fn version_names(
        &self,
        path: &Path,
        query: VersionQuery,
    ) -> Result<Vec<String>, IntrospectionError>;

    /// Backend name for log messages.
    fn name(&self) -> &'static str;
}

/// Selectable introspection backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntrospectorKind {
    /// In-process parsing with goblin
    #[default]
    Native,
    /// `readelf -V -W`
    Readelf,
}

impl IntrospectorKind {
    /// Instantiate the backend.
    pub fn create(&self) -> Result<Arc<dyn ElfIntrospector>, IntrospectionError> {
        Ok(match self {
            IntrospectorKind::Native => Arc::new(NativeIntrospector::new()),
            IntrospectorKind::Readelf => Arc::new(ReadelfIntrospector::from_path()?),
        })
    }
}

impl fmt::Display for IntrospectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrospectorKind::Native => f.write_str("native"),
            IntrospectorKind::Readelf => f.write_str("readelf"),
        }
    }
}

impl FromStr for IntrospectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(IntrospectorKind::Native),
            "readelf" => Ok(IntrospectorKind::Readelf),
            _ => Err(format!(
                "invalid introspector '{}', valid values: native, readelf",
                s
            )),
        }
    }
}

/// Reduce raw version names to the version suffixes of one family.
///
/// `GLIBC_2.27` becomes `2.27` for the `GLIBC_` prefix. Names of other
/// families that merely contain the prefix (`_GLIBC_` style private tags) and
/// non-numeric tags are dropped.
pub fn filter_versions<'a>(
    prefix: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let private_prefix = format!("_{}", prefix);
    let mut versions = Vec::new();

    for name in names {
        if !name.contains(prefix) {
            continue;
        }

        if name.contains(&private_prefix) {
            tracing::debug!("ignoring private version {}", name);
            continue;
        }

        if NON_VERSION_TOKENS.iter().any(|token| name.contains(token)) {
            tracing::debug!("ignoring non-version tag {}", name);
            continue;
        }

        let unversioned = name.rsplit("@@").next().unwrap_or(name);
        let suffix = unversioned.rsplit(prefix).next().unwrap_or_default();

        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit() || c == '.') {
            tracing::debug!("ignoring invalid version {} (from {})", suffix, name);
            continue;
        }

        versions.push(suffix.to_string());
    }

    versions
}

/// Extracts the versions of one symbol family from binaries.
#[derive(Clone)]
pub struct SymbolVersionExtractor {
    introspector: Arc<dyn ElfIntrospector>,
    query: VersionQuery,
}

impl SymbolVersionExtractor {
    /// Extractor reading the required versions only.
    pub fn new(introspector: Arc<dyn ElfIntrospector>) -> Self {
        SymbolVersionExtractor {
            introspector,
            query: VersionQuery::Required,
        }
    }

    /// Use a different section selection.
    pub fn with_query(mut self, query: VersionQuery) -> Self {
        self.query = query;
        self
    }

    pub fn introspector(&self) -> &dyn ElfIntrospector {
        self.introspector.as_ref()
    }

    /// Versions with `prefix` recorded in the binary at `path`.
    pub fn extract(&self, prefix: &str, path: &Path) -> Result<Vec<String>, IntrospectionError> {
        let names = self.introspector.version_names(path, self.query)?;
        Ok(filter_versions(prefix, names.iter().map(String::as_str)))
    }

    /// Raw version names, for callers that filter several families at once.
    pub fn names(&self, path: &Path) -> Result<Vec<String>, IntrospectionError> {
        self.introspector.version_names(path, self.query)
    }
}

impl fmt::Debug for SymbolVersionExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolVersionExtractor")
            .field("introspector", &self.introspector.name())
            .field("query", &self.query)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::elf::ElfFixture;
    use tempfile::TempDir;

    #[test]
    fn test_filter_versions() {
        let names = [
            "GLIBC_2.2.5",
            "GLIBC_2.27",
            "GLIBC_PRIVATE",
            "GLIBCXX_3.4.29",
            "CXXABI_1.3",
            "_GLIBC_INTERNAL_1.0",
            "foo@@GLIBC_2.29",
            "GLIBC_",
        ];

        assert_eq!(
            filter_versions("GLIBC_", names),
            vec!["2.2.5", "2.27", "2.29"]
        );
    }

    #[test]
    fn test_filter_versions_glibcxx() {
        let names = [
            "GLIBCXX_3.4",
            "GLIBCXX_3.4.30",
            "GLIBCXX_DEBUG_MESSAGE_LENGTH",
            "GLIBC_2.34",
            "CXXABI_1.3.13",
        ];

        assert_eq!(filter_versions("GLIBCXX_", names), vec!["3.4", "3.4.30"]);
    }

    #[test]
    fn test_extractor_reads_required_versions() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("app");
        ElfFixture::new()
            .needs("libc.so.6", &["GLIBC_2.2.5", "GLIBC_2.27", "GLIBC_PRIVATE"])
            .needs("libstdc++.so.6", &["GLIBCXX_3.4.21", "CXXABI_1.3"])
            .defines(&["GLIBC_9.9"])
            .write(&path)
            .unwrap();

        let extractor = SymbolVersionExtractor::new(Arc::new(NativeIntrospector::new()));

        let mut glibc = extractor.extract("GLIBC_", &path).unwrap();
        glibc.sort();
        assert_eq!(glibc, vec!["2.2.5", "2.27"]);

        let glibcxx = extractor.extract("GLIBCXX_", &path).unwrap();
        assert_eq!(glibcxx, vec!["3.4.21"]);

        let defined = extractor
            .clone()
            .with_query(VersionQuery::Defined)
            .extract("GLIBC_", &path)
            .unwrap();
        assert_eq!(defined, vec!["9.9"]);
    }

    #[test]
    fn test_introspector_kind_parsing() {
        assert_eq!("native".parse(), Ok(IntrospectorKind::Native));
        assert_eq!("readelf".parse(), Ok(IntrospectorKind::Readelf));
        assert!("objdump".parse::<IntrospectorKind>().is_err());
    }
}
