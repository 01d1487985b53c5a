//! Configuration file support.
//!
//! appimagelint reads an optional `config.toml` from the platform config
//! directory (or `$APPIMAGELINT_CONFIG`). Every setting has a default, and
//! command-line flags take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default age after which cached reference data is refreshed (one week).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Default Debian archive mirror.
pub const DEFAULT_DEBIAN_MIRROR: &str = "https://ftp.fau.de/debian/";

/// Default Ubuntu archive mirror.
pub const DEFAULT_UBUNTU_MIRROR: &str = "https://ftp.fau.de/ubuntu/";

/// Release channel the AppImage runtime is downloaded from.
pub const DEFAULT_RUNTIME_URL: &str =
    "https://github.com/AppImage/AppImageKit/releases/download/continuous/";

/// appimagelint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache settings
    pub cache: CacheConfig,

    /// Network settings
    pub net: NetConfig,

    /// Check selection
    pub check: CheckConfig,
}

/// Reference data cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a cache record in seconds
    pub ttl_secs: u64,

    /// Primary cache directory override
    pub dir: Option<PathBuf>,

    /// Bundled fallback data directory override
    pub bundled_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            dir: None,
            bundled_dir: None,
        }
    }
}

impl CacheConfig {
    /// The TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Offline mode (don't fetch from network)
    pub offline: bool,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Debian archive mirror
    pub debian_mirror: String,

    /// Ubuntu archive mirror
    pub ubuntu_mirror: String,

    /// Where `runtime-<arch>` is downloaded from
    pub runtime_url: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            offline: false,
            timeout_secs: 60,
            debian_mirror: DEFAULT_DEBIAN_MIRROR.to_string(),
            ubuntu_mirror: DEFAULT_UBUNTU_MIRROR.to_string(),
            runtime_url: DEFAULT_RUNTIME_URL.to_string(),
        }
    }
}

impl NetConfig {
    /// The request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which checks to run by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Target distributions (`debian`, `ubuntu`); empty means all
    pub distros: Vec<String>,

    /// Symbol families (`glibc`, `glibcxx`); empty means all
    pub families: Vec<String>,

    /// Worker threads for symbol extraction
    pub jobs: Option<usize>,

    /// ELF introspection backend (`native` or `readelf`)
    pub introspector: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.ttl(), Duration::from_secs(604800));
        assert!(!config.net.offline);
        assert_eq!(config.net.debian_mirror, DEFAULT_DEBIAN_MIRROR);
        assert!(config.check.distros.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[net]\noffline = true\nruntime_url = \"http://mirror.example/appimage/\"\n\n[check]\ndistros = [\"debian\"]\njobs = 4\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.net.offline);
        assert_eq!(config.net.timeout_secs, 60);
        assert_eq!(config.net.runtime_url, "http://mirror.example/appimage/");
        assert_eq!(config.net.debian_mirror, DEFAULT_DEBIAN_MIRROR);
        assert_eq!(config.check.distros, vec!["debian".to_string()]);
        assert_eq!(config.check.jobs, Some(4));
        assert_eq!(config.cache.ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn test_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[net\noffline = ").unwrap();

        assert!(Config::load_or_default(&path).is_err());
    }
}
