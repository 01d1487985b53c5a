//! Global context for appimagelint runs.
//!
//! Provides centralized access to the cache locations and the configuration
//! file path. Every location can be overridden through the environment, which
//! is what the integration tests and packagers rely on.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use directories::ProjectDirs;

use crate::util::config::Config;

/// Overrides the primary (user-writable) cache directory.
pub const CACHE_DIR_ENV: &str = "APPIMAGELINT_CACHE_DIR";

/// Overrides the bundled (read-only fallback) data directory.
pub const BUNDLED_DIR_ENV: &str = "APPIMAGELINT_BUNDLED_DIR";

/// Overrides the configuration file path.
pub const CONFIG_ENV: &str = "APPIMAGELINT_CONFIG";

/// Project directories for appimagelint
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("org", "AppImage", "appimagelint"));

/// Global context containing paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Primary cache directory (user-writable)
    cache_dir: PathBuf,

    /// Bundled fallback data shipped with the installation
    bundled_dir: Option<PathBuf>,

    /// Configuration file
    config_path: PathBuf,

    cache_dir_from_env: bool,
    bundled_dir_from_env: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext from the platform defaults and the environment.
    pub fn new() -> Self {
        let env_path = |key: &str| {
            std::env::var_os(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        let cache_from_env = env_path(CACHE_DIR_ENV);
        let bundled_from_env = env_path(BUNDLED_DIR_ENV);

        let cache_dir_from_env = cache_from_env.is_some();
        let bundled_dir_from_env = bundled_from_env.is_some();

        let cache_dir = cache_from_env.unwrap_or_else(default_cache_dir);
        let bundled_dir = bundled_from_env.or_else(default_bundled_dir);

        let config_path = env_path(CONFIG_ENV).unwrap_or_else(|| match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.config_dir().join("config.toml"),
            None => PathBuf::from("appimagelint.toml"),
        });

        GlobalContext {
            cache_dir,
            bundled_dir,
            config_path,
            cache_dir_from_env,
            bundled_dir_from_env,
        }
    }

    /// Create a context with explicit locations.
    pub fn with_dirs(cache_dir: PathBuf, bundled_dir: Option<PathBuf>) -> Self {
        GlobalContext {
            cache_dir,
            bundled_dir,
            config_path: PathBuf::from("appimagelint.toml"),
            cache_dir_from_env: true,
            bundled_dir_from_env: true,
        }
    }

    /// Apply directory settings from a configuration file.
    ///
    /// Environment overrides win over the configuration file.
    pub fn apply_config(&mut self, config: &Config) {
        if !self.cache_dir_from_env {
            if let Some(dir) = &config.cache.dir {
                self.cache_dir = dir.clone();
            }
        }

        if !self.bundled_dir_from_env {
            if let Some(dir) = &config.cache.bundled_dir {
                self.bundled_dir = Some(dir.clone());
            }
        }
    }

    /// Get the primary cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the bundled fallback data directory, if the installation has one.
    pub fn bundled_dir(&self) -> Option<&Path> {
        self.bundled_dir.as_deref()
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for GlobalContext {
    fn default() -> Self {
        Self::new()
    }
}

fn default_cache_dir() -> PathBuf {
    match PROJECT_DIRS.as_ref() {
        Some(dirs) => dirs.cache_dir().to_path_buf(),
        None => std::env::temp_dir().join("appimagelint-cache"),
    }
}

/// `<prefix>/share/appimagelint/data`, relative to the installed binary.
fn default_bundled_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let prefix = exe.parent()?.parent()?;
    Some(prefix.join("share").join("appimagelint").join("data"))
}
