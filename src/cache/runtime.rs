//! Cached AppImage runtime used to mount bundles.
//!
//! The runtime is a binary artifact rather than JSON data. It is stored next
//! to a sidecar record `<name>.json` holding its SHA-256, which subjects it to
//! the same digest and TTL rules as every other record.

use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};

use super::{decode, CacheError, CacheLocation, CompatibilityCache, Lookup};
use crate::util::display_error_chain;
use crate::util::fs::{make_executable, write_atomic};
use crate::util::hash::{sha256_bytes, sha256_file};

/// Offset and length of the AppImage magic in the runtime's ELF padding.
const MAGIC_OFFSET: usize = 8;
const MAGIC_LEN: usize = 3;

/// AppImage architecture name for the host.
pub fn host_runtime_arch() -> Option<&'static str> {
    match std::env::consts::ARCH {
        "x86_64" => Some("x86_64"),
        "x86" => Some("i686"),
        "aarch64" => Some("aarch64"),
        "arm" => Some("armhf"),
        _ => None,
    }
}

/// Clear the AppImage magic so that desktop integration tools ignore the runtime.
pub fn patch_runtime(bytes: &mut [u8]) -> bool {
    match bytes.get_mut(MAGIC_OFFSET..MAGIC_OFFSET + MAGIC_LEN) {
        Some(magic) => {
            magic.fill(0);
            true
        }
        None => false,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RuntimeRecord {
    sha256: String,
}

enum ArtifactState {
    Fresh,
    Expired,
    Unusable(String),
}

/// Runtime artifact for one architecture.
pub struct RuntimeCache<'a> {
    cache: &'a CompatibilityCache,
    arch: String,
}

impl<'a> RuntimeCache<'a> {
    /// Runtime for the host architecture, if AppImage supports it.
    pub fn for_host(cache: &'a CompatibilityCache) -> Option<Self> {
        host_runtime_arch().map(|arch| Self::for_arch(cache, arch))
    }

    pub fn for_arch(cache: &'a CompatibilityCache, arch: &str) -> Self {
        RuntimeCache {
            cache,
            arch: arch.to_string(),
        }
    }

    /// File name of the artifact (`runtime-x86_64`).
    pub fn file_name(&self) -> String {
        format!("runtime-{}", self.arch)
    }

    /// File name of the sidecar record.
    pub fn record_key(&self) -> String {
        format!("{}.json", self.file_name())
    }

    /// Download URL on the configured release channel.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.cache.mirrors().runtime.trim_end_matches('/'),
            self.file_name()
        )
    }

    /// Path to a usable runtime, downloading it if necessary.
    ///
    /// Falls back to a stale primary copy or a bundled copy unless
    /// `raise_on_error` is set.
    pub fn get(&self, raise_on_error: bool) -> Result<PathBuf, CacheError> {
        let primary_dir = self.cache.primary_dir();
        let primary = primary_dir.join(self.file_name());

        let stale = match self.inspect(primary_dir, true) {
            ArtifactState::Fresh => {
                tracing::debug!("AppImage runtime still up to date");
                return Ok(primary);
            }
            ArtifactState::Expired => {
                tracing::debug!("AppImage runtime older than cache TTL, updating");
                Some(primary.clone())
            }
            ArtifactState::Unusable(reason) => {
                tracing::debug!("AppImage runtime needs download: {}", reason);
                None
            }
        };

        let key = self.record_key();
        let lock = self.cache.key_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let ArtifactState::Fresh = self.inspect(primary_dir, true) {
            return Ok(primary);
        }

        let err = match self.download(primary_dir) {
            Ok(path) => return Ok(path),
            Err(err) => err,
        };

        let fallback = self.cache.fallback_dir().and_then(|dir| {
            match self.inspect(dir, false) {
                ArtifactState::Fresh => Some(dir.join(self.file_name())),
                _ => None,
            }
        });

        if !raise_on_error {
            if let Some(path) = stale.or(fallback) {
                tracing::warn!(
                    "AppImage runtime needs update, but update failed, using {}: {}",
                    path.display(),
                    display_error_chain(&err)
                );
                return Ok(path);
            }
        }

        Err(CacheError::OutOfDate {
            key,
            message: "downloading the AppImage runtime failed".to_string(),
            stale: None,
            source: Some(Box::new(err)),
        })
    }

    /// Download the runtime unconditionally into `location`.
    pub fn update_now(&self, location: CacheLocation) -> Result<PathBuf, CacheError> {
        let dir = self.cache.location_dir(location)?;

        let lock = self.cache.key_lock(&self.record_key());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.download(dir)?;
        tracing::info!("updated {}", path.display());
        Ok(path)
    }

    fn download(&self, dir: &Path) -> Result<PathBuf, CacheError> {
        let url = self.url();
        tracing::info!("downloading AppImage runtime from {}", url);

        let mut bytes = self.cache.http().get_bytes(&url)?;
        self.install(dir, &mut bytes)
    }

    /// Patch and store runtime bytes plus their sidecar record.
    fn install(&self, dir: &Path, bytes: &mut [u8]) -> Result<PathBuf, CacheError> {
        if !bytes.starts_with(b"\x7fELF") || !patch_runtime(bytes) {
            return Err(CacheError::malformed(
                self.file_name(),
                "download is not an ELF runtime",
            ));
        }

        let path = dir.join(self.file_name());
        write_atomic(&path, bytes).map_err(|e| CacheError::io(&path, e))?;
        make_executable(&path).map_err(|e| CacheError::io(&path, e))?;

        let record = RuntimeRecord {
            sha256: sha256_bytes(bytes),
        };
        self.cache.store(&dir.join(self.record_key()), &record)?;

        Ok(path)
    }

    fn inspect(&self, dir: &Path, check_age: bool) -> ArtifactState {
        let key = self.record_key();

        let (data, expired) = match self.cache.lookup(&dir.join(&key), check_age) {
            Lookup::Fresh(data) => (data, false),
            Lookup::Expired(data) => (data, true),
            Lookup::Missing => return ArtifactState::Unusable("not downloaded yet".to_string()),
            Lookup::DigestMismatch => {
                return ArtifactState::Unusable("codebase changed since download".to_string())
            }
            Lookup::Invalid(reason) => return ArtifactState::Unusable(reason),
        };

        let record: RuntimeRecord = match decode(&key, data) {
            Ok(record) => record,
            Err(e) => return ArtifactState::Unusable(e.to_string()),
        };

        match sha256_file(&dir.join(self.file_name())) {
            Ok(sum) if sum == record.sha256 => {}
            Ok(_) => return ArtifactState::Unusable("checksum mismatch".to_string()),
            Err(e) => return ArtifactState::Unusable(e.to_string()),
        }

        if expired {
            ArtifactState::Expired
        } else {
            ArtifactState::Fresh
        }
    }
}
