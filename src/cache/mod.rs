//! Persistent cache of distribution reference data.
//!
//! Each piece of reference data (a codename map, a release list, a per-release
//! version map) is produced by a [`ReferenceSource`] and stored as one JSON
//! record:
//!
//! ```json
//! { "codebase_digest": "<hex>", "data": <payload> }
//! ```
//!
//! Records live in a user-writable primary directory. An installation may ship
//! a read-only bundled directory with the same layout that is consulted when
//! refreshing fails, which makes offline runs possible.
//!
//! A primary record is fresh when it was written by the current codebase (see
//! [`codebase_digest`]) and is younger than the TTL. A record from an older
//! codebase is never used, not even as stale data, since its payload may no
//! longer mean what the current code expects.

pub mod digest;
pub mod error;
pub mod runtime;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use digest::codebase_digest;
pub use error::CacheError;
pub use runtime::RuntimeCache;

use crate::sources::Mirrors;
use crate::util::config::{Config, DEFAULT_CACHE_TTL_SECS};
use crate::util::context::GlobalContext;
use crate::util::fs::write_atomic;
use crate::util::http::HttpClient;
use crate::util::display_error_chain;

/// A kind of reference data that can be fetched and cached.
pub trait ReferenceSource {
    /// Parsed data stored in the cache record.
    type Payload: Serialize + DeserializeOwned + Clone;

    /// Unprocessed fetch result.
    type Raw;

    /// File name of the cache record (`debian_codenames.json`).
    fn cache_key(&self) -> String;

    /// Fetch the current data from its origin.
    ///
    /// Sources that depend on other reference data obtain it through `cache`.
    fn fetch_latest(&self, cache: &CompatibilityCache) -> Result<Self::Raw, CacheError>;

    /// Turn fetched data into a payload. Malformed data is an error and is
    /// never stored.
    fn parse(&self, raw: Self::Raw) -> Result<Self::Payload, CacheError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord<T> {
    codebase_digest: String,
    data: T,
}

/// Where a record is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLocation {
    /// User cache directory
    Primary,
    /// Read-only data shipped with the installation
    Bundled,
}

/// Condition of a single cache record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Missing,
    /// Unreadable or not a cache record
    Invalid(String),
    /// Written by a different codebase
    DigestMismatch,
    /// Older than the TTL
    Expired,
    Fresh,
}

/// Status of one record, for `cache list`.
#[derive(Debug, Clone)]
pub struct RecordStatus {
    pub location: CacheLocation,
    pub path: PathBuf,
    pub state: RecordState,
    pub age: Option<Duration>,
}

enum Lookup {
    Missing,
    Invalid(String),
    DigestMismatch,
    Expired(serde_json::Value),
    Fresh(serde_json::Value),
}

/// Two-tier reference data cache, constructed once per run.
pub struct CompatibilityCache {
    primary_dir: PathBuf,
    fallback_dir: Option<PathBuf>,
    digest: String,
    ttl: Duration,
    http: HttpClient,
    mirrors: Mirrors,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CompatibilityCache {
    /// Create the cache for a run from the global context and configuration.
    pub fn new(ctx: &GlobalContext, config: &Config) -> Result<Self, CacheError> {
        let http = HttpClient::new(config.net.timeout(), config.net.offline)?;

        Ok(Self::with_dirs(
            ctx.cache_dir().to_path_buf(),
            ctx.bundled_dir().map(Path::to_path_buf),
            http,
        )
        .with_ttl(config.cache.ttl())
        .with_mirrors(Mirrors::from_config(&config.net)))
    }

    /// Create a cache over explicit directories with default settings.
    pub fn with_dirs(primary_dir: PathBuf, fallback_dir: Option<PathBuf>, http: HttpClient) -> Self {
        CompatibilityCache {
            primary_dir,
            fallback_dir,
            digest: codebase_digest().to_string(),
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            http,
            mirrors: Mirrors::default(),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override the maximum record age.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the codebase digest records are validated against.
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    /// Override the archive mirrors.
    pub fn with_mirrors(mut self, mirrors: Mirrors) -> Self {
        self.mirrors = mirrors;
        self
    }

    pub fn primary_dir(&self) -> &Path {
        &self.primary_dir
    }

    pub fn fallback_dir(&self) -> Option<&Path> {
        self.fallback_dir.as_deref()
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn mirrors(&self) -> &Mirrors {
        &self.mirrors
    }

    /// Get the payload of `source`, refreshing it if it is out of date.
    ///
    /// When refreshing fails and `raise_on_error` is false, stale primary data
    /// or, failing that, bundled data with a matching digest is returned with
    /// a warning. Otherwise the failure is returned as
    /// [`CacheError::OutOfDate`] carrying whatever stale data exists.
    pub fn get<S: ReferenceSource>(
        &self,
        source: &S,
        raise_on_error: bool,
    ) -> Result<S::Payload, CacheError> {
        let key = source.cache_key();
        let primary = self.primary_dir.join(&key);

        let stale = match self.lookup(&primary, true) {
            Lookup::Fresh(data) => match decode::<S::Payload>(&key, data) {
                Ok(payload) => {
                    tracing::debug!("{} still up to date, no update required", key);
                    return Ok(payload);
                }
                Err(e) => {
                    tracing::debug!("ignoring cached {}: {}", key, e);
                    None
                }
            },
            Lookup::Expired(data) => {
                tracing::debug!("{} is older than the cache TTL, updating", key);
                Some(data)
            }
            Lookup::DigestMismatch => {
                tracing::debug!("codebase changed since {} was written, updating", key);
                None
            }
            Lookup::Missing => {
                tracing::debug!("{} not cached yet, fetching", key);
                None
            }
            Lookup::Invalid(reason) => {
                tracing::debug!("ignoring invalid cache file {}: {}", primary.display(), reason);
                None
            }
        };

        let lock = self.key_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // someone else may have refreshed the record while we were waiting
        if let Lookup::Fresh(data) = self.lookup(&primary, true) {
            if let Ok(payload) = decode::<S::Payload>(&key, data) {
                return Ok(payload);
            }
        }

        match self.fetch(source) {
            Ok(payload) => {
                if let Err(e) = self.store(&primary, &payload) {
                    tracing::warn!(
                        "failed to store {} in cache: {}",
                        key,
                        display_error_chain(&e)
                    );
                }
                Ok(payload)
            }
            Err(err) => self.degrade::<S::Payload>(&key, stale, err, raise_on_error),
        }
    }

    /// Fetch `source` unconditionally and store it at `location`.
    pub fn update_now<S: ReferenceSource>(
        &self,
        source: &S,
        location: CacheLocation,
    ) -> Result<S::Payload, CacheError> {
        let key = source.cache_key();
        let path = self.location_dir(location)?.join(&key);

        let lock = self.key_lock(&key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let payload = self.fetch(source)?;
        self.store(&path, &payload)?;

        tracing::info!("updated {}", path.display());

        Ok(payload)
    }

    /// The payload stored for `source` at `location`, whatever its age.
    ///
    /// Records written by another codebase or that no longer decode are
    /// ignored. Nothing is fetched.
    pub fn stored<S: ReferenceSource>(&self, source: &S, location: CacheLocation) -> Option<S::Payload> {
        let key = source.cache_key();
        let path = self.location_dir(location).ok()?.join(&key);

        match self.lookup(&path, false) {
            Lookup::Fresh(data) => decode(&key, data).ok(),
            _ => None,
        }
    }

    /// Inspect the records stored for `key` in every location.
    pub fn status(&self, key: &str) -> Vec<RecordStatus> {
        let mut statuses = vec![self.record_status(CacheLocation::Primary, &self.primary_dir, key)];

        if let Some(fallback) = &self.fallback_dir {
            statuses.push(self.record_status(CacheLocation::Bundled, fallback, key));
        }

        statuses
    }

    /// Directory backing `location`.
    pub fn location_dir(&self, location: CacheLocation) -> Result<&Path, CacheError> {
        match location {
            CacheLocation::Primary => Ok(&self.primary_dir),
            CacheLocation::Bundled => self.fallback_dir.as_deref().ok_or(CacheError::NoBundledDir),
        }
    }

    /// Lock serializing updates of one key.
    pub(crate) fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Age of a file according to its mtime.
    pub(crate) fn file_age(path: &Path) -> Option<Duration> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    fn fetch<S: ReferenceSource>(&self, source: &S) -> Result<S::Payload, CacheError> {
        tracing::debug!("fetching {}", source.cache_key());
        let raw = source.fetch_latest(self)?;
        source.parse(raw)
    }

    fn degrade<T: DeserializeOwned>(
        &self,
        key: &str,
        stale: Option<serde_json::Value>,
        err: CacheError,
        raise_on_error: bool,
    ) -> Result<T, CacheError> {
        let fallback = self.fallback_data(key);

        if !raise_on_error {
            // a stale record that no longer decodes must not hide bundled data
            for data in stale.iter().chain(fallback.iter()) {
                match decode::<T>(key, data.clone()) {
                    Ok(payload) => {
                        tracing::warn!(
                            "{} needs an update, but updating failed, using cached data: {}",
                            key,
                            display_error_chain(&err)
                        );
                        return Ok(payload);
                    }
                    Err(e) => tracing::debug!("ignoring cached {}: {}", key, e),
                }
            }
        }

        let stale = stale.or(fallback);

        Err(CacheError::OutOfDate {
            key: key.to_string(),
            message: "updating failed".to_string(),
            stale,
            source: Some(Box::new(err)),
        })
    }

    /// Bundled data, if present and written by the current codebase.
    fn fallback_data(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.fallback_dir.as_ref()?.join(key);

        match self.lookup(&path, false) {
            Lookup::Fresh(data) => {
                tracing::debug!("found {} in bundled data", key);
                Some(data)
            }
            Lookup::DigestMismatch => {
                tracing::debug!("bundled {} was written by a different codebase", key);
                None
            }
            _ => None,
        }
    }

    fn lookup(&self, path: &Path, check_age: bool) -> Lookup {
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Lookup::Missing,
            Err(e) => return Lookup::Invalid(e.to_string()),
        };

        let record: CacheRecord<serde_json::Value> = match serde_json::from_slice(&contents) {
            Ok(record) => record,
            Err(e) => return Lookup::Invalid(e.to_string()),
        };

        if record.codebase_digest != self.digest {
            return Lookup::DigestMismatch;
        }

        if check_age {
            if let Some(age) = Self::file_age(path) {
                if age > self.ttl {
                    return Lookup::Expired(record.data);
                }
            }
        }

        Lookup::Fresh(record.data)
    }

    fn record_status(&self, location: CacheLocation, dir: &Path, key: &str) -> RecordStatus {
        let path = dir.join(key);
        let check_age = location == CacheLocation::Primary;

        let state = match self.lookup(&path, check_age) {
            Lookup::Missing => RecordState::Missing,
            Lookup::Invalid(reason) => RecordState::Invalid(reason),
            Lookup::DigestMismatch => RecordState::DigestMismatch,
            Lookup::Expired(_) => RecordState::Expired,
            Lookup::Fresh(_) => RecordState::Fresh,
        };

        RecordStatus {
            location,
            age: Self::file_age(&path),
            path,
            state,
        }
    }

    fn store<T: Serialize>(&self, path: &Path, payload: &T) -> Result<(), CacheError> {
        let record = CacheRecord {
            codebase_digest: self.digest.clone(),
            data: payload,
        };

        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| CacheError::io(path, io::Error::other(e)))?;

        write_atomic(path, &json).map_err(|e| CacheError::io(path, e))
    }
}

impl std::fmt::Debug for CompatibilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatibilityCache")
            .field("primary_dir", &self.primary_dir)
            .field("fallback_dir", &self.fallback_dir)
            .field("ttl", &self.ttl)
            .field("offline", &self.http.is_offline())
            .finish()
    }
}

fn decode<T: DeserializeOwned>(key: &str, data: serde_json::Value) -> Result<T, CacheError> {
    serde_json::from_value(data).map_err(|e| CacheError::malformed(key, e.to_string()))
}
