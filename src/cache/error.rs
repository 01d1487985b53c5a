//! Cache errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::elf::IntrospectionError;
use crate::util::http::NetworkError;

/// Failure to obtain reference data.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The record is missing or out of date and could not be refreshed.
    ///
    /// Carries the stale payload, if there was a usable one, so that callers
    /// that prefer old data over no data can still proceed.
    #[error("cached {key} is out of date: {message}")]
    OutOfDate {
        key: String,
        message: String,
        stale: Option<serde_json::Value>,
        #[source]
        source: Option<Box<CacheError>>,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("malformed reference data for {key}: {message}")]
    MalformedReferenceData { key: String, message: String },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("no bundled data directory is configured")]
    NoBundledDir,
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::MalformedReferenceData {
            key: key.into(),
            message: message.into(),
        }
    }

    /// The stale payload carried by an `OutOfDate` error.
    pub fn stale_data(&self) -> Option<&serde_json::Value> {
        match self {
            CacheError::OutOfDate { stale, .. } => stale.as_ref(),
            _ => None,
        }
    }
}
