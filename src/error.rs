use core::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::{error, io};

#[cfg(feature = "s3")]
use rusoto_core::region::ParseRegionError;
#[cfg(feature = "s3")]
use rusoto_core::RusotoError;
use thiserror::Error;

use crate::types::{LogicalPath, VersionNum};

pub type Result<T, E = RocflError> = core::result::Result<T, E>;

/// Errors produced by the object engine.
///
/// `NotFound`, `AlreadyExists`, `OutOfSync`, `Overwrite`, `PathConstraint`, `Lock`, and
/// `Validation` are meant to be matched on by callers and surfaced untranslated. `Io` and
/// `CorruptObject` carry their own context (object id, path) at the point they're raised.
#[derive(Error)]
pub enum RocflError {
    #[error("Object {object_id} not found")]
    NotFound { object_id: String },

    #[error("Object {object_id} version {version} not found")]
    VersionNotFound {
        object_id: String,
        version: VersionNum,
    },

    #[error("Object {0} already exists")]
    AlreadyExists(String),

    #[error("Object {object_id} is out of sync: expected head {expected}, found {actual}")]
    OutOfSync {
        object_id: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot write {path}: a file already exists there. Specify OVERWRITE to replace it.")]
    Overwrite { path: LogicalPath },

    #[error("Path {path} violates constraint: {reason}")]
    PathConstraint { path: String, reason: String },

    #[error("Fixity check failed for {algorithm}: expected {expected}, found {actual}")]
    FixityMismatch {
        algorithm: String,
        expected: String,
        actual: String,
    },

    #[error("Object {object_id} is corrupt: {message}")]
    CorruptObject { object_id: String, message: String },

    #[error("Validation failed with {error_count} error(s)")]
    Validation { error_count: usize },

    #[error("Failed to acquire lock on {0} within the configured timeout")]
    Lock(String),

    #[error("{0}")]
    Io(io::Error),

    #[error("Invalid repository configuration: {0}")]
    Config(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("{0}")]
    General(String),

    #[error("The repository has been closed")]
    Closed,

    #[error("{0}")]
    Wrapped(Box<dyn error::Error>),
}

/// Constructs a `RocflError::NotFound` (or `VersionNotFound`) error.
pub fn not_found(object_id: &str, version_num: Option<VersionNum>) -> RocflError {
    match version_num {
        Some(version) => RocflError::VersionNotFound {
            object_id: object_id.to_string(),
            version,
        },
        None => RocflError::NotFound {
            object_id: object_id.to_string(),
        },
    }
}

/// Constructs a `RocflError::NotFound` for a missing logical path within a specific version.
pub fn not_found_path(object_id: &str, version_num: VersionNum, path: &LogicalPath) -> RocflError {
    RocflError::NotFound {
        object_id: format!("{} (version {}, path {})", object_id, version_num, path),
    }
}

impl RocflError {
    /// Convenience constructor for the lock timeout case.
    pub fn lock_timeout(key: &str) -> Self {
        RocflError::Lock(key.to_string())
    }
}

impl Debug for RocflError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for RocflError {
    fn from(e: io::Error) -> Self {
        RocflError::Io(e)
    }
}

impl From<globset::Error> for RocflError {
    fn from(e: globset::Error) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

impl From<serde_json::Error> for RocflError {
    fn from(e: serde_json::Error) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

impl From<walkdir::Error> for RocflError {
    fn from(e: walkdir::Error) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

#[cfg(feature = "details-store")]
impl From<rusqlite::Error> for RocflError {
    fn from(e: rusqlite::Error) -> Self {
        RocflError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

#[cfg(feature = "s3")]
impl From<ParseRegionError> for RocflError {
    fn from(e: ParseRegionError) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}

#[cfg(feature = "s3")]
impl<T: error::Error + 'static> From<RusotoError<T>> for RocflError {
    fn from(e: RusotoError<T>) -> Self {
        RocflError::Wrapped(Box::new(e))
    }
}
