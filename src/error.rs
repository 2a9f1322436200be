//! Error types for the resource cache
//!
//! Provides unified error handling using thiserror.
//!
//! Only [`LoadError`] ever reaches a caller of `Loader::resolve`. Storage
//! failures are logged inside the disk tier and surface as cache misses.

use std::path::PathBuf;

use thiserror::Error;

// == Fetch Error ==
/// Failure reported by a `Fetcher` while retrieving raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The remote side answered with a non-success status
    #[error("Bad response from {address}: HTTP {status}")]
    BadStatus { address: String, status: u16 },

    /// The request never produced a response (I/O, DNS, invalid address, ...)
    #[error("Transport failure for {address}: {message}")]
    Transport { address: String, message: String },
}

// == Decode Error ==
/// Failure reported by a `Codec` when bytes are not a supported encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot decode content: {message}")]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// == Load Error ==
/// Error returned by `Loader::resolve`.
///
/// Every caller attached to the same in-flight operation receives an equal
/// value, so the type is `Clone + PartialEq`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Transport or address problem
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Malformed or unsupported content
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl LoadError {
    /// True when the failure came from the transport side.
    pub fn is_fetch(&self) -> bool {
        matches!(self, LoadError::Fetch(_))
    }

    /// True when the bytes arrived but could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, LoadError::Decode(_))
    }
}

// == Storage Error ==
/// Filesystem failure inside the disk tier. Never propagated to resolve callers.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A single filesystem call failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bulk operation finished with some entries left behind
    #[error("{failed} of {attempted} entries could not be removed")]
    Incomplete { failed: usize, attempted: usize },

    /// The blocking worker running the operation did not complete
    #[error("Storage worker failed: {0}")]
    Worker(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for resolve operations.
pub type Result<T> = std::result::Result<T, LoadError>;
