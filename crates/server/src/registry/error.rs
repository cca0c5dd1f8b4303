//! Certificate registry errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::pem::PemKind;

/// Why a single file was not registered
#[derive(Error, Debug)]
pub enum PemFileError {
    #[error("{0:?} is not a symlink")]
    NotSymlink(PathBuf),

    #[error("Failed to resolve {path:?}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unexpected file name '{0}'")]
    UnknownName(String),

    #[error("{path:?} is {size} bytes, limit is {limit} bytes")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{0:?} has no parent domain directory")]
    Layout(PathBuf),
}

/// Registry operation errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Certificate path {0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Domain '{0}' not found")]
    DomainNotFound(String),

    #[error("No {kind} file for domain '{domain}'")]
    KindNotFound { domain: String, kind: PemKind },

    #[error("Failed to read {path:?}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write response: {0}")]
    Write(#[source] io::Error),
}

impl RegistryError {
    /// Lookup miss rather than an I/O problem
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::DomainNotFound(_) | RegistryError::KindNotFound { .. }
        )
    }
}
