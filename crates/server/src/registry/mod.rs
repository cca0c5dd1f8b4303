//! Certificate file registry.
//!
//! Holds open descriptors for every symlinked PEM file in the live tree and
//! serves them base64-encoded.

pub mod error;
pub mod pem;
pub mod rescan;
pub mod storage;

pub use error::{PemFileError, RegistryError};
pub use pem::{PemFile, PemKind, PemNames};
pub use rescan::DirectoryRescan;
pub use storage::{CertificateRegistry, CertificateSource, ScanReport};
