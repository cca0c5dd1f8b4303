//! pemvault
//!
//! Serves certbot-managed TLS material over HTTP to hosts that prove
//! knowledge of a shared secret and appear in a signed authorization list.
//!
//! - **Authentication**: HMAC-SHA256 over client address, path and hostname
//! - **Authorization**: OpenPGP clear-signed YAML list, pulled from GitHub or a
//!   local file and swapped atomically on refresh
//! - **Registry**: open descriptors for every PEM symlink in the live tree,
//!   served base64-encoded through pooled buffers
//!
//! # Example
//!
//! ```ignore
//! use pemvault::VaultClient;
//!
//! let client = VaultClient::new("http://vault:8080/", token, "web1.internal", "10.0.0.5")?;
//! let chain = client.public("www.example.com").await?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod app;
pub mod auth;
pub mod client;
pub mod http;
pub mod refresh;
pub mod registry;
pub mod signals;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Authentication and authorization
pub use auth::{
    AuthError, AuthService, AuthorizationList, AuthorizationStore, Authorizer, ConfigSource,
    FetchError, FileSource, GithubFetcher, HmacAuthenticator, PayloadVerifier, PgpVerifier,
};

// Certificate registry
pub use registry::{CertificateRegistry, CertificateSource, PemKind, RegistryError};

// Refresh control
pub use refresh::{Refresh, RefreshHandle, RefreshLoop, RefreshState};

// HTTP surface
pub use client::{ClientError, VaultClient};
pub use crate::http::{router, ApiError, ApiState};

// Process assembly
pub use app::{run, start, start_with_verifier, RunningApp};
