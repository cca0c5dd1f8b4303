//! Request authentication and the signed authorization list.
//!
//! - [`hmac`]: per-request HMAC signatures
//! - [`signature`]: OpenPGP clear-sign verification of the list document
//! - [`source`], [`fetcher`]: where the document comes from
//! - [`list`], [`store`], [`service`]: parsing, snapshot store and load pipeline

pub mod error;
pub mod fetcher;
pub mod hmac;
pub mod list;
pub mod service;
pub mod signature;
pub mod source;
pub mod store;

pub use error::{AuthError, FetchError, SignatureError};
pub use fetcher::{GithubFetcher, RateLimitState};
pub use hmac::HmacAuthenticator;
pub use list::{AuthorizationEntry, AuthorizationList, HostMatcher, ReloadHook};
pub use service::AuthService;
pub use signature::{PayloadVerifier, PgpVerifier, VerifiedPayload};
pub use source::{ConfigSource, FetchedFile, FileMeta, FileSource};
pub use store::{AuthorizationStore, Authorizer};
