//! Error types for the authorization pipeline.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors from retrieving the signed authorization document
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Rate limit exhausted until {reset}")]
    RateLimited { reset: DateTime<Utc> },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status code {0}")]
    UnexpectedStatus(u16),

    #[error("Client request error, status code {0}")]
    ClientRequestError(u16),

    #[error("Empty response body")]
    EmptyResponse,

    #[error("Malformed response envelope: {0}")]
    Envelope(String),

    #[error("Remote error (status {status:?}): {message}")]
    RemoteError { status: String, message: String },

    #[error("Content is not valid base64: {0}")]
    ContentEncoding(String),

    #[error("Size mismatch: declared {declared} bytes, decoded {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("Unexpected object type '{0}', expected 'file'")]
    UnexpectedObjectType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether the response arrived but failed validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FetchError::UnexpectedStatus(_)
                | FetchError::ClientRequestError(_)
                | FetchError::EmptyResponse
                | FetchError::Envelope(_)
                | FetchError::RemoteError { .. }
                | FetchError::ContentEncoding(_)
                | FetchError::SizeMismatch { .. }
                | FetchError::UnexpectedObjectType(_)
        )
    }
}

/// Errors from checking the OpenPGP clear-signature
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Payload is not a clear-signed message: {0}")]
    Malformed(String),

    #[error("Signature verification failed: {0}")]
    Invalid(String),

    #[error("Trusted keyring unusable: {0}")]
    Keyring(String),
}

/// Errors surfaced by the authorization store and its loader
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Signature check failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("Invalid authorization document: {0}")]
    Parse(String),

    #[error("Authorization list not loaded yet")]
    NotReady,
}
