//! API error responses.
//!
//! Bodies carry only the status reason. Details go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::auth::AuthError;
use crate::registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),

    #[error("request signature mismatch")]
    BadSignature,

    #[error("requester is not authorized for this resource")]
    Forbidden,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("authorization list is not loaded yet")]
    NotReady,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::BadSignature => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotReady => ApiError::NotReady,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = status.as_u16(), error = %self, "Request declined");
        let reason = status.canonical_reason().unwrap_or("error");
        (status, reason).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PemKind;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingArgument("sign").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::BadSignature.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::NotReady).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError::from(AuthError::Parse("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(RegistryError::KindNotFound {
                domain: "a".into(),
                kind: PemKind::Chain
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(RegistryError::Write(std::io::ErrorKind::BrokenPipe.into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
