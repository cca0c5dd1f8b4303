//! Route handlers.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::ApiError;
use super::middleware::Requester;
use super::ApiState;
use crate::registry::PemKind;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Body of the listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateList {
    pub certificates: Vec<String>,
}

pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    if state.authorizer.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

pub async fn list_certificates(
    State(state): State<ApiState>,
    Extension(requester): Extension<Requester>,
) -> Result<Json<CertificateList>, ApiError> {
    let certificates = state.authorizer.available_domains(&requester.hostname)?;
    debug!(
        hostname = %requester.hostname,
        count = certificates.len(),
        "Listing available certificates"
    );
    Ok(Json(CertificateList { certificates }))
}

pub async fn public_certificate(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    serve_material(state, name, requester, PemKind::Certificate).await
}

pub async fn private_key(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    serve_material(state, name, requester, PemKind::PrivateKey).await
}

async fn serve_material(
    state: ApiState,
    name: String,
    requester: Requester,
    kind: PemKind,
) -> Result<impl IntoResponse, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::MissingArgument("name"));
    }
    if !state
        .authorizer
        .authorize_hostname(&name, &requester.hostname)?
    {
        info!(
            domain = %name,
            hostname = %requester.hostname,
            client_ip = %requester.client_ip,
            kind = %kind,
            "Declined unauthorized request"
        );
        return Err(ApiError::Forbidden);
    }

    // File reads are positional and blocking
    let certificates = state.certificates.clone();
    let domain = name.clone();
    let body = tokio::task::spawn_blocking(move || {
        let mut body = Vec::new();
        certificates
            .write_to(&domain, kind, &mut body)
            .map(|_| body)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(
        domain = %name,
        hostname = %requester.hostname,
        client_ip = %requester.client_ip,
        kind = %kind,
        bytes = body.len(),
        "Served PEM material"
    );
    Ok(([(header::CONTENT_TYPE, TEXT_PLAIN)], body))
}
