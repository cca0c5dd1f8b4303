//! Inbound HTTP API.
//!
//! ```text
//! GET /healthz
//! GET /v1/certificates?hostname=&sign=
//! GET /v1/certificates/:name/public?hostname=&sign=
//! GET /v1/certificates/:name/private?hostname=&sign=
//! ```
//!
//! Certificate routes sit behind [`middleware::authenticate`]. Every
//! response carries an `x-request-id`.

pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{Authorizer, HmacAuthenticator};
use crate::registry::CertificateSource;

pub use error::ApiError;
pub use handlers::CertificateList;
pub use middleware::{ClientIpResolver, Requester, SignedArgs};

/// Everything the handlers need, injected at startup
#[derive(Clone)]
pub struct ApiState {
    pub authenticator: Arc<HmacAuthenticator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub certificates: Arc<dyn CertificateSource>,
    pub client_ip: Arc<ClientIpResolver>,
}

/// Build the API router
///
/// The caller serves it with `into_make_service_with_connect_info::<SocketAddr>()`
/// so the authentication middleware can see the peer address.
pub fn router(state: ApiState, request_timeout: Duration) -> Router {
    let protected = Router::new()
        .route("/v1/certificates", get(handlers::list_certificates))
        .route(
            "/v1/certificates/:name/public",
            get(handlers::public_certificate),
        )
        .route("/v1/certificates/:name/private", get(handlers::private_key))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::io;
    use std::net::SocketAddr;

    use axum::body::{to_bytes, Body};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use tower::ServiceExt;

    use crate::auth::{AuthorizationList, AuthorizationStore};
    use crate::registry::{PemKind, RegistryError};

    const SECRET: &str = "http-test-secret-0123456789";
    const PEER: &str = "192.0.2.10:51000";

    const LIST: &str = r#"
authorization_list:
  - name: www.example.com
    allow: web1.example.com,web2.example.com
  - name: mail.example.com
    allow: /^mx[0-9]+\.example\.com$/
  - name: api.example.com
    allow: web1.example.com
"#;

    #[derive(Default)]
    struct StaticCertificates {
        files: HashMap<(String, PemKind), Vec<u8>>,
    }

    impl StaticCertificates {
        fn with(mut self, domain: &str, kind: PemKind, content: &[u8]) -> Self {
            self.files.insert((domain.to_string(), kind), content.to_vec());
            self
        }
    }

    impl CertificateSource for StaticCertificates {
        fn write_to(
            &self,
            domain: &str,
            kind: PemKind,
            writer: &mut dyn io::Write,
        ) -> Result<usize, RegistryError> {
            let raw = self
                .files
                .get(&(domain.to_string(), kind))
                .ok_or_else(|| RegistryError::DomainNotFound(domain.to_string()))?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
            writer
                .write_all(encoded.as_bytes())
                .map_err(RegistryError::Write)?;
            Ok(encoded.len())
        }
    }

    fn state(loaded: bool) -> ApiState {
        let store = AuthorizationStore::new();
        if loaded {
            store.swap(AuthorizationList::from_yaml(LIST.as_bytes()).unwrap());
        }
        let certificates = StaticCertificates::default()
            .with("www.example.com", PemKind::Certificate, b"PUBLIC CHAIN")
            .with("www.example.com", PemKind::PrivateKey, b"PRIVATE KEY")
            .with("mail.example.com", PemKind::Certificate, b"MAIL CHAIN");
        ApiState {
            authenticator: Arc::new(HmacAuthenticator::new(SECRET).unwrap()),
            authorizer: Arc::new(store),
            certificates: Arc::new(certificates),
            client_ip: Arc::new(ClientIpResolver::peer_only()),
        }
    }

    fn app(loaded: bool) -> Router {
        let peer: SocketAddr = PEER.parse().unwrap();
        router(state(loaded), Duration::from_secs(5)).layer(MockConnectInfo(peer))
    }

    fn signed_uri(path: &str, hostname: &str) -> String {
        let auth = HmacAuthenticator::new(SECRET).unwrap();
        let message = HmacAuthenticator::request_message("192.0.2.10", path, hostname);
        format!("{path}?hostname={hostname}&sign={}", auth.sign(&message))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>, bool) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let has_request_id = response.headers().contains_key("x-request-id");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec(), has_request_id)
    }

    #[tokio::test]
    async fn test_healthz_reflects_readiness() {
        let (status, body, has_id) = get(app(true), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
        assert!(has_id);

        let (status, _, _) = get(app(false), "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_missing_arguments_are_bad_requests() {
        let (status, body, _) = get(app(true), "/v1/certificates").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"Bad Request");

        let (status, _, _) =
            get(app(true), "/v1/certificates?hostname=web1.example.com").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get(app(true), "/v1/certificates?sign=abcd").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let uri = "/v1/certificates?hostname=web1.example.com&sign=deadbeef";
        let (status, body, has_id) = get(app(true), uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, b"Unauthorized");
        assert!(has_id);

        // Signature bound to a different path
        let other = signed_uri("/v1/certificates", "web1.example.com");
        let query = other.split_once('?').unwrap().1;
        let uri = format!("/v1/certificates/www.example.com/public?{query}");
        let (status, _, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_returns_authorized_names_in_order() {
        let uri = signed_uri("/v1/certificates", "web1.example.com");
        let (status, body, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let list: CertificateList = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.certificates, vec!["www.example.com", "api.example.com"]);

        let uri = signed_uri("/v1/certificates", "mx7.example.com");
        let (_, body, _) = get(app(true), &uri).await;
        let list: CertificateList = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.certificates, vec!["mail.example.com"]);
    }

    #[tokio::test]
    async fn test_list_not_ready() {
        let uri = signed_uri("/v1/certificates", "web1.example.com");
        let (status, _, _) = get(app(false), &uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_public_and_private_material() {
        let b64 = base64::engine::general_purpose::STANDARD;

        let uri = signed_uri("/v1/certificates/www.example.com/public", "web2.example.com");
        let (status, body, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(b64.decode(body).unwrap(), b"PUBLIC CHAIN");

        let uri = signed_uri("/v1/certificates/www.example.com/private", "web2.example.com");
        let (status, body, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(b64.decode(body).unwrap(), b"PRIVATE KEY");
    }

    #[tokio::test]
    async fn test_unauthorized_requester_is_forbidden() {
        let uri = signed_uri("/v1/certificates/www.example.com/private", "mx1.example.com");
        let (status, body, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, b"Forbidden");

        // Unknown resource names are never authorized
        let uri = signed_uri("/v1/certificates/nope.example.com/public", "web1.example.com");
        let (status, _, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_authorized_but_missing_material_is_not_found() {
        let uri = signed_uri("/v1/certificates/mail.example.com/private", "mx2.example.com");
        let (status, _, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = signed_uri("/v1/certificates/api.example.com/public", "web1.example.com");
        let (status, _, _) = get(app(true), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
