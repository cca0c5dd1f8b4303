//! Request authentication.
//!
//! Every certificate route requires `hostname` and `sign` query arguments.
//! `sign` is the HMAC of `"{client_ip}:{path}:{hostname}"`.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{HeaderMap, HeaderName};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use tracing::{debug, warn};

use pemvault_config::ServerConfig;

use super::error::ApiError;
use super::ApiState;
use crate::auth::HmacAuthenticator;

pub const ARG_HOSTNAME: &str = "hostname";
pub const ARG_SIGN: &str = "sign";

#[derive(Debug, Default, Deserialize)]
pub struct SignedArgs {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub sign: Option<String>,
}

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub hostname: String,
    pub client_ip: String,
}

/// Decides which address a request came from
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    trusted_proxies: Vec<IpAddr>,
    header: Option<HeaderName>,
}

impl ClientIpResolver {
    pub fn new(trusted_proxies: Vec<IpAddr>, header: Option<HeaderName>) -> Self {
        Self {
            trusted_proxies,
            header,
        }
    }

    /// Use the TCP peer only
    pub fn peer_only() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let trusted = config
            .trusted_proxies
            .iter()
            .filter_map(|p| match p.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    warn!(proxy = %p, "Ignoring trusted proxy that is not an IP address");
                    None
                }
            })
            .collect();
        let header = HeaderName::from_bytes(config.realip_header.as_bytes())
            .map_err(|_| warn!(header = %config.realip_header, "Invalid real IP header name"))
            .ok();
        Self::new(trusted, header)
    }

    /// Peer address, or the real-IP header when the peer is a trusted proxy
    pub fn resolve(&self, peer: SocketAddr, headers: &HeaderMap) -> String {
        let peer_ip = peer.ip();
        if self.trusted_proxies.contains(&peer_ip) {
            let forwarded = self
                .header
                .as_ref()
                .and_then(|h| headers.get(h))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }
        peer_ip.to_string()
    }
}

/// Verify the request signature and attach the [`Requester`]
pub async fn authenticate(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(args): Query<SignedArgs>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let hostname = args
        .hostname
        .filter(|h| !h.trim().is_empty())
        .ok_or(ApiError::MissingArgument(ARG_HOSTNAME))?;
    let sign = args
        .sign
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingArgument(ARG_SIGN))?;

    let client_ip = state.client_ip.resolve(peer, request.headers());
    let path = request.uri().path();
    let message = HmacAuthenticator::request_message(&client_ip, path, &hostname);

    let (_, ok) = state.authenticator.verify(&message, sign.as_bytes());
    if !ok {
        debug!(
            client_ip = %client_ip,
            path = %path,
            hostname = %hostname,
            "Declining request with unverified signature"
        );
        return Err(ApiError::BadSignature);
    }

    request.extensions_mut().insert(Requester {
        hostname,
        client_ip,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 40000)
    }

    #[test]
    fn test_resolve_uses_header_only_for_trusted_proxy() {
        let resolver = ClientIpResolver::new(
            vec!["10.0.0.1".parse().unwrap()],
            Some(HeaderName::from_static("x-real-ip")),
        );
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

        assert_eq!(resolver.resolve(peer("10.0.0.1"), &headers), "203.0.113.7");
        assert_eq!(resolver.resolve(peer("10.0.0.2"), &headers), "10.0.0.2");
        assert_eq!(resolver.resolve(peer("10.0.0.1"), &HeaderMap::new()), "10.0.0.1");
    }

    #[test]
    fn test_from_config_skips_invalid_proxies() {
        let config = ServerConfig {
            trusted_proxies: vec!["192.0.2.1".into(), "not-an-ip".into()],
            ..Default::default()
        };
        let resolver = ClientIpResolver::from_config(&config);
        assert_eq!(resolver.trusted_proxies.len(), 1);

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));
        assert_eq!(resolver.resolve(peer("192.0.2.1"), &headers), "198.51.100.9");
    }
}
