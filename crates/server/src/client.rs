//! Signed client for the certificate API.
//!
//! Each request is signed over `"{client_ip}:{path}:{hostname}"` where
//! `client_ip` is the address the server will see for this host.

use std::time::Duration;

use base64::Engine;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::auth::HmacAuthenticator;
use crate::http::CertificateList;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid signing secret")]
    Secret,

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(StatusCode),

    #[error("response is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Client for one requesting host
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    base: Url,
    hostname: String,
    client_ip: String,
    signer: HmacAuthenticator,
}

impl VaultClient {
    pub fn new(
        base_url: &str,
        sign_token: &str,
        hostname: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("pemvault-client/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base: Url::parse(base_url)?,
            hostname: hostname.into(),
            client_ip: client_ip.into(),
            signer: HmacAuthenticator::new(sign_token).map_err(|_| ClientError::Secret)?,
        })
    }

    /// Names this host may fetch
    pub async fn list(&self) -> Result<Vec<String>, ClientError> {
        let response = self.get("/v1/certificates").await?;
        let list: CertificateList = response.json().await?;
        Ok(list.certificates)
    }

    /// Decoded public chain of `name`
    pub async fn public(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        self.material(&format!("/v1/certificates/{name}/public")).await
    }

    /// Decoded private key of `name`
    pub async fn private(&self, name: &str) -> Result<Vec<u8>, ClientError> {
        self.material(&format!("/v1/certificates/{name}/private")).await
    }

    /// Signed URL for `path`
    pub fn signed_url(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = self.base.join(path)?;
        let message = HmacAuthenticator::request_message(&self.client_ip, url.path(), &self.hostname);
        let sign = self.signer.sign(&message);
        url.query_pairs_mut()
            .clear()
            .append_pair("hostname", &self.hostname)
            .append_pair("sign", &sign);
        Ok(url)
    }

    async fn material(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let body = self.get(path).await?.bytes().await?;
        Ok(base64::engine::general_purpose::STANDARD.decode(body.trim_ascii())?)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.signed_url(path)?;
        debug!(path = %url.path(), hostname = %self.hostname, "Sending signed request");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status));
        }
        Ok(response)
    }
}
