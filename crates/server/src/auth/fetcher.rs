//! GitHub contents API client for the signed authorization document.
//!
//! Every response updates the locally tracked rate-limit quota before it is
//! validated, so a failed fetch still moves the gate forward.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, trace, warn};
use url::Url;

use pemvault_config::GithubConfig;

use super::error::FetchError;
use super::source::{ConfigSource, FetchedFile, FileMeta};

const ACCEPT: &str = "application/vnd.github+json; charset=utf-8";
const API_VERSION_HEADER: &str = "x-github-api-version";
const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Last quota reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// Reset time if the quota is exhausted at `now`
    pub fn blocked_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match (self.remaining, self.reset) {
            (Some(0), Some(reset)) if now < reset => Some(reset),
            _ => None,
        }
    }
}

/// JSON envelope of `GET /repos/{repo}/contents/{path}`
#[derive(Debug, Deserialize)]
struct ContentsEnvelope {
    #[serde(default)]
    name: String,
    #[serde(default)]
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<serde_json::Value>,
}

impl ContentsEnvelope {
    /// The `status` field, if it signals an error
    fn error_status(&self) -> Option<String> {
        match &self.status {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Number(n)) if n.as_i64() == Some(0) => None,
            Some(serde_json::Value::String(s)) if s.is_empty() || s == "0" => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Fetches the signed document from a GitHub repository
pub struct GithubFetcher {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    timeout: Duration,
    rate_limit: Mutex<RateLimitState>,
}

impl GithubFetcher {
    /// Build a client from configuration
    pub fn new(config: &GithubConfig) -> Result<Self, FetchError> {
        let url = contents_url(config)?;

        let user_agent = format!(
            "Mozilla/5.0 (compatible; pemvault/{}; +{})",
            env!("CARGO_PKG_VERSION"),
            config.support_url
        );

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .danger_accept_invalid_certs(config.ssl_insecure)
            .pool_max_idle_per_host(config.max_conns)
            .pool_idle_timeout(config.idle_timeout)
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| FetchError::Request(format!("failed to build HTTP client: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(API_VERSION_HEADER, header_value(&config.api_version)?);
        if let Some(token) = &config.token {
            let mut value = header_value(&format!("Bearer {}", token))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        debug!(
            url = %url,
            max_conns = config.max_conns,
            read_timeout_ms = config.read_timeout.as_millis(),
            authenticated = config.token.is_some(),
            "Created GitHub fetcher"
        );

        Ok(Self {
            client,
            url,
            headers,
            timeout: config.read_timeout,
            rate_limit: Mutex::new(RateLimitState::default()),
        })
    }

    /// Currently tracked quota
    pub fn rate_limit(&self) -> RateLimitState {
        *self.rate_limit.lock()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn update_rate_limit(&self, headers: &HeaderMap) {
        let remaining = headers
            .get(RATELIMIT_REMAINING)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let reset = headers
            .get(RATELIMIT_RESET)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        match (remaining, reset) {
            (Some(remaining), Some(reset)) => {
                trace!(remaining, reset = %reset, "Updated GitHub rate limit");
                *self.rate_limit.lock() = RateLimitState {
                    remaining: Some(remaining),
                    reset: Some(reset),
                };
            }
            _ => warn!("GitHub response has missing or invalid rate limit headers"),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl ConfigSource for GithubFetcher {
    async fn fetch(&self) -> Result<FetchedFile, FetchError> {
        if let Some(reset) = self.rate_limit().blocked_until(Utc::now()) {
            warn!(reset = %reset, "Skipping GitHub request, rate limit exhausted");
            return Err(FetchError::RateLimited { reset });
        }

        trace!(url = %self.url, "Requesting authorization document");
        let response = self
            .client
            .get(self.url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        self.update_rate_limit(response.headers());

        let status = response.status().as_u16();
        if !(200..500).contains(&status) {
            return Err(FetchError::UnexpectedStatus(status));
        }
        if (400..500).contains(&status) {
            return Err(FetchError::ClientRequestError(status));
        }

        let body = response.bytes().await.map_err(|e| self.map_send_error(e))?;
        if body.is_empty() {
            return Err(FetchError::EmptyResponse);
        }

        let envelope: ContentsEnvelope =
            serde_json::from_slice(&body).map_err(|e| FetchError::Envelope(e.to_string()))?;

        validate_envelope(envelope)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

fn validate_envelope(envelope: ContentsEnvelope) -> Result<FetchedFile, FetchError> {
    let error_status = envelope.error_status();
    if !envelope.message.is_empty() || error_status.is_some() {
        trace!(status = ?error_status, message = %envelope.message, "GitHub returned an error object");
        return Err(FetchError::RemoteError {
            status: error_status.unwrap_or_default(),
            message: envelope.message,
        });
    }

    let compact: Vec<u8> = envelope
        .content
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let content = base64::engine::general_purpose::STANDARD
        .decode(&compact)
        .map_err(|e| FetchError::ContentEncoding(e.to_string()))?;

    if content.len() as u64 != envelope.size {
        trace!(decoded = content.len(), declared = envelope.size, "Content size mismatch");
        return Err(FetchError::SizeMismatch {
            declared: envelope.size,
            actual: content.len() as u64,
        });
    }

    if envelope.kind != "file" {
        return Err(FetchError::UnexpectedObjectType(envelope.kind));
    }

    info!(
        name = %envelope.name,
        sha = %envelope.sha,
        size = envelope.size,
        "Downloaded and validated authorization document"
    );

    Ok(FetchedFile {
        content,
        meta: FileMeta {
            name: envelope.name,
            sha: envelope.sha,
            size: envelope.size,
        },
    })
}

fn contents_url(config: &GithubConfig) -> Result<Url, FetchError> {
    let raw = format!(
        "{}/repos/{}/contents/{}",
        config.api_base_url.trim_end_matches('/'),
        config.repo.trim_matches('/'),
        config.path.trim_start_matches('/')
    );
    let mut url =
        Url::parse(&raw).map_err(|e| FetchError::Request(format!("invalid URL {}: {}", raw, e)))?;
    url.query_pairs_mut().append_pair("ref", &config.branch);
    Ok(url)
}

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value)
        .map_err(|e| FetchError::Request(format!("invalid header value: {}", e)))
}
