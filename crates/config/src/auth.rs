//! Authorization list source and GitHub client configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where the signed authorization list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigSourceKind {
    /// GitHub contents API
    #[default]
    Github,
    /// Local file (still signature-verified)
    File,
}

impl ConfigSourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Some(Self::Github),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Authentication and authorization settings
#[derive(Clone, PartialEq)]
pub struct AuthConfig {
    /// Shared HMAC secret used to verify request signatures
    pub sign_token: String,
    /// ASCII-armored keyring of trusted list signers
    pub signers_keyring: PathBuf,
    /// Refresh interval after a successful load
    pub pull_interval: Duration,
    /// Retry delay after a failed load
    pub pull_error_delay: Duration,
    pub source: ConfigSourceKind,
    /// Signed document path for [`ConfigSourceKind::File`]
    pub file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            sign_token: String::new(),
            signers_keyring: PathBuf::from("/etc/pemvault/signers.asc"),
            pull_interval: Duration::from_secs(300),
            pull_error_delay: Duration::from_secs(60),
            source: ConfigSourceKind::Github,
            file: None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("sign_token", &"<redacted>")
            .field("signers_keyring", &self.signers_keyring)
            .field("pull_interval", &self.pull_interval)
            .field("pull_error_delay", &self.pull_error_delay)
            .field("source", &self.source)
            .field("file", &self.file)
            .finish()
    }
}

/// GitHub contents API client settings
#[derive(Clone, PartialEq)]
pub struct GithubConfig {
    /// API base, e.g. `https://api.github.com`
    pub api_base_url: String,
    /// `owner/name`
    pub repo: String,
    /// Path of the signed document inside the repository
    pub path: String,
    pub branch: String,
    /// Value of the `X-GitHub-Api-Version` header
    pub api_version: String,
    /// Optional bearer token for private repositories
    pub token: Option<String>,
    /// Skip TLS certificate verification
    pub ssl_insecure: bool,
    /// Maximum idle pooled connections
    pub max_conns: usize,
    /// Response timeout
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// Idle pooled connections are closed after this duration
    pub idle_timeout: Duration,
    /// URL advertised in the User-Agent
    pub support_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            repo: String::new(),
            path: "config.yaml.asc".to_string(),
            branch: "master".to_string(),
            api_version: "2022-11-28".to_string(),
            token: None,
            ssl_insecure: false,
            max_conns: 32,
            read_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(300),
            support_url: "https://github.com/pemvault/pemvault".to_string(),
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_base_url", &self.api_base_url)
            .field("repo", &self.repo)
            .field("path", &self.path)
            .field("branch", &self.branch)
            .field("api_version", &self.api_version)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("ssl_insecure", &self.ssl_insecure)
            .field("max_conns", &self.max_conns)
            .field("read_timeout", &self.read_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
