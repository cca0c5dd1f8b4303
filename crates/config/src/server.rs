//! HTTP server and logging configuration.

use std::time::Duration;

/// Inbound API server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:8080`
    pub listen: String,
    /// Peers whose real-IP header is trusted
    pub trusted_proxies: Vec<String>,
    /// Header carrying the client address when the peer is a trusted proxy
    pub realip_header: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum time to wait for tasks during shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            trusted_proxies: Vec::new(),
            realip_header: default_realip_header(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

pub fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

pub fn default_realip_header() -> String {
    "X-Real-Ip".to_string()
}

pub fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to [`LogFormat::Pretty`]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` takes precedence)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
