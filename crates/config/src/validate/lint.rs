//! Configuration linting
//!
//! Flags settings that work but are risky in production.

use std::net::SocketAddr;
use std::time::Duration;

use super::{ValidationResult, ValidationWarning};
use crate::auth::ConfigSourceKind;
use crate::Config;

/// Lint configuration for risky settings
pub fn lint_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.auth.sign_token.len() < 16 && !config.auth.sign_token.is_empty() {
        result.add_warning(ValidationWarning::new(
            "sign-token is shorter than 16 bytes (weak request signatures)",
        ));
    }

    if config.auth.pull_interval < Duration::from_secs(60)
        && config.auth.source == ConfigSourceKind::Github
        && config.github.token.is_none()
    {
        result.add_warning(ValidationWarning::new(format!(
            "pull-interval-secs is {}s without a github token (unauthenticated rate limit is 60 requests/hour)",
            config.auth.pull_interval.as_secs()
        )));
    }

    if config.github.ssl_insecure {
        result.add_warning(ValidationWarning::new(
            "github ssl-insecure is enabled (TLS certificates of the API are not verified)",
        ));
    }

    if let Ok(addr) = config.server.listen.parse::<SocketAddr>() {
        if !addr.ip().is_loopback() && config.server.trusted_proxies.is_empty() {
            result.add_warning(ValidationWarning::new(format!(
                "Listening on {} without trusted proxies (API is served over plain HTTP)",
                addr
            )));
        }
    }

    if config.auth.source == ConfigSourceKind::File && config.github.token.is_some() {
        result.add_warning(ValidationWarning::new(
            "github token is set but auth source is 'file' (token is unused)",
        ));
    }

    result
}
