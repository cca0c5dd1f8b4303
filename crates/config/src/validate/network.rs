//! Address and URL validation.

use std::net::{IpAddr, SocketAddr};

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::auth::ConfigSourceKind;
use crate::Config;

/// Validate listen address, trusted proxies and the GitHub endpoint
pub fn validate_network(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.server.listen.parse::<SocketAddr>().is_err() {
        result.add_error(ValidationError::new(
            ErrorCategory::Server,
            format!(
                "Invalid listen address '{}', expected ip:port",
                config.server.listen
            ),
        ));
    }

    for proxy in &config.server.trusted_proxies {
        if proxy.parse::<IpAddr>().is_err() {
            result.add_error(ValidationError::new(
                ErrorCategory::Server,
                format!("Trusted proxy '{}' is not an IP address", proxy),
            ));
        }
    }

    if config.auth.source == ConfigSourceKind::Github {
        let github = &config.github;
        match url::Url::parse(&github.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result.add_error(ValidationError::new(
                ErrorCategory::Network,
                format!("Unsupported api-base-url scheme '{}'", url.scheme()),
            )),
            Err(e) => result.add_error(ValidationError::new(
                ErrorCategory::Network,
                format!("Invalid api-base-url '{}': {}", github.api_base_url, e),
            )),
        }

        let mut parts = github.repo.split('/');
        let valid_repo = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !valid_repo {
            result.add_error(ValidationError::new(
                ErrorCategory::Source,
                format!("github repo '{}' must be in owner/name form", github.repo),
            ));
        }
        if github.path.is_empty() || github.branch.is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Source,
                "github path and branch must not be empty",
            ));
        }
        if github.max_conns == 0 {
            result.add_error(ValidationError::new(
                ErrorCategory::Network,
                "github max-conns must be greater than zero",
            ));
        }
    }

    result
}
