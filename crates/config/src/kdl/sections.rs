//! Per-block KDL parsing.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::trace;

use crate::auth::{AuthConfig, ConfigSourceKind, GithubConfig};
use crate::server::{LogFormat, LoggingConfig, ServerConfig};
use crate::storage::StorageConfig;

use super::helpers::{get_bool_entry, get_string_args, get_string_entry, get_u64_entry};

fn secs(node: &kdl::KdlNode, name: &str) -> Result<Option<Duration>> {
    Ok(get_u64_entry(node, name)?.map(Duration::from_secs))
}

/// Parse the `server { }` block
pub fn parse_server_config(node: &kdl::KdlNode) -> Result<ServerConfig> {
    trace!("Parsing server configuration block");
    let defaults = ServerConfig::default();

    let config = ServerConfig {
        listen: get_string_entry(node, "listen").unwrap_or(defaults.listen),
        trusted_proxies: get_string_args(node, "trusted-proxies"),
        realip_header: get_string_entry(node, "realip-header").unwrap_or(defaults.realip_header),
        request_timeout: secs(node, "request-timeout-secs")?.unwrap_or(defaults.request_timeout),
        shutdown_timeout: secs(node, "shutdown-timeout-secs")?
            .unwrap_or(defaults.shutdown_timeout),
    };

    trace!(
        listen = %config.listen,
        trusted_proxies = config.trusted_proxies.len(),
        "Parsed server configuration"
    );
    Ok(config)
}

/// Parse the `logging { }` block
pub fn parse_logging_config(node: &kdl::KdlNode) -> Result<LoggingConfig> {
    let defaults = LoggingConfig::default();
    Ok(LoggingConfig {
        level: get_string_entry(node, "level").unwrap_or(defaults.level),
        format: get_string_entry(node, "format")
            .map(|s| LogFormat::from_str_loose(&s))
            .unwrap_or(defaults.format),
    })
}

/// Parse the `auth { }` block
pub fn parse_auth_config(node: &kdl::KdlNode) -> Result<AuthConfig> {
    trace!("Parsing auth configuration block");
    let defaults = AuthConfig::default();

    let source = match get_string_entry(node, "source") {
        None => defaults.source,
        Some(s) => ConfigSourceKind::parse(&s).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid auth source '{}'. Valid sources: github, file",
                s
            )
        })?,
    };

    let config = AuthConfig {
        sign_token: get_string_entry(node, "sign-token").unwrap_or(defaults.sign_token),
        signers_keyring: get_string_entry(node, "signers-keyring")
            .map(PathBuf::from)
            .unwrap_or(defaults.signers_keyring),
        pull_interval: secs(node, "pull-interval-secs")?.unwrap_or(defaults.pull_interval),
        pull_error_delay: secs(node, "pull-error-delay-secs")?
            .unwrap_or(defaults.pull_error_delay),
        source,
        file: get_string_entry(node, "file").map(PathBuf::from),
    };

    trace!(
        source = ?config.source,
        pull_interval_secs = config.pull_interval.as_secs(),
        "Parsed auth configuration"
    );
    Ok(config)
}

/// Parse the `github { }` block
pub fn parse_github_config(node: &kdl::KdlNode) -> Result<GithubConfig> {
    trace!("Parsing github configuration block");
    let defaults = GithubConfig::default();

    let max_conns = match get_u64_entry(node, "max-conns")? {
        Some(v) => usize::try_from(v)
            .map_err(|_| anyhow::anyhow!("'max-conns' is out of range: {}", v))?,
        None => defaults.max_conns,
    };

    let config = GithubConfig {
        api_base_url: get_string_entry(node, "api-base-url").unwrap_or(defaults.api_base_url),
        repo: get_string_entry(node, "repo").unwrap_or(defaults.repo),
        path: get_string_entry(node, "path").unwrap_or(defaults.path),
        branch: get_string_entry(node, "branch").unwrap_or(defaults.branch),
        api_version: get_string_entry(node, "api-version").unwrap_or(defaults.api_version),
        token: get_string_entry(node, "token").filter(|t| !t.is_empty()),
        ssl_insecure: get_bool_entry(node, "ssl-insecure").unwrap_or(defaults.ssl_insecure),
        max_conns,
        read_timeout: secs(node, "read-timeout-secs")?.unwrap_or(defaults.read_timeout),
        connect_timeout: secs(node, "connect-timeout-secs")?.unwrap_or(defaults.connect_timeout),
        idle_timeout: secs(node, "idle-timeout-secs")?.unwrap_or(defaults.idle_timeout),
        support_url: get_string_entry(node, "support-url").unwrap_or(defaults.support_url),
    };

    trace!(
        repo = %config.repo,
        path = %config.path,
        branch = %config.branch,
        "Parsed github configuration"
    );
    Ok(config)
}

/// Parse the `storage { }` block
pub fn parse_storage_config(node: &kdl::KdlNode) -> Result<StorageConfig> {
    trace!("Parsing storage configuration block");
    let defaults = StorageConfig::default();

    let config = StorageConfig {
        cert_path: get_string_entry(node, "cert-path")
            .map(PathBuf::from)
            .unwrap_or(defaults.cert_path),
        pem_size_limit_kb: get_u64_entry(node, "pem-size-limit-kb")?
            .unwrap_or(defaults.pem_size_limit_kb),
        pem_pubname: get_string_entry(node, "pem-pubname").unwrap_or(defaults.pem_pubname),
        pem_keyname: get_string_entry(node, "pem-keyname").unwrap_or(defaults.pem_keyname),
        pem_chainname: get_string_entry(node, "pem-chainname").filter(|s| !s.is_empty()),
        rescan_interval: secs(node, "rescan-interval-secs")?.filter(|d| !d.is_zero()),
        rescan_error_delay: secs(node, "rescan-error-delay-secs")?
            .unwrap_or(defaults.rescan_error_delay),
    };

    trace!(
        cert_path = %config.cert_path.display(),
        size_limit_kb = config.pem_size_limit_kb,
        "Parsed storage configuration"
    );
    Ok(config)
}
