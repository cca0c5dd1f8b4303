//! Configuration for pemvault.
//!
//! Configuration is read from a KDL file, overridden from the command line,
//! then validated. Every section has production defaults, so an empty file
//! plus a sign token is a complete configuration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub mod auth;
pub mod kdl;
pub mod server;
pub mod storage;
pub mod validate;

pub use auth::{AuthConfig, ConfigSourceKind, GithubConfig};
pub use server::{LogFormat, LoggingConfig, ServerConfig};
pub use storage::StorageConfig;
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub github: GithubConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a KDL file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration file");

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config = Self::from_kdl_str(&content, &path.display().to_string())?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse configuration from KDL text
    pub fn from_kdl_str(content: &str, source_name: &str) -> Result<Self> {
        crate::kdl::parse_config(content, source_name)
    }

    /// Run all validation checks
    pub fn validate(&self) -> ValidationResult {
        let result = validate::validate_config(self);
        for warning in &result.warnings {
            warn!(warning = %warning, "Configuration warning");
        }
        result
    }

    /// Minimal valid-looking configuration for tests
    pub fn default_for_testing() -> Self {
        let mut config = Self::default();
        config.auth.sign_token = "test-sign-token-0123456789".to_string();
        config.github.repo = "acme/authz".to_string();
        config
    }
}
