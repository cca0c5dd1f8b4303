//! Configuration validation
//!
//! Checks are grouped by concern. Errors make the configuration unusable;
//! warnings are reported and startup continues.

mod lint;
mod network;
mod paths;

use std::fmt;

use crate::Config;

pub use lint::lint_config;
pub use network::validate_network;
pub use paths::validate_paths;

/// Area of the configuration an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Server,
    Auth,
    Source,
    Storage,
    Network,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Server => "server",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Source => "source",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Network => "network",
        };
        f.write_str(name)
    }
}

/// A validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{category}] {message}")]
pub struct ValidationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// A non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl ValidationWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collected errors and warnings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fail with the first error, keeping warnings on success
    pub fn into_result(self) -> Result<Self, ValidationError> {
        match self.errors.first() {
            Some(e) => Err(e.clone()),
            None => Ok(self),
        }
    }
}

/// Run every check against `config`
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.auth.sign_token.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Auth,
            "sign-token is required (set it in the auth block or PEMVAULT_SIGN_TOKEN)",
        ));
    }
    if config.auth.pull_interval.is_zero() {
        result.add_error(ValidationError::new(
            ErrorCategory::Auth,
            "pull-interval-secs must be greater than zero",
        ));
    }
    if config.auth.pull_error_delay.is_zero() {
        result.add_error(ValidationError::new(
            ErrorCategory::Auth,
            "pull-error-delay-secs must be greater than zero",
        ));
    }

    let storage = &config.storage;
    if storage.pem_size_limit_kb == 0 {
        result.add_error(ValidationError::new(
            ErrorCategory::Storage,
            "pem-size-limit-kb must be greater than zero",
        ));
    }
    let mut names = vec![&storage.pem_pubname, &storage.pem_keyname];
    names.extend(storage.pem_chainname.as_ref());
    for (i, name) in names.iter().enumerate() {
        if name.is_empty() || name.contains('/') {
            result.add_error(ValidationError::new(
                ErrorCategory::Storage,
                format!("PEM file name '{}' must be a plain, non-empty file name", name),
            ));
        }
        if names[..i].contains(name) {
            result.add_error(ValidationError::new(
                ErrorCategory::Storage,
                format!("PEM file name '{}' is used for more than one kind", name),
            ));
        }
    }

    result.merge(validate_network(config));
    result.merge(validate_paths(config));
    result.merge(lint_config(config));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sign_token_is_error() {
        let config = Config::default();
        let result = validate_config(&config);
        assert!(!result.is_ok());
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Auth && e.message.contains("sign-token")));
    }

    #[test]
    fn test_duplicate_pem_names() {
        let mut config = Config::default_for_testing();
        config.storage.pem_keyname = config.storage.pem_pubname.clone();

        let result = validate_config(&config);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("more than one kind")));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::new(ErrorCategory::Storage, "bad");
        assert_eq!(err.to_string(), "[storage] bad");
    }

    #[test]
    fn test_into_result() {
        let mut result = ValidationResult::new();
        result.add_warning(ValidationWarning::new("careful"));
        assert_eq!(result.clone().into_result().unwrap().warnings.len(), 1);

        result.add_error(ValidationError::new(ErrorCategory::Auth, "first"));
        result.add_error(ValidationError::new(ErrorCategory::Storage, "second"));
        assert_eq!(result.into_result().unwrap_err().message, "first");
    }
}
