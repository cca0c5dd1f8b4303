//! Filesystem path validation.

use super::{ErrorCategory, ValidationError, ValidationResult};
use crate::auth::ConfigSourceKind;
use crate::Config;

/// Validate that configured files and directories exist
pub fn validate_paths(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    let cert_path = &config.storage.cert_path;
    if !cert_path.is_dir() {
        result.add_error(ValidationError::new(
            ErrorCategory::Storage,
            format!("Certificate directory not found: {:?}", cert_path),
        ));
    }

    let keyring = &config.auth.signers_keyring;
    if !keyring.is_file() {
        result.add_error(ValidationError::new(
            ErrorCategory::Auth,
            format!("Signers keyring not found: {:?}", keyring),
        ));
    }

    if config.auth.source == ConfigSourceKind::File {
        match &config.auth.file {
            None => result.add_error(ValidationError::new(
                ErrorCategory::Source,
                "auth source 'file' requires a 'file' path",
            )),
            Some(path) if !path.is_file() => result.add_error(ValidationError::new(
                ErrorCategory::Source,
                format!("Authorization file not found: {:?}", path),
            )),
            Some(_) => {}
        }
    }

    result
}
