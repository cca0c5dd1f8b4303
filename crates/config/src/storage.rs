//! Certificate directory settings.

use std::path::PathBuf;
use std::time::Duration;

/// Certificate tree layout and limits
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Root of the live tree, one subdirectory per domain
    pub cert_path: PathBuf,
    /// Per-file size limit in kilobytes
    pub pem_size_limit_kb: u64,
    /// Base name of the public chain link
    pub pem_pubname: String,
    /// Base name of the private key link
    pub pem_keyname: String,
    /// Base name of the intermediate chain link, if served
    pub pem_chainname: Option<String>,
    /// Periodic rescan of the tree; disabled when `None`
    pub rescan_interval: Option<Duration>,
    /// Retry delay after a failed rescan
    pub rescan_error_delay: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("/etc/letsencrypt/live/"),
            pem_size_limit_kb: 10,
            pem_pubname: "fullchain.pem".to_string(),
            pem_keyname: "privkey.pem".to_string(),
            pem_chainname: None,
            rescan_interval: None,
            rescan_error_delay: Duration::from_secs(30),
        }
    }
}

impl StorageConfig {
    /// Per-file size limit in bytes
    pub fn pem_size_limit_bytes(&self) -> u64 {
        self.pem_size_limit_kb.saturating_mul(1024)
    }
}
