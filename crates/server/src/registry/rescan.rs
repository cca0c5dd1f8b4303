//! Periodic re-scan of the certificate tree.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::storage::CertificateRegistry;
use crate::refresh::{Refresh, RefreshError};

/// Rebuilds the registry from the live tree on each refresh
pub struct DirectoryRescan {
    registry: Arc<CertificateRegistry>,
    root: PathBuf,
}

impl DirectoryRescan {
    pub fn new(registry: Arc<CertificateRegistry>, root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            root: root.into(),
        }
    }
}

#[async_trait]
impl Refresh for DirectoryRescan {
    async fn refresh(&self) -> Result<(), RefreshError> {
        let registry = Arc::clone(&self.registry);
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || registry.rescan(&root))
            .await??;
        Ok(())
    }
}
