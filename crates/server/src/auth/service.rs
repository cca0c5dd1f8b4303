//! Load pipeline for the authorization list.
//!
//! `source → signature check → YAML parse → validation`. A failed load never
//! touches the store; the previous snapshot stays authoritative.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info};

use super::error::AuthError;
use super::list::AuthorizationList;
use super::signature::PayloadVerifier;
use super::source::ConfigSource;
use super::store::AuthorizationStore;
use crate::refresh::{Refresh, RefreshError};

/// Fetches, verifies and installs authorization lists
pub struct AuthService {
    source: Arc<dyn ConfigSource>,
    verifier: Arc<dyn PayloadVerifier>,
    store: Arc<AuthorizationStore>,
}

impl AuthService {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        verifier: Arc<dyn PayloadVerifier>,
        store: Arc<AuthorizationStore>,
    ) -> Self {
        debug!(source = %source.describe(), "Creating authorization service");
        Self {
            source,
            verifier,
            store,
        }
    }

    /// Store shared with the HTTP layer
    pub fn store(&self) -> Arc<AuthorizationStore> {
        Arc::clone(&self.store)
    }

    /// Produce a validated list without installing it
    pub async fn load(&self) -> Result<AuthorizationList, AuthError> {
        let fetched = self.source.fetch().await?;
        debug!(
            name = %fetched.meta.name,
            size = fetched.meta.size,
            "Fetched signed authorization document"
        );

        let verified = self.verifier.verify(&fetched.content)?;
        AuthorizationList::from_yaml(&verified.plaintext)
    }

    /// Load and install a new list
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let started = Instant::now();
        let list = self.load().await?;
        let entries = list.len();
        self.store.swap(list);
        info!(
            entries,
            elapsed_ms = started.elapsed().as_millis(),
            "Authorization list has been updated"
        );
        Ok(())
    }

    /// First load at startup
    ///
    /// The caller must treat an error as fatal: nothing can be authorized
    /// before a list exists.
    pub async fn bootstrap(&self) -> Result<(), AuthError> {
        info!(source = %self.source.describe(), "Loading initial authorization list");
        self.refresh()
            .await
            .inspect_err(|e| error!(error = %e, "Initial authorization list load failed"))
    }
}

#[async_trait]
impl Refresh for AuthService {
    async fn refresh(&self) -> Result<(), RefreshError> {
        AuthService::refresh(self).await.map_err(Into::into)
    }
}
