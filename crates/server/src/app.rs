//! Process assembly.
//!
//! Startup order: certificate scan, signer keyring, authorization bootstrap,
//! refresh loops, HTTP listener, signal listener. Any failure before the
//! listener is bound aborts startup.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use pemvault_common::Lifecycle;
use pemvault_config::{Config, ConfigSourceKind};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::{
    AuthService, AuthorizationStore, ConfigSource, FileSource, GithubFetcher, HmacAuthenticator,
    PayloadVerifier, PgpVerifier,
};
use crate::http::{self, ApiState, ClientIpResolver};
use crate::refresh::{RefreshHandle, RefreshLoop};
use crate::registry::{CertificateRegistry, DirectoryRescan};
use crate::signals;

/// A started server
pub struct RunningApp {
    lifecycle: Lifecycle,
    registry: Arc<CertificateRegistry>,
    store: Arc<AuthorizationStore>,
    local_addr: SocketAddr,
    refresh_handles: Vec<RefreshHandle>,
}

impl RunningApp {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn registry(&self) -> &Arc<CertificateRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<AuthorizationStore> {
        &self.store
    }

    pub fn refresh_handles(&self) -> &[RefreshHandle] {
        &self.refresh_handles
    }

    /// Wait for shutdown, drain tasks and close every open file
    ///
    /// Returns `true` when all tasks finished within the drain timeout.
    pub async fn wait(self) -> bool {
        self.lifecycle.cancelled().await;
        let drained = self.lifecycle.shutdown().await;
        let closed = self.registry.close_all();
        info!(closed_files = closed, drained, "Shutdown complete");
        drained
    }

    /// Request shutdown and wait for it
    pub async fn stop(self) -> bool {
        self.lifecycle.abort("stop requested");
        self.wait().await
    }
}

/// Run until a termination signal arrives
pub async fn run(config: Config) -> Result<()> {
    let app = start(&config).await?;
    if !app.wait().await {
        warn!("Some tasks did not finish before the drain timeout");
    }
    Ok(())
}

/// Start with the configured signer keyring
pub async fn start(config: &Config) -> Result<RunningApp> {
    let keyring = config.auth.signers_keyring.clone();
    let verifier = tokio::task::spawn_blocking(move || PgpVerifier::from_file(&keyring))
        .await?
        .with_context(|| {
            format!(
                "Failed to load signer keyring {}",
                config.auth.signers_keyring.display()
            )
        })?;
    start_with_verifier(config, Arc::new(verifier)).await
}

/// Start with an explicit payload verifier
pub async fn start_with_verifier(
    config: &Config,
    verifier: Arc<dyn PayloadVerifier>,
) -> Result<RunningApp> {
    let lifecycle = Lifecycle::new(config.server.shutdown_timeout);

    let registry = Arc::new(CertificateRegistry::from_config(&config.storage));
    let cert_path = config.storage.cert_path.clone();
    {
        let registry = Arc::clone(&registry);
        let root = cert_path.clone();
        tokio::task::spawn_blocking(move || registry.scan_directory(&root))
            .await?
            .with_context(|| format!("Failed to scan certificate path {}", cert_path.display()))?;
    }

    let source = config_source(config)?;
    let store = Arc::new(AuthorizationStore::new());
    let auth = Arc::new(AuthService::new(source, verifier, Arc::clone(&store)));
    if let Err(e) = auth.bootstrap().await {
        lifecycle.abort("initial authorization load failed");
        registry.close_all();
        return Err(e).context("Failed to load the initial authorization list");
    }

    let authenticator = HmacAuthenticator::new(config.auth.sign_token.as_bytes())
        .map_err(|_| anyhow!("Sign token is not a usable HMAC key"))?;

    let mut refresh_handles = Vec::new();
    let auth_loop = RefreshLoop::new(
        "authorization",
        auth,
        config.auth.pull_interval,
        config.auth.pull_error_delay,
        lifecycle.token(),
    );
    refresh_handles.push(auth_loop.handle());
    lifecycle.spawn("authorization-refresh", auth_loop.run());

    if let Some(interval) = config.storage.rescan_interval {
        let rescan_loop = RefreshLoop::new(
            "certificates",
            Arc::new(DirectoryRescan::new(Arc::clone(&registry), cert_path)),
            interval,
            config.storage.rescan_error_delay,
            lifecycle.token(),
        );
        refresh_handles.push(rescan_loop.handle());
        lifecycle.spawn("certificate-rescan", rescan_loop.run());
    }

    let listener = match TcpListener::bind(config.server.listen.as_str()).await {
        Ok(l) => l,
        Err(e) => {
            lifecycle.abort("listener bind failed");
            lifecycle.shutdown().await;
            registry.close_all();
            return Err(e).with_context(|| format!("Failed to bind {}", config.server.listen));
        }
    };
    let local_addr = listener.local_addr()?;

    let state = ApiState {
        authenticator: Arc::new(authenticator),
        authorizer: store.clone(),
        certificates: registry.clone(),
        client_ip: Arc::new(ClientIpResolver::from_config(&config.server)),
    };
    let router = http::router(state, config.server.request_timeout);

    let server_lifecycle = lifecycle.clone();
    let token = lifecycle.token();
    lifecycle.spawn("http-server", async move {
        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;
        if let Err(e) = served {
            error!(error = %e, "HTTP server failed");
            server_lifecycle.abort("http server failed");
        }
    });

    lifecycle.spawn(
        "signals",
        signals::listen(lifecycle.clone(), refresh_handles.clone()),
    );

    info!(
        listen = %local_addr,
        domains = registry.domains().len(),
        "pemvault is serving"
    );

    Ok(RunningApp {
        lifecycle,
        registry,
        store,
        local_addr,
        refresh_handles,
    })
}

fn config_source(config: &Config) -> Result<Arc<dyn ConfigSource>> {
    match config.auth.source {
        ConfigSourceKind::Github => {
            let fetcher =
                GithubFetcher::new(&config.github).context("Failed to build GitHub client")?;
            Ok(Arc::new(fetcher))
        }
        ConfigSourceKind::File => {
            let path = config
                .auth
                .file
                .clone()
                .context("Authorization source is 'file' but no file is configured")?;
            Ok(Arc::new(FileSource::new(path)))
        }
    }
}
