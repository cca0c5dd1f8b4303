//! KDL configuration file parsing.
//!
//! ```kdl
//! server {
//!     listen "0.0.0.0:8443"
//! }
//! auth {
//!     sign-token "..."
//!     signers-keyring "/etc/pemvault/signers.asc"
//! }
//! github {
//!     repo "acme/tls-authorization"
//! }
//! storage {
//!     cert-path "/etc/letsencrypt/live"
//! }
//! ```

mod helpers;
mod sections;

use anyhow::{Context, Result};
use kdl::KdlDocument;
use tracing::{debug, trace};

use crate::Config;

pub use sections::{
    parse_auth_config, parse_github_config, parse_logging_config, parse_server_config,
    parse_storage_config,
};

/// Parse a whole configuration document
pub fn parse_config(content: &str, source_name: &str) -> Result<Config> {
    trace!(source = %source_name, "Parsing KDL configuration");

    let doc: KdlDocument = content
        .parse()
        .map_err(|e: kdl::KdlError| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid KDL in {}", source_name))?;

    let mut config = Config::default();

    for node in doc.nodes() {
        let name = node.name().value();
        match name {
            "server" => config.server = parse_server_config(node)?,
            "auth" => config.auth = parse_auth_config(node)?,
            "github" => config.github = parse_github_config(node)?,
            "storage" => config.storage = parse_storage_config(node)?,
            "logging" => config.logging = parse_logging_config(node)?,
            other => {
                return Err(anyhow::anyhow!(
                    "Unknown configuration block '{}' in {}. Valid blocks: server, auth, github, storage, logging",
                    other,
                    source_name
                ));
            }
        }
    }

    debug!(source = %source_name, "Configuration parsed");
    Ok(config)
}
