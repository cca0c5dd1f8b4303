//! pemvault - main entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pemvault_config::{Config, LogFormat};

/// pemvault - serves TLS material to hosts on a signed allow-list
#[derive(Parser, Debug)]
#[command(name = "pemvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (KDL)
    #[arg(short = 'c', long = "config", env = "PEMVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration file
    #[arg(long = "listen")]
    listen: Option<String>,

    /// Certificate tree root, overrides the configuration file
    #[arg(long = "cert-path")]
    cert_path: Option<PathBuf>,

    /// Shared HMAC secret for request signatures
    #[arg(long = "sign-token", env = "PEMVAULT_SIGN_TOKEN", hide_env_values = true)]
    sign_token: Option<String>,

    /// Token for the GitHub contents API
    #[arg(long = "github-token", env = "PEMVAULT_GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Log filter directive, e.g. `info` or `pemvault=debug`
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Log output format: `pretty` or `json`
    #[arg(long = "log-format")]
    log_format: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,

    /// Test configuration and exit
    #[arg(short = 't', long = "test")]
    test: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    init_logging(&config, cli.verbose);

    if cli.test {
        return test_config(&config, cli.config.as_deref());
    }

    run_server(config)
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration file {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(listen) = &cli.listen {
        config.server.listen = listen.clone();
    }
    if let Some(path) = &cli.cert_path {
        config.storage.cert_path = path.clone();
    }
    if let Some(token) = &cli.sign_token {
        config.auth.sign_token = token.clone();
    }
    if let Some(token) = &cli.github_token {
        config.github.token = Some(token.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = LogFormat::from_str_loose(format);
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(false)
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

/// Validate the configuration and exit
fn test_config(config: &Config, path: Option<&std::path::Path>) -> Result<()> {
    let result = config.validate();
    for e in &result.errors {
        error!("{}", e);
    }
    let count = result.errors.len();
    let result = result
        .into_result()
        .with_context(|| format!("Configuration validation failed with {} error(s)", count))?;

    info!(
        listen = %config.server.listen,
        cert_path = %config.storage.cert_path.display(),
        source = ?config.auth.source,
        warnings = result.warnings.len(),
        "Configuration test successful"
    );
    println!(
        "pemvault: configuration file {} test is successful",
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(defaults)".to_string())
    );
    Ok(())
}

fn run_server(config: Config) -> Result<()> {
    let result = config.validate();
    for e in &result.errors {
        error!("{}", e);
    }
    let result = result
        .into_result()
        .context("Refusing to start with an invalid configuration")?;
    if !result.warnings.is_empty() {
        warn!(
            count = result.warnings.len(),
            "Starting with configuration warnings"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("pemvault")
        .build()
        .context("Failed to build the async runtime")?;

    runtime.block_on(pemvault::run(config))
}
