//! JWT Auth Provider - forward-auth server
//!
//! Answers authentication subrequests from a reverse proxy using JWTs.

use clap::Parser;
use jwt_auth_provider::config::{Config, LoggingConfig};
use jwt_auth_provider::{host::ModuleRegistry, server::AuthServer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// JWT Auth Provider - forward-auth server for reverse proxies
#[derive(Parser, Debug)]
#[command(name = "jwt-auth-provider")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,
}

fn init_logging(logging: &LoggingConfig, override_level: Option<&str>) -> anyhow::Result<()> {
    let level = override_level.unwrap_or(&logging.level).to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    init_logging(&config.logging, args.log_level.as_deref())?;

    info!("Starting JWT Auth Provider v{}", jwt_auth_provider::VERSION);
    info!("Loaded configuration from {:?}", args.config);

    let registry = ModuleRegistry::with_builtin();
    let server = AuthServer::new(&config, &registry).await?;
    server.run_until_shutdown().await?;

    Ok(())
}
