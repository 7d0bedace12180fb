//! Scouter Web Server
//!
//! Multi-tenant recruiting backend: authentication, access gate and company data.

use clap::Parser;
use scouter_core::{init_logging, ScouterConfig};
use scouter_web::{auth::employees::DirectorySeed, server::ScouterServerBuilder};
use std::path::PathBuf;

/// Scouter Web Server - authentication and tenant-scoped API for Scouter
#[derive(Parser)]
#[command(name = "scouter-web")]
#[command(about = "HTTP API for the Scouter recruiting backend")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// Database URL for persistent storage (e.g. sqlite://scouter.db?mode=rwc)
    #[arg(long)]
    database_url: Option<String>,

    /// JSON file with companies, employees and access codes to load at startup
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Load environment variables before reading SCOUTER__* overrides
    dotenvy::dotenv().ok();

    let mut config = match ScouterConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(level) = &args.log_level {
        config.logging = config.logging.with_level(level);
    }
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let mut builder = ScouterServerBuilder::with_config(config);
    if let Some(host) = args.host {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if args.dev {
        builder = builder.dev_mode(true);
    }
    if let Some(url) = args.database_url {
        builder = builder.database_url(url);
    }

    let server = match builder.build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to build server: {}", e);
            eprintln!("Failed to build server: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.seed {
        let applied = match DirectorySeed::from_file(path) {
            Ok(seed) => seed.apply(&server.state().employees).await,
            Err(e) => Err(e),
        };
        if let Err(e) = applied {
            eprintln!("Failed to load seed {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    if let Err(e) = server.start().await {
        eprintln!("Server failed: {}", e);
        std::process::exit(1);
    }
}
