//! fxgate server - HTTP gateway for exchange rates.
//!
//! Proxies a Frankfurter-compatible rates API behind a small REST surface,
//! caches upstream answers and records request analytics in SQLite.

mod handlers;
mod server;

use anyhow::Result;
use clap::Parser;
use fxgate_core::config::NetworkConfig;
use fxgate_core::{RatesService, ServiceConfig};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "fxgate-server")]
#[command(about = "Exchange-rate gateway with request analytics")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, env = "FXGATE_PORT", default_value = "8080")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "FXGATE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Base URL of the upstream rates API
    #[arg(long, env = "FXGATE_UPSTREAM_URL", default_value = NetworkConfig::UPSTREAM_BASE_URL)]
    upstream_url: String,

    /// Analytics database file (defaults to the user data directory)
    #[arg(long, env = "FXGATE_DB", conflicts_with = "in_memory")]
    db: Option<PathBuf>,

    /// Keep analytics in memory only
    #[arg(long)]
    in_memory: bool,

    /// Upstream request timeout in seconds
    #[arg(long, env = "FXGATE_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// Attempts per upstream request, including the first
    #[arg(long, env = "FXGATE_MAX_ATTEMPTS", default_value = "3")]
    max_attempts: u32,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn service_config(&self) -> fxgate_core::Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .upstream_url(&self.upstream_url)
            .request_timeout(Duration::from_secs(self.timeout_secs))
            .max_attempts(self.max_attempts);
        if self.in_memory {
            builder = builder.in_memory_database();
        } else if let Some(db) = &self.db {
            builder = builder.database_path(db);
        }
        builder.build()
    }
}

/// Wait for `signal`, then drain the analytics queue before exiting.
async fn wait_for_shutdown<F>(service: &RatesService, signal: F) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    signal.await?;
    info!("Shutdown signal received, flushing analytics");
    service.flush_analytics().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug when set
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting fxgate server");

    let config = args.service_config()?;
    let service = RatesService::new(&config)?;

    let addr = server::start_server(service.clone(), &args.host, args.port).await?;

    // Machine-readable port line for supervisors and tests
    println!("FXGATE_PORT={}", addr.port());

    info!("Gateway running on http://{}", addr);

    wait_for_shutdown(&service, tokio::signal::ctrl_c()).await?;

    Ok(())
}
