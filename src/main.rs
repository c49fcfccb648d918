//! Petitions exporter HTTP server
//!
//! Starts the background petitions fetcher and an Axum server exposing
//! `/health` and `/metrics`. On SIGTERM or Ctrl-C the server drains for a
//! bounded grace period, then the fetcher is stopped and awaited.

use clap::Parser;
use petitions_exporter::{
    cli::{Cli, Command, generate_config_template},
    config::{Config, PETITIONS_URL_ENV},
    fetcher::Fetcher,
    handlers::AppState,
    metrics::Metrics,
    petitions::PetitionsClient,
    server, telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = Arc::new(config.with_base_url_override(std::env::var(PETITIONS_URL_ENV).ok())?);

    // Initialize telemetry
    telemetry::init(
        &config.observability.log_level,
        config.observability.log_format,
    );

    let metrics = Metrics::new()?;

    let client = PetitionsClient::new(
        &config.upstream.base_url,
        config.upstream.request_timeout(),
        config.upstream.max_pages,
    )?;
    let fetcher = Fetcher::new(
        Arc::new(client),
        config.upstream.base_url.clone(),
        config.upstream.poll_interval(),
        metrics.clone(),
    )
    .with_stale_retraction(config.upstream.retract_stale_petitions);
    fetcher.start()?;

    let app = server::build_router(AppState::new(config.clone(), metrics));

    let addr = SocketAddr::from((config.server.ip_addr()?, config.server.port));

    tracing::info!(
        %addr,
        upstream = %config.upstream.base_url,
        "Starting petitions exporter"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        _ = server::shutdown_signal() => {}
        result = &mut server_task => {
            tracing::error!(result = ?result, "HTTP server exited before shutdown signal");
        }
    }

    // Stop accepting connections, then give in-flight requests a bounded grace period
    shutdown_tx.send_replace(true);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    if !server_task.is_finished() {
        match tokio::time::timeout(grace, &mut server_task).await {
            Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
            Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server failed during shutdown"),
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
            Err(_) => {
                tracing::warn!(
                    grace_seconds = grace.as_secs(),
                    "Shutdown grace period elapsed with requests still in flight"
                );
                server_task.abort();
            }
        }
    }

    fetcher.stop();
    fetcher.wait().await;

    tracing::info!("Petitions exporter stopped");
    Ok(())
}
