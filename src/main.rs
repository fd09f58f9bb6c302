use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use tick_feed::config::{Cli, Settings};
use tick_feed::feed::{Broadcaster, Scheduler};
use tick_feed::market::{FileCatalog, Registry};
use tick_feed::server::{self, AppState};
use tick_feed::sim::PriceSimulator;
use tick_feed::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let settings = Settings::load(&cli).context("loading settings")?;

    telemetry::init_tracing(&settings.log.filter);
    telemetry::init_metrics(settings.server.metrics_port).context("starting metrics exporter")?;

    // Never serve a partial or empty catalog.
    let source = FileCatalog::new(&settings.catalog.path);
    let registry = Registry::load(&source)
        .await
        .with_context(|| format!("loading catalog {}", settings.catalog.path.display()))?;

    let broadcaster = Arc::new(
        Broadcaster::new(registry.instruments().into(), settings.feed.send_queue_capacity)
            .context("encoding initial snapshot")?
            .with_book_seed(settings.simulation.seed),
    );
    let simulator = PriceSimulator::new(registry, settings.simulation.seed);
    let ticker = Scheduler::new(simulator, Arc::clone(&broadcaster), settings.tick_interval()).spawn();

    let addr = settings.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, tick_ms = settings.simulation.tick_interval_ms, "Stock feed listening");

    server::serve(listener, AppState::new(broadcaster), shutdown_signal()).await?;

    ticker.abort();
    info!("Stock feed stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
