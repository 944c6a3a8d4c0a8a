//! sevad — the Seva workflow service daemon.

use clap::Parser;
use seva_engine::fixtures::three_officer_chain;
use seva_engine::{EngineBuilder, StaticDefinitionSource};
use seva_service::{create_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Seva workflow service.
#[derive(Parser)]
#[command(name = "sevad")]
#[command(about = "Seva workflow orchestration service", long_about = None)]
#[command(version)]
struct Cli {
    /// Listen address.
    #[arg(short, long, env = "SEVA_LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Sweep period in seconds (query expiry, SLA breaches).
    #[arg(long, env = "SEVA_SWEEP_SECS", default_value_t = 300)]
    sweep_secs: u64,

    /// Log filter (tracing env-filter syntax).
    #[arg(long, env = "SEVA_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log)?)
        .init();

    // The demo build seeds the standard three-officer chain; a production
    // deployment wires a config-registry-backed DefinitionSource here.
    let source = StaticDefinitionSource::with_definition(three_officer_chain());
    let engine = Arc::new(EngineBuilder::new(Arc::new(source)).build());

    let sweeper = engine.spawn_sweeper(Duration::from_secs(cli.sweep_secs));

    let state = AppState::new(Arc::clone(&engine));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    tracing::info!(listen = %cli.listen, "sevad listening");
    axum::serve(listener, router).await?;

    sweeper.abort();
    Ok(())
}
