use clap::Parser;
use store_orchestrator::api;
use store_orchestrator::config::OrchestratorConfig;
use store_orchestrator::runtime::{setup_tracing, StoreSystem};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = OrchestratorConfig::parse();
    setup_tracing();

    let addr = config.socket_addr()?;
    let system = StoreSystem::start(&config);
    let app = api::router(system.service.clone(), config.work_dir.join(&config.public_dir));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Store orchestrator listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server failed");
    }

    system.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
