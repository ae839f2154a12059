use std::sync::Arc;

use docchat_core::bootstrap::AppBuilder;
use docchat_gateway::GatewayServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let app = AppBuilder::from_env()?;
    tracing::info!(path = %app.config_path().display(), "configuration loaded");

    let embedding = app.build_embedding().await?;
    let registry = Arc::new(app.build_registry(embedding)?);

    let (shutdown_tx, shutdown_rx) = AppBuilder::build_shutdown();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let server = GatewayServer::new(
        Arc::new(app.config().clone()),
        registry,
        app.vault(),
        shutdown_rx,
    );
    server.serve().await?;

    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
