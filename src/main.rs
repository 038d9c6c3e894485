use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use clearance_backend::config::Config;
use clearance_backend::{build_catalog, build_router, build_state, build_store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    std::fs::create_dir_all(&config.log_dir).context("Failed to create logs directory")?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_target(true) // Include target (module path) in logs
        .with_writer(non_blocking.and(std::io::stdout)) // Write logs to the file and stdout
        .init();

    let store = build_store(&config)
        .await
        .context("Failed to open the request store")?;
    let catalog = build_catalog(&config).context("Failed to load the workflow catalog")?;

    let addr = config.bind_addr;
    let app = build_router(build_state(config, store, catalog));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind listener on {addr}"))?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server encountered an error")?;

    tracing::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down...");
}
