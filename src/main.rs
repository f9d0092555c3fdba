use render_scraper_service::api::create_router;
use render_scraper_service::{ChromeEngine, ScraperConfig, ScraperError, ScraperService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ScraperError> {
    dotenv::dotenv().ok();

    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,render_scraper_service=debug")),
        )
        .init();

    let config = ScraperConfig::from_env()?;
    let service = ScraperService::new(ChromeEngine::new(config.clone()), &config);
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    info!("Listening on http://{}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
