//! HTML to PDF conversion server.
//!
//! Reads configuration from `app.env` and the environment, launches one
//! headless Chrome session and serves the HTTP API on `0.0.0.0:$PORT`
//! until Ctrl+C or SIGTERM.

use std::sync::Arc;

use html2pdf_service::config::env::from_env;
use html2pdf_service::integrations::axum::router;
use html2pdf_service::{BrowserSessionManager, Converter, logging};
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("❌ Failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = from_env()?;
    logging::init(&config);

    log::info!(
        "Starting html2pdf server (port {}, timeout {:?}, swagger {})",
        config.port,
        config.conversion_timeout,
        config.swagger_enabled
    );

    let manager = BrowserSessionManager::start_chrome(&config).await?;
    let converter = Arc::new(Converter::new(manager.session(), &config));
    let app = router(Arc::clone(&converter), &config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    log::info!("✅ Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped after {:?}", converter.stats());
    Ok(())
}
