//! Ownership of the one long-lived browser session.
//!
//! [`BrowserSessionManager`] launches the rendering engine once at startup
//! through a [`SessionFactory`], confirms it can load a page, and hands the
//! resulting [`DevToolsSession`] to the [`Converter`](crate::Converter).
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_service::prelude::*;
//! use std::sync::Arc;
//!
//! let manager = BrowserSessionManager::start(Arc::new(ChromeSessionFactory::with_defaults())).await?;
//! let converter = Converter::new(manager.session(), &ServiceConfig::default());
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::content_server::{ContentServer, ServedContent};
use crate::error::{RenderError, Result};
use crate::factory::{ChromeSessionFactory, SessionFactory};
use crate::traits::DevToolsSession;

/// Document loaded by the startup probe. Echoes and then overrides the
/// page's cookies, exercising script execution and storage.
pub const PROBE_DOCUMENT: &str = r#"
<body>
<script>
    var p = document.createElement("p");
    p.innerText = document.cookie;
    p.setAttribute("id", "cookies");
    document.body.appendChild(p);
    document.cookie = "foo=bar";
</script>
</body>
"#;

/// Protocol timeout for the startup probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Owner of the shared browser session.
///
/// Created once per process. Cloning the session handle out with
/// [`session`](Self::session) is cheap.
pub struct BrowserSessionManager {
    session: Arc<dyn DevToolsSession>,
}

impl BrowserSessionManager {
    /// Launch the engine and run the startup probe.
    ///
    /// A failed probe is logged and startup continues.
    ///
    /// # Errors
    ///
    /// [`RenderError::Session`] if the engine cannot be launched.
    pub async fn start(factory: Arc<dyn SessionFactory>) -> Result<Self> {
        log::info!("Starting browser session...");

        let session = tokio::task::spawn_blocking(move || factory.create())
            .await
            .map_err(|e| {
                log::error!("❌ Session launch task failed: {}", e);
                RenderError::Session(format!("launch task failed: {}", e))
            })??;

        let manager = Self { session };

        match manager.probe().await {
            Ok(()) => log::info!("✅ Browser session confirmed"),
            Err(e) => log::error!("❌ Browser session probe failed, continuing: {}", e),
        }

        Ok(manager)
    }

    /// Launch headless Chrome as configured by `config`.
    pub async fn start_chrome(config: &ServiceConfig) -> Result<Self> {
        let factory = ChromeSessionFactory::from_path(config.chrome_path.clone());
        Self::start(Arc::new(factory)).await
    }

    /// Wrap an existing session without probing it.
    pub fn from_session(session: Arc<dyn DevToolsSession>) -> Self {
        Self { session }
    }

    /// Serve [`PROBE_DOCUMENT`] and navigate the session to it.
    pub async fn probe(&self) -> Result<()> {
        let server = ContentServer::serve(ServedContent::html(PROBE_DOCUMENT)).await?;
        let url = server.url().to_string();
        let session = Arc::clone(&self.session);

        log::debug!("Probing browser session with {}", url);
        let outcome = tokio::task::spawn_blocking(move || {
            session.set_timeout(PROBE_TIMEOUT);
            session.navigate(&url)
        })
        .await
        .map_err(|e| RenderError::Internal(format!("probe task failed: {}", e)));

        server.shutdown().await;
        outcome?
    }

    /// The shared session handle.
    pub fn session(&self) -> Arc<dyn DevToolsSession> {
        Arc::clone(&self.session)
    }

    /// Health check of the session.
    pub async fn ping(&self) -> Result<()> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || session.ping())
            .await
            .map_err(|e| RenderError::Internal(format!("ping task failed: {}", e)))?
    }
}

impl std::fmt::Debug for BrowserSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSessionManager").finish_non_exhaustive()
    }
}
