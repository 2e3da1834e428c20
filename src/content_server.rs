//! Ephemeral loopback HTTP server for request-scoped content.
//!
//! The browser can only navigate to a URL, so each conversion spins up a
//! tiny axum server on `127.0.0.1:0` that answers every path with one fixed
//! body. The server lives exactly as long as its [`ContentServer`] guard.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_service::content_server::{ContentServer, ServedContent};
//!
//! let server = ContentServer::serve(ServedContent::html("<p>hi</p>")).await?;
//! session.navigate(server.url().as_str())?;
//! server.shutdown().await;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::error::{RenderError, Result};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const CSS_CONTENT_TYPE: &str = "text/css; charset=utf-8";

/// How long [`ContentServer::shutdown`] waits for open connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Immutable body and content type answered by one server.
#[derive(Debug, Clone)]
pub struct ServedContent {
    body: Bytes,
    content_type: &'static str,
}

impl ServedContent {
    /// An HTML document. Surrounding whitespace is trimmed.
    pub fn html(body: impl AsRef<str>) -> Self {
        Self::new(body.as_ref(), HTML_CONTENT_TYPE)
    }

    /// A stylesheet. Surrounding whitespace is trimmed.
    pub fn css(body: impl AsRef<str>) -> Self {
        Self::new(body.as_ref(), CSS_CONTENT_TYPE)
    }

    fn new(body: &str, content_type: &'static str) -> Self {
        Self {
            body: Bytes::copy_from_slice(body.trim().as_bytes()),
            content_type,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

async fn serve_content(State(content): State<Arc<ServedContent>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, content.content_type)],
        content.body.clone(),
    )
}

/// RAII guard for a running content server.
///
/// Dropping the guard signals the server to stop; [`shutdown`](Self::shutdown)
/// does the same and also waits for it.
#[derive(Debug)]
pub struct ContentServer {
    url: Url,
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ContentServer {
    /// Bind a loopback listener and start answering with `content`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContentServer`] if the listener cannot be bound.
    pub async fn serve(content: ServedContent) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            log::error!("❌ Failed to bind content server: {}", e);
            RenderError::ContentServer(e.to_string())
        })?;

        let addr = listener
            .local_addr()
            .map_err(|e| RenderError::ContentServer(e.to_string()))?;

        let url = Url::parse(&format!("http://{}/", addr))
            .map_err(|e| RenderError::ContentServer(e.to_string()))?;

        let app = Router::new()
            .fallback(serve_content)
            .with_state(Arc::new(content));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;

            if let Err(e) = result {
                log::warn!("⚠️ Content server on {} stopped with error: {}", addr, e);
            }
            log::trace!("Content server on {} stopped", addr);
        });

        log::debug!("Content server listening on {}", url);

        Ok(Self {
            url,
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// URL the browser should navigate to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the server to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(_) => log::trace!("Content server on {} shut down", self.addr),
                Err(_) => {
                    log::warn!(
                        "⚠️ Content server on {} did not stop within {:?}, aborting",
                        self.addr,
                        SHUTDOWN_GRACE
                    );
                    task.abort();
                }
            }
        }
    }
}

impl Drop for ContentServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
