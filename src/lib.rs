//! # html2pdf-service
//!
//! HTML to PDF conversion over one long-lived headless Chrome session.
//!
//! The service accepts an HTML document (plus optional stylesheet, header
//! and footer templates), drives Chrome through the DevTools Protocol and
//! returns the printed PDF. Conversions are serialized over a single shared
//! session and bounded by a deadline; a failed attempt falls back to the
//! bytes it already captured, or is retried once.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP (axum) ──▶ Converter ──lock──▶ ContentServer (127.0.0.1:0)
//!                      │                       ▲
//!                      ▼                       │ navigate
//!               ActionPipeline ──▶ DevToolsSession (Chrome tab)
//!                      │                       │
//!                      └── PageReadyLatch ◀── load event
//! ```
//!
//! | Component | Type |
//! |-----------|------|
//! | Orchestrator | [`Converter`] |
//! | Session owner | [`BrowserSessionManager`] |
//! | Protocol seam | [`DevToolsSession`], [`SessionFactory`] |
//! | Pipeline | [`ActionPipeline`](pipeline::ActionPipeline) |
//! | Readiness gate | [`PageReadyLatch`](latch::PageReadyLatch) |
//! | Loopback server | [`ContentServer`](content_server::ContentServer) |
//! | Request log context | [`correlation`] |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use html2pdf_service::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let manager = BrowserSessionManager::start_chrome(&config).await?;
//!     let converter = Arc::new(Converter::new(manager.session(), &config));
//!
//!     let request = ConversionRequest::new("<h1 id='title'>Invoice</h1>", "title");
//!     let result = converter.convert(request).await?;
//!     std::fs::write("invoice.pdf", result.into_bytes())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `env-config` | Load configuration from `app.env` and environment | ✅ |
//! | `axum-integration` | HTTP router with correlation ids and access log | ✅ |
//! | `server` | The `html2pdf-server` binary and ECS JSON logging | ❌ |
//! | `test-utils` | `MockSession` for tests without Chrome | ❌ |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, RenderError>`](Result).
//! Pipeline errors never escape [`Converter::convert`]: they become partial
//! or empty results, and an empty result keeps the last error as its
//! `cause`.
//!
//! ## Testing
//!
//! Enable the `test-utils` feature and drive a
//! [`MockSession`](factory::mock::MockSession):
//!
//! ```rust,ignore
//! use html2pdf_service::factory::mock::{MockSession, MockStep};
//!
//! let session = Arc::new(MockSession::new().failing_at(MockStep::Print, "boom"));
//! let converter = Converter::new(session, &ServiceConfig::default());
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod content_server;
pub mod correlation;
pub mod error;
pub mod factory;
pub mod latch;
pub mod pipeline;
pub mod prelude;
pub mod service;
pub mod session;
pub mod stats;
pub mod traits;

// ============================================================================
// Feature-gated modules
// ============================================================================

/// Web framework integrations.
#[cfg(feature = "axum-integration")]
pub mod integrations;

/// ECS JSON logging for the server binary.
#[cfg(feature = "server")]
pub mod logging;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{RenderError, Result};
pub use factory::{ChromeSession, ChromeSessionFactory, SessionFactory, create_chrome_options};
pub use service::{ConversionRequest, ConversionResult, Converter, HtmlRequest, ValidationError};
pub use session::BrowserSessionManager;
pub use stats::ConversionStats;
pub use traits::{DevToolsSession, Healthcheck, PdfParams};

#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};
