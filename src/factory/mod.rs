//! Session factory implementations.
//!
//! This module provides the [`SessionFactory`] trait and implementations
//! for launching the rendering engine and opening the one page the service
//! drives.
//!
//! # Available Factories
//!
//! | Factory | Description |
//! |---------|-------------|
//! | [`ChromeSessionFactory`] | Launches headless Chrome/Chromium |
//! | [`mock::MockSessionFactory`] | Scripted sessions for tests (feature-gated) |
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_service::{ChromeSessionFactory, SessionFactory};
//!
//! let factory = ChromeSessionFactory::with_defaults();
//! let session = factory.create()?;
//! session.navigate("about:blank")?;
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeSession, ChromeSessionFactory, create_chrome_options};

use std::sync::Arc;

use crate::error::Result;
use crate::traits::DevToolsSession;

/// Trait for launching a [`DevToolsSession`].
///
/// Called once at startup by the
/// [`BrowserSessionManager`](crate::BrowserSessionManager). Creation is
/// blocking and runs on a blocking worker.
///
/// # Errors
///
/// Implementations return
/// [`RenderError::Session`](crate::RenderError::Session) when the engine
/// cannot be launched and
/// [`RenderError::Configuration`](crate::RenderError::Configuration) for
/// invalid launch options.
pub trait SessionFactory: Send + Sync {
    /// Launch the engine and open a session on a fresh page.
    fn create(&self) -> Result<Arc<dyn DevToolsSession>>;
}
