//! Health check trait for browser sessions.
//!
//! The converter pings the shared session before every conversion and the
//! session manager exposes the same check to callers. A failed ping is
//! logged, never fatal: the pipeline that follows fails fast on its own if
//! the engine is really gone.

use crate::error::Result;

/// Trait for session-like objects that support health checking.
///
/// # Thread Safety
///
/// This trait requires `Send + Sync` because the session is shared between
/// the async request path and the blocking pipeline worker.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use html2pdf_service::{Healthcheck, RenderError, Result};
///
/// struct MySession {
///     browser: headless_chrome::Browser,
/// }
///
/// impl Healthcheck for MySession {
///     fn ping(&self) -> Result<()> {
///         self.browser
///             .get_version()
///             .map(|_| ())
///             .map_err(|e| RenderError::Session(e.to_string()))
///     }
/// }
/// ```
pub trait Healthcheck: Send + Sync {
    /// Perform a lightweight liveness check.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Session`](crate::RenderError::Session) if the
    /// engine does not answer.
    fn ping(&self) -> Result<()>;
}
