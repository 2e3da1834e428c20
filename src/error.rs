//! Error types for the conversion service.
//!
//! This module provides [`RenderError`], a unified error type for every stage
//! of a conversion (session, pipeline, content server, configuration), and a
//! convenient [`Result`] type alias.
//!
//! # Example
//!
//! ```rust
//! use html2pdf_service::{RenderError, Result};
//!
//! fn render() -> Result<Vec<u8>> {
//!     Err(RenderError::Print("printToPDF returned no data".to_string()))
//! }
//!
//! match render() {
//!     Ok(pdf) => println!("Generated {} bytes", pdf.len()),
//!     Err(RenderError::DeadlineExceeded(elapsed)) => println!("Gave up after {:?}", elapsed),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::time::Duration;

/// Errors that can occur while converting HTML to PDF.
///
/// The pipeline-stage variants ([`Navigation`](Self::Navigation),
/// [`Script`](Self::Script), [`Content`](Self::Content),
/// [`PageNotReady`](Self::PageNotReady), [`Print`](Self::Print)) and
/// [`DeadlineExceeded`](Self::DeadlineExceeded) are consumed by the
/// converter's fallback policy and never reach HTTP clients as distinct
/// status codes. The remaining variants describe infrastructure failures.
///
/// # Example
///
/// ```rust
/// use html2pdf_service::RenderError;
///
/// let error = RenderError::Script("ReferenceError: foo is not defined".to_string());
/// assert_eq!(error.error_code(), "SCRIPT_FAILED");
/// assert!(error.is_pipeline_failure());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The rendering engine could not be launched or reached.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found or not installed
    /// - Invalid `CHROME_PATH`
    /// - DevTools connection lost (browser process crashed)
    #[error("Browser session error: {0}")]
    Session(String),

    /// Navigation to the content server URL failed.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Script evaluation failed or the script threw an exception.
    #[error("Script evaluation failed: {0}")]
    Script(String),

    /// The document frame could not be resolved or its content could not be
    /// replaced.
    ///
    /// Also raised when `content` is not a valid template for the supplied
    /// stylesheet (it must contain exactly one `%s` slot).
    #[error("Content error: {0}")]
    Content(String),

    /// The load-complete listener was cancelled before the page signalled
    /// readiness.
    #[error("Page never became ready: {0}")]
    PageNotReady(String),

    /// `Page.printToPDF` failed.
    #[error("PDF generation failed: {0}")]
    Print(String),

    /// The pipeline deadline elapsed.
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// The ephemeral content server could not be started.
    #[error("Content server error: {0}")]
    ContentServer(String),

    /// Invalid configuration provided.
    ///
    /// # Common Causes
    ///
    /// - `conversion_timeout` set to zero
    /// - `reveal_selector` left blank
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure (for example a panicked worker task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenderError {
    /// Returns a machine-readable error code.
    ///
    /// ```rust
    /// use html2pdf_service::RenderError;
    /// use std::time::Duration;
    ///
    /// assert_eq!(
    ///     RenderError::DeadlineExceeded(Duration::from_secs(20)).error_code(),
    ///     "DEADLINE_EXCEEDED"
    /// );
    /// ```
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Session(_) => "SESSION_ERROR",
            Self::Navigation(_) => "NAVIGATION_FAILED",
            Self::Script(_) => "SCRIPT_FAILED",
            Self::Content(_) => "CONTENT_ERROR",
            Self::PageNotReady(_) => "PAGE_NOT_READY",
            Self::Print(_) => "PRINT_FAILED",
            Self::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            Self::ContentServer(_) => "CONTENT_SERVER_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error came out of the action pipeline.
    ///
    /// Pipeline failures are subject to the converter's partial-result and
    /// retry policy. Session errors raised by protocol calls mid-pipeline
    /// count as pipeline failures too.
    pub fn is_pipeline_failure(&self) -> bool {
        match self {
            Self::Session(_)
            | Self::Navigation(_)
            | Self::Script(_)
            | Self::Content(_)
            | Self::PageNotReady(_)
            | Self::Print(_)
            | Self::DeadlineExceeded(_) => true,

            Self::ContentServer(_) | Self::Configuration(_) | Self::Internal(_) => false,
        }
    }
}

/// Convenience conversion from [`String`] to [`RenderError::Configuration`].
///
/// ```rust
/// use html2pdf_service::RenderError;
///
/// let error: RenderError = "invalid configuration".to_string().into();
/// assert!(matches!(error, RenderError::Configuration(_)));
/// ```
impl From<String> for RenderError {
    fn from(msg: String) -> Self {
        RenderError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`RenderError::Configuration`].
impl From<&str> for RenderError {
    fn from(msg: &str) -> Self {
        RenderError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`RenderError`].
pub type Result<T> = std::result::Result<T, RenderError>;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let error: RenderError = "test error".into();
        match error {
            RenderError::Configuration(msg) => {
                assert_eq!(msg, "test error", "Error message should be preserved");
            }
            _ => panic!("Expected Configuration error variant"),
        }

        let error: RenderError = "another error".to_string().into();
        assert!(matches!(error, RenderError::Configuration(ref m) if m == "another error"));
    }

    #[test]
    fn test_error_display() {
        let error = RenderError::Session("chrome not found".to_string());
        assert_eq!(error.to_string(), "Browser session error: chrome not found");

        let error = RenderError::Content("no %s slot".to_string());
        assert_eq!(error.to_string(), "Content error: no %s slot");

        let error = RenderError::DeadlineExceeded(Duration::from_secs(20));
        assert_eq!(error.to_string(), "Deadline exceeded after 20s");
    }

    #[test]
    fn test_pipeline_failure_classification() {
        assert!(RenderError::Navigation(String::new()).is_pipeline_failure());
        assert!(RenderError::Script(String::new()).is_pipeline_failure());
        assert!(RenderError::PageNotReady(String::new()).is_pipeline_failure());
        assert!(RenderError::DeadlineExceeded(Duration::ZERO).is_pipeline_failure());

        assert!(!RenderError::ContentServer(String::new()).is_pipeline_failure());
        assert!(!RenderError::Internal(String::new()).is_pipeline_failure());
        assert!(!RenderError::Configuration(String::new()).is_pipeline_failure());
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            RenderError::Session(String::new()),
            RenderError::Navigation(String::new()),
            RenderError::Script(String::new()),
            RenderError::Content(String::new()),
            RenderError::PageNotReady(String::new()),
            RenderError::Print(String::new()),
            RenderError::DeadlineExceeded(Duration::ZERO),
            RenderError::ContentServer(String::new()),
            RenderError::Configuration(String::new()),
            RenderError::Internal(String::new()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + std::error::Error>() {}
        assert_send_sync::<RenderError>();
    }
}
