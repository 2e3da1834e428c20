//! The conversion orchestrator.
//!
//! [`Converter::convert`] serializes conversions over the shared session,
//! runs the [`ActionPipeline`] under a [`Deadline`] and applies the
//! fallback policy:
//!
//! ```text
//!   attempt 1 ── ok ──────────────────────────▶ full PDF
//!      │
//!      └─ err ── bytes captured? ── yes ──────▶ partial PDF
//!                      │
//!                      no
//!                      ▼
//!                attempt 2 (fresh deadline) ──▶ whatever it captured,
//!                                               error logged, not raised
//! ```
//!
//! Protocol calls block, so every attempt runs on a
//! `tokio::task::spawn_blocking` worker. The worker owns the session lock
//! and releases it only when it returns, even if the caller stopped waiting
//! for the conversion. The deadline is enforced cooperatively inside the
//! worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::ServiceConfig;
use crate::correlation;
use crate::content_server::{ContentServer, ServedContent};
use crate::error::{RenderError, Result};
use crate::pipeline::{ActionPipeline, Deadline, PipelineRun};
use crate::stats::{ConversionCounters, ConversionStats};
use crate::traits::DevToolsSession;

use super::types::{ConversionRequest, ConversionResult};

/// How the fallback policy resolved one conversion.
#[derive(Debug)]
enum Outcome {
    /// First attempt printed the whole document.
    Completed(Vec<u8>),
    /// First attempt failed after capturing bytes.
    Partial(Vec<u8>),
    /// First attempt captured nothing; the retry's result.
    Retried {
        content: Vec<u8>,
        first: RenderError,
        retry: Option<RenderError>,
    },
    /// First attempt hit an error a retry cannot fix.
    Aborted(RenderError),
}

/// Serializing front of the shared browser session.
///
/// # Thread Safety
///
/// `Converter` is `Send + Sync`; share it with `Arc`. Concurrent calls to
/// [`convert`](Self::convert) queue on an internal async mutex that guards
/// the session handle itself. Dropping a `convert` future does not release
/// the session early: the running pipeline keeps it until it finishes.
///
/// # Example
///
/// ```rust,ignore
/// use html2pdf_service::prelude::*;
///
/// let converter = Converter::new(manager.session(), &ServiceConfig::default());
/// let result = converter
///     .convert(ConversionRequest::new("<p id='done'>Hello</p>", "done"))
///     .await?;
///
/// if result.is_empty() {
///     eprintln!("conversion failed: {:?}", result.cause);
/// }
/// ```
pub struct Converter {
    session: Arc<Mutex<Arc<dyn DevToolsSession>>>,
    pipeline: ActionPipeline,
    timeout: Duration,
    counters: ConversionCounters,
}

impl Converter {
    /// Create a converter driving `session`.
    pub fn new(session: Arc<dyn DevToolsSession>, config: &ServiceConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            pipeline: ActionPipeline::from_config(config),
            timeout: config.conversion_timeout,
            counters: ConversionCounters::default(),
        }
    }

    /// Deadline applied to each pipeline attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Snapshot of conversion counters.
    pub fn stats(&self) -> ConversionStats {
        self.counters.snapshot()
    }

    /// Convert one request into PDF bytes.
    ///
    /// Pipeline failures never surface as `Err`: they yield partial bytes or
    /// an empty [`ConversionResult`] whose `cause` holds the last error.
    ///
    /// # Errors
    ///
    /// - [`RenderError::ContentServer`] if the content server cannot start
    /// - [`RenderError::Internal`] if the pipeline worker panics
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let guard = Arc::clone(&self.session).lock_owned().await;
        let started = Instant::now();
        self.counters.started();
        log::info!("Html2Pdf conversion started (wait element #{})", request.wait_element_id);

        let request = request.normalized();
        let server = ContentServer::serve(ServedContent::css(&request.content_css)).await?;
        let url = server.url().to_string();

        let pipeline = self.pipeline.clone();
        let timeout = self.timeout;
        let correlation_id = correlation::current();

        // The guard moves into the worker and drops when it returns.
        let outcome = tokio::task::spawn_blocking(move || {
            let session: &dyn DevToolsSession = &**guard;
            correlation::in_thread(correlation_id, || {
                Self::run_with_fallback(session, &pipeline, &request, &url, timeout)
            })
        })
        .await;

        server.shutdown().await;

        let outcome = outcome.map_err(|e| {
            log::error!("❌ Pipeline worker failed: {}", e);
            RenderError::Internal(format!("pipeline worker failed: {}", e))
        })?;

        let result = self.record(outcome);
        log::info!(
            "Html2Pdf conversion finished in {:?} ({} bytes)",
            started.elapsed(),
            result.len()
        );

        Ok(result)
    }

    fn run_with_fallback(
        session: &dyn DevToolsSession,
        pipeline: &ActionPipeline,
        request: &ConversionRequest,
        url: &str,
        timeout: Duration,
    ) -> Outcome {
        if let Err(e) = session.ping() {
            log::warn!("⚠️ Browser session health check failed, proceeding: {}", e);
        }

        let mut run = PipelineRun::new(url, request.wait_selector());
        let first = match pipeline.run(session, &mut run, request, &Deadline::new(timeout)) {
            Ok(()) => return Outcome::Completed(run.take_output()),
            Err(e) => e,
        };

        if !run.output.is_empty() {
            log::warn!(
                "⚠️ Pipeline failed at {:?} after capturing {} bytes, returning partial PDF: {}",
                run.last_stage,
                run.output.len(),
                first
            );
            return Outcome::Partial(run.take_output());
        }

        if !first.is_pipeline_failure() {
            log::error!("❌ Pipeline aborted at {:?}, not retrying: {}", run.last_stage, first);
            return Outcome::Aborted(first);
        }

        log::warn!(
            "⚠️ Pipeline failed at {:?}, retrying once: {}",
            run.last_stage,
            first
        );

        let mut retry_run = PipelineRun::new(url, request.wait_selector());
        let retry = pipeline
            .run(session, &mut retry_run, request, &Deadline::new(timeout))
            .err();

        if let Some(e) = &retry {
            log::error!(
                "❌ Retry failed at {:?} with {} bytes captured: {}",
                retry_run.last_stage,
                retry_run.output.len(),
                e
            );
        }

        Outcome::Retried {
            content: retry_run.take_output(),
            first,
            retry,
        }
    }

    fn record(&self, outcome: Outcome) -> ConversionResult {
        match outcome {
            Outcome::Completed(content) => {
                self.counters.completed();
                ConversionResult::success(content)
            }
            Outcome::Partial(content) => {
                self.counters.partial();
                ConversionResult::success(content)
            }
            Outcome::Retried {
                content,
                first,
                retry,
            } => {
                self.counters.retried();
                if content.is_empty() {
                    self.counters.empty();
                    log::error!("❌ Conversion produced no bytes after retry");
                    ConversionResult::empty(Some(retry.unwrap_or(first)))
                } else {
                    ConversionResult::success(content)
                }
            }
            Outcome::Aborted(cause) => {
                self.counters.empty();
                ConversionResult::empty(Some(cause))
            }
        }
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("pipeline", &self.pipeline)
            .field("timeout", &self.timeout)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfigBuilder;
    use crate::factory::mock::{MOCK_PDF, MockSession, MockStep};

    fn converter(session: Arc<MockSession>, timeout: Duration) -> Converter {
        let config = ServiceConfigBuilder::new()
            .conversion_timeout(timeout)
            .build()
            .unwrap();
        Converter::new(session, &config)
    }

    #[tokio::test]
    async fn test_convert_success() {
        let session = Arc::new(MockSession::new());
        let converter = converter(Arc::clone(&session), Duration::from_secs(5));

        let result = converter
            .convert(ConversionRequest::new("<p id='x'></p>", "x"))
            .await
            .unwrap();

        assert_eq!(result.content, MOCK_PDF);
        assert!(result.cause.is_none());
        assert_eq!(session.ping_count(), 1, "Health check runs before the pipeline");
        assert_eq!(converter.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_failed_ping_does_not_block_conversion() {
        let session = Arc::new(MockSession::new().with_failed_ping());
        let converter = converter(session, Duration::from_secs(5));

        let result = converter
            .convert(ConversionRequest::new("<p></p>", "x"))
            .await
            .unwrap();
        assert!(!result.is_empty());
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let session = Arc::new(MockSession::new().failing_first(MockStep::Navigate, 1, "aborted"));
        let converter = converter(Arc::clone(&session), Duration::from_secs(5));

        let result = converter
            .convert(ConversionRequest::new("<p></p>", "x"))
            .await
            .unwrap();

        assert_eq!(result.content, MOCK_PDF);
        assert!(result.cause.is_none());
        assert_eq!(session.count(MockStep::Navigate), 2);

        let stats = converter.stats();
        assert_eq!(stats.retried, 1);
        assert_eq!(stats.empty, 0);
    }

    #[tokio::test]
    async fn test_partial_bytes_skip_retry() {
        let session = Arc::new(
            MockSession::new().truncated_print(b"%PDF-1.4 half".to_vec(), "connection reset"),
        );
        let converter = converter(Arc::clone(&session), Duration::from_secs(5));

        let result = converter
            .convert(ConversionRequest::new("<p></p>", "x"))
            .await
            .unwrap();

        assert_eq!(result.content, b"%PDF-1.4 half");
        assert!(result.cause.is_none());
        assert_eq!(session.count(MockStep::Navigate), 1, "Partial bytes must not trigger a retry");
        assert_eq!(converter.stats().partial, 1);
    }

    #[tokio::test]
    async fn test_total_failure_is_empty_with_cause() {
        let session = Arc::new(MockSession::new().failing_at(MockStep::Print, "printing failed"));
        let converter = converter(Arc::clone(&session), Duration::from_secs(5));

        let result = converter
            .convert(ConversionRequest::new("<p></p>", "x"))
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(matches!(result.cause, Some(RenderError::Print(_))));
        assert_eq!(session.count(MockStep::Print), 2, "Exactly one retry");
        assert_eq!(converter.stats().empty, 1);
    }

    #[tokio::test]
    async fn test_abandoned_conversion_keeps_session_locked() {
        let session = Arc::new(MockSession::new().with_step_delay(Duration::from_millis(100)));
        let converter = converter(Arc::clone(&session), Duration::from_secs(5));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(150),
            converter.convert(ConversionRequest::new("<p id='a'></p>", "a")),
        )
        .await;
        assert!(abandoned.is_err(), "First conversion should still be running");

        let result = converter
            .convert(ConversionRequest::new("<p id='b'></p>", "b"))
            .await
            .unwrap();

        assert_eq!(result.content, MOCK_PDF);
        assert_eq!(session.max_concurrent_calls(), 1, "Pipelines overlapped");

        // The abandoned pipeline ran to the end before the next one started
        let steps = session.steps();
        assert_eq!(steps.len(), 12);
        assert_eq!(steps[5], MockStep::Print);
        assert_eq!(steps[6], MockStep::Navigate);
        assert_eq!(session.arguments(MockStep::CountElements), vec!["#a", "#b"]);
    }

    #[tokio::test]
    async fn test_text_fields_normalized_before_use() {
        let session = Arc::new(MockSession::new());
        let converter = converter(Arc::clone(&session), Duration::from_secs(5));

        let request = ConversionRequest::new("<p>\r\nline</p>", "x").with_footer("f\r\n");
        converter.convert(request).await.unwrap();

        assert_eq!(session.arguments(MockStep::SetContent), vec!["<p>\nline</p>"]);
        assert_eq!(session.pdf_params()[0].footer_template, "f\n");
    }
}
