//! The ordered sequence of protocol actions behind one conversion.
//!
//! [`ActionPipeline::run`] walks [`Stage::ORDER`] against a
//! [`DevToolsSession`]. Before each stage the remaining [`Deadline`] budget
//! is checked and applied to the session as its protocol timeout, so a run
//! never outlives its deadline by more than one protocol round trip.
//!
//! | # | Stage | Failure |
//! |---|-------|---------|
//! | 1 | [`Stage::Navigate`] | `Navigation` |
//! | 2 | [`Stage::ArmLatch`] | `Session` |
//! | 3 | [`Stage::RevealElement`] | `Script` |
//! | 4 | [`Stage::ReplaceContent`] | `Content` |
//! | 5 | [`Stage::AwaitPageReady`] | `PageNotReady` / `DeadlineExceeded` |
//! | 6 | [`Stage::QueryWaitElement`] | `Script` |
//! | 7 | [`Stage::PrintToPdf`] | `Print` |
//!
//! The first failing stage aborts the run. Bytes written by the print stage
//! before it failed stay in [`PipelineRun::output`].

use std::time::{Duration, Instant};

use crate::config::ServiceConfig;
use crate::error::{RenderError, Result};
use crate::latch::PageReadyLatch;
use crate::service::ConversionRequest;
use crate::traits::{DevToolsSession, ListenerId};

// ============================================================================
// Deadline
// ============================================================================

/// Time budget for one pipeline attempt.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline of `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget left.
    ///
    /// # Errors
    ///
    /// [`RenderError::DeadlineExceeded`] once nothing is left.
    pub fn remaining(&self) -> Result<Duration> {
        let remaining = self.budget.saturating_sub(self.started.elapsed());
        if remaining.is_zero() {
            return Err(RenderError::DeadlineExceeded(self.budget));
        }
        Ok(remaining)
    }
}

// ============================================================================
// Stages
// ============================================================================

/// One step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Load the content server URL.
    Navigate,
    /// Arm the page-ready latch and listen for the load event.
    ArmLatch,
    /// Schedule the make-visible script.
    RevealElement,
    /// Swap the document for the request HTML.
    ReplaceContent,
    /// Block until the load event releases the latch.
    AwaitPageReady,
    /// Look up the wait element; zero matches are fine.
    QueryWaitElement,
    /// Render the PDF into the run's output buffer.
    PrintToPdf,
}

impl Stage {
    /// Execution order.
    pub const ORDER: [Stage; 7] = [
        Stage::Navigate,
        Stage::ArmLatch,
        Stage::RevealElement,
        Stage::ReplaceContent,
        Stage::AwaitPageReady,
        Stage::QueryWaitElement,
        Stage::PrintToPdf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Navigate => "navigate",
            Stage::ArmLatch => "arm-latch",
            Stage::RevealElement => "reveal-element",
            Stage::ReplaceContent => "replace-content",
            Stage::AwaitPageReady => "await-page-ready",
            Stage::QueryWaitElement => "query-wait-element",
            Stage::PrintToPdf => "print-to-pdf",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PipelineRun
// ============================================================================

/// Per-attempt state of one conversion.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    /// Content server URL the session navigates to.
    pub url: String,
    /// Document frame resolved by [`Stage::ReplaceContent`].
    pub frame_id: Option<String>,
    /// Selector queried by [`Stage::QueryWaitElement`].
    pub wait_selector: String,
    /// PDF bytes, complete or partial.
    pub output: Vec<u8>,
    /// Last stage that started.
    pub last_stage: Option<Stage>,
}

impl PipelineRun {
    pub fn new(url: impl Into<String>, wait_selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            wait_selector: wait_selector.into(),
            ..Default::default()
        }
    }

    /// Move the captured bytes out.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

// ============================================================================
// Content template
// ============================================================================

/// Build the document HTML from `content` and `css`.
///
/// With empty `css`, `content` is returned verbatim. Otherwise `content`
/// must hold exactly one `%s` slot, which receives `css`; `%%` renders a
/// literal `%` and any other `%` is copied as is.
///
/// # Errors
///
/// [`RenderError::Content`] when `css` is non-empty and the slot count is
/// not exactly one.
///
/// # Example
///
/// ```rust
/// use html2pdf_service::pipeline::render_content_template;
///
/// let html = render_content_template("<style>%s</style><p>100%%</p>", "p{}").unwrap();
/// assert_eq!(html, "<style>p{}</style><p>100%</p>");
/// ```
pub fn render_content_template(content: &str, css: &str) -> Result<String> {
    if css.is_empty() {
        return Ok(content.to_string());
    }

    let mut html = String::with_capacity(content.len() + css.len());
    let mut slots = 0usize;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            html.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                slots += 1;
                html.push_str(css);
            }
            Some('%') => {
                chars.next();
                html.push('%');
            }
            _ => html.push('%'),
        }
    }

    if slots != 1 {
        return Err(RenderError::Content(format!(
            "content must contain exactly one %s slot for the stylesheet, found {}",
            slots
        )));
    }
    Ok(html)
}

// ============================================================================
// ActionPipeline
// ============================================================================

/// Deregisters the load listener and cancels an unreleased latch on drop.
struct ListenerGuard<'a> {
    session: &'a dyn DevToolsSession,
    id: ListenerId,
    latch: PageReadyLatch,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.session.remove_load_listener(self.id);
        self.latch.cancel();
    }
}

/// The fixed conversion pipeline.
///
/// Stateless apart from the make-visible script settings; one instance
/// serves every request.
#[derive(Debug, Clone)]
pub struct ActionPipeline {
    reveal_selector: String,
    reveal_delay: Duration,
}

impl ActionPipeline {
    pub fn new(reveal_selector: impl Into<String>, reveal_delay: Duration) -> Self {
        Self {
            reveal_selector: reveal_selector.into(),
            reveal_delay,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.reveal_selector.clone(), config.reveal_delay)
    }

    /// Script that un-hides the reveal element after the configured delay.
    pub fn reveal_script(&self) -> String {
        // A JSON string is a valid JS string literal.
        let selector = serde_json::Value::from(self.reveal_selector.as_str()).to_string();
        format!(
            "setTimeout(function() {{ var el = document.querySelector({}); \
             if (el) {{ el.style.display = ''; }} }}, {})",
            selector,
            self.reveal_delay.as_millis()
        )
    }

    /// Execute every stage in order against `session`.
    ///
    /// # Errors
    ///
    /// The error of the first failing stage, or
    /// [`RenderError::DeadlineExceeded`] if the budget runs out between
    /// stages.
    pub fn run(
        &self,
        session: &dyn DevToolsSession,
        run: &mut PipelineRun,
        request: &ConversionRequest,
        deadline: &Deadline,
    ) -> Result<()> {
        let mut listener: Option<ListenerGuard<'_>> = None;

        for stage in Stage::ORDER {
            let remaining = deadline.remaining()?;
            session.set_timeout(remaining);
            run.last_stage = Some(stage);
            log::trace!("Pipeline stage {} ({:?} left)", stage, remaining);

            match stage {
                Stage::Navigate => {
                    session.navigate(&run.url)?;
                }
                Stage::ArmLatch => {
                    let latch = PageReadyLatch::new();
                    let trigger = latch.clone();
                    let id = session.add_load_listener(Box::new(move || {
                        trigger.release();
                    }))?;
                    listener = Some(ListenerGuard { session, id, latch });
                }
                Stage::RevealElement => {
                    session.evaluate(&self.reveal_script())?;
                }
                Stage::ReplaceContent => {
                    let html = render_content_template(&request.content, &request.content_css)?;
                    let frame_id = session.main_frame_id()?;
                    session.set_document_content(&frame_id, &html)?;
                    run.frame_id = Some(frame_id);
                }
                Stage::AwaitPageReady => {
                    let guard = listener.take().ok_or_else(|| {
                        RenderError::Internal("page-ready latch was never armed".to_string())
                    })?;
                    guard.latch.wait(remaining)?;
                    log::debug!("Page ready after {:?}", deadline.elapsed());
                }
                Stage::QueryWaitElement => {
                    let found = session.count_elements(&run.wait_selector)?;
                    log::debug!("Wait element {} matched {} node(s)", run.wait_selector, found);
                }
                Stage::PrintToPdf => {
                    session.print_to_pdf(&request.pdf_params(), &mut run.output)?;
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::{MOCK_PDF, MockSession, MockStep};

    fn pipeline() -> ActionPipeline {
        ActionPipeline::new("#hash_assinatura", Duration::from_secs(3))
    }

    fn run_for(request: &ConversionRequest) -> PipelineRun {
        PipelineRun::new("http://127.0.0.1:1/", request.wait_selector())
    }

    #[test]
    fn test_template_without_css_is_verbatim() {
        let content = "<p>50% off %s %d</p>";
        assert_eq!(render_content_template(content, "").unwrap(), content);
    }

    #[test]
    fn test_template_single_slot() {
        let html = render_content_template("<style>%s</style>", "body{margin:0}").unwrap();
        assert_eq!(html, "<style>body{margin:0}</style>");
    }

    #[test]
    fn test_template_percent_escapes() {
        let html = render_content_template("<style>%s</style>%% 5%d %", "x").unwrap();
        assert_eq!(html, "<style>x</style>% 5%d %");
    }

    #[test]
    fn test_template_slot_count_enforced() {
        for content in ["<p>no slot</p>", "%s and %s", "100%%s"] {
            let result = render_content_template(content, "p{}");
            assert!(
                matches!(result, Err(RenderError::Content(_))),
                "Expected ContentError for {:?}, got {:?}",
                content,
                result
            );
        }
    }

    #[test]
    fn test_template_css_is_not_reinterpreted() {
        let html = render_content_template("<style>%s</style>", "a::after{content:'%s'}").unwrap();
        assert_eq!(html, "<style>a::after{content:'%s'}</style>");
    }

    #[test]
    fn test_deadline_remaining() {
        let deadline = Deadline::new(Duration::from_secs(60));
        assert!(deadline.remaining().unwrap() <= Duration::from_secs(60));

        let spent = Deadline::new(Duration::ZERO);
        assert!(matches!(
            spent.remaining(),
            Err(RenderError::DeadlineExceeded(d)) if d.is_zero()
        ));
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ORDER.first(), Some(&Stage::Navigate));
        assert_eq!(Stage::ORDER.last(), Some(&Stage::PrintToPdf));
        assert_eq!(Stage::AwaitPageReady.to_string(), "await-page-ready");
    }

    #[test]
    fn test_reveal_script_escapes_selector() {
        let script = ActionPipeline::new("#a'b\"c", Duration::from_millis(1500)).reveal_script();
        assert!(script.contains(r##"querySelector("#a'b\"c")"##), "{}", script);
        assert!(script.ends_with(", 1500)"));
    }

    #[test]
    fn test_run_executes_stages_in_order() {
        let session = MockSession::new();
        let request = ConversionRequest::new("<p id='done'></p>", "done");
        let mut run = run_for(&request);

        pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_secs(5)))
            .unwrap();

        assert_eq!(
            session.steps(),
            vec![
                MockStep::Navigate,
                MockStep::Evaluate,
                MockStep::MainFrame,
                MockStep::SetContent,
                MockStep::CountElements,
                MockStep::Print,
            ]
        );
        assert_eq!(run.output, MOCK_PDF);
        assert_eq!(run.frame_id.as_deref(), Some("MOCK-FRAME"));
        assert_eq!(run.last_stage, Some(Stage::PrintToPdf));
        assert_eq!(session.arguments(MockStep::CountElements), vec!["#done"]);
        assert_eq!(session.listener_count(), 0, "Load listener must be deregistered");
    }

    #[test]
    fn test_run_applies_template() {
        let session = MockSession::new();
        let request = ConversionRequest::new("<style>%s</style>", "x").with_css("p{}");
        let mut run = run_for(&request);

        pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_secs(5)))
            .unwrap();

        assert_eq!(session.arguments(MockStep::SetContent), vec!["<style>p{}</style>"]);
    }

    #[test]
    fn test_run_aborts_on_script_error() {
        let session = MockSession::new().failing_at(MockStep::Evaluate, "ReferenceError");
        let request = ConversionRequest::new("<p></p>", "x");
        let mut run = run_for(&request);

        let err = pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_secs(5)))
            .unwrap_err();

        assert!(matches!(err, RenderError::Script(_)));
        assert_eq!(session.count(MockStep::SetContent), 0, "Later stages must not run");
        assert_eq!(session.listener_count(), 0);
        assert!(run.output.is_empty());
    }

    #[test]
    fn test_run_bad_template_is_content_error() {
        let session = MockSession::new();
        let request = ConversionRequest::new("<p>no slot</p>", "x").with_css("p{}");
        let mut run = run_for(&request);

        let err = pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_secs(5)))
            .unwrap_err();

        assert!(matches!(err, RenderError::Content(_)));
        assert_eq!(run.last_stage, Some(Stage::ReplaceContent));
    }

    #[test]
    fn test_run_without_load_event_hits_deadline() {
        let session = MockSession::new().without_load_event();
        let request = ConversionRequest::new("<p></p>", "x");
        let mut run = run_for(&request);

        let started = Instant::now();
        let err = pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_millis(100)))
            .unwrap_err();

        assert!(matches!(err, RenderError::DeadlineExceeded(_)), "{:?}", err);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(run.last_stage, Some(Stage::AwaitPageReady));
        assert_eq!(session.count(MockStep::Print), 0);
    }

    #[test]
    fn test_run_sets_remaining_budget_as_timeout() {
        let session = MockSession::new();
        let request = ConversionRequest::new("<p></p>", "x");
        let mut run = run_for(&request);

        pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_secs(5)))
            .unwrap();

        let timeout = session.last_timeout().unwrap();
        assert!(timeout <= Duration::from_secs(5));
        assert!(timeout > Duration::from_secs(4));
    }

    #[test]
    fn test_run_keeps_partial_print_bytes() {
        let session = MockSession::new().truncated_print(b"%PDF-1.4 partial".to_vec(), "closed");
        let request = ConversionRequest::new("<p></p>", "x");
        let mut run = run_for(&request);

        let err = pipeline()
            .run(&session, &mut run, &request, &Deadline::new(Duration::from_secs(5)))
            .unwrap_err();

        assert!(matches!(err, RenderError::Print(_)));
        assert_eq!(run.output, b"%PDF-1.4 partial");
    }
}
