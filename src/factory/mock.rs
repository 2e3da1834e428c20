//! Scripted session and factory for testing.
//!
//! This module provides [`MockSession`], a [`DevToolsSession`] whose
//! behavior is configured up front, and [`MockSessionFactory`] to hand it
//! to a [`BrowserSessionManager`](crate::BrowserSessionManager). Neither
//! needs Chrome installed.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_service::factory::mock::{MockSession, MockStep};
//!
//! // Print writes half a document, then fails
//! let session = MockSession::new().truncated_print(b"%PDF-1.4 par".to_vec(), "socket closed");
//!
//! // Navigation fails on the first attempt only
//! let session = MockSession::new().failing_first(MockStep::Navigate, 1, "net::ERR_ABORTED");
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use super::SessionFactory;
use crate::error::{RenderError, Result};
use crate::traits::{DevToolsSession, Healthcheck, ListenerId, LoadListener, PdfParams};

/// Default bytes produced by [`MockSession`]'s print step.
pub const MOCK_PDF: &[u8] = b"%PDF-1.4 mock";

/// Protocol actions a [`MockSession`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStep {
    Navigate,
    Evaluate,
    MainFrame,
    SetContent,
    CountElements,
    Print,
}

impl MockStep {
    fn error(self, message: String) -> RenderError {
        match self {
            MockStep::Navigate => RenderError::Navigation(message),
            MockStep::Evaluate | MockStep::CountElements => RenderError::Script(message),
            MockStep::MainFrame | MockStep::SetContent => RenderError::Content(message),
            MockStep::Print => RenderError::Print(message),
        }
    }
}

/// One recorded protocol call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub step: MockStep,
    /// URL, script, selector or document, depending on the step.
    pub argument: String,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Clone)]
struct Failure {
    message: String,
    /// `None` fails every call.
    remaining: Option<usize>,
}

/// Body and content type the mock received when it fetched a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub content_type: String,
    pub body: String,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    failures: HashMap<MockStep, Failure>,
    listeners: HashMap<u64, Arc<LoadListener>>,
    fetched: Vec<FetchedContent>,
    pdf_params: Vec<PdfParams>,
    timeout: Option<Duration>,
}

/// Scripted [`DevToolsSession`] for tests.
///
/// By default every step succeeds, `set_document_content` fires the load
/// listeners, and print yields [`MOCK_PDF`]. Builder methods change that.
///
/// # Thread Safety
///
/// All state sits behind a mutex; overlapping calls are detected and
/// reported by [`max_concurrent_calls`](Self::max_concurrent_calls).
pub struct MockSession {
    pdf: Vec<u8>,
    truncated: Option<(Vec<u8>, String)>,
    fire_load_event: bool,
    step_delay: Duration,
    fetch_on_navigate: bool,
    ping_fails: AtomicBool,
    state: Mutex<MockState>,
    next_listener_id: AtomicU64,
    in_call: AtomicUsize,
    max_in_call: AtomicUsize,
    pings: AtomicUsize,
}

impl MockSession {
    /// Create a session where every step succeeds.
    pub fn new() -> Self {
        Self {
            pdf: MOCK_PDF.to_vec(),
            truncated: None,
            fire_load_event: true,
            step_delay: Duration::ZERO,
            fetch_on_navigate: false,
            ping_fails: AtomicBool::new(false),
            state: Mutex::new(MockState::default()),
            next_listener_id: AtomicU64::new(1),
            in_call: AtomicUsize::new(0),
            max_in_call: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
        }
    }

    /// Bytes produced by a successful print.
    pub fn with_pdf(mut self, pdf: impl Into<Vec<u8>>) -> Self {
        self.pdf = pdf.into();
        self
    }

    /// Fail every call of `step`.
    pub fn failing_at<S: Into<String>>(self, step: MockStep, message: S) -> Self {
        self.set_failure(step, message.into(), None);
        self
    }

    /// Fail the first `times` calls of `step`, then succeed.
    pub fn failing_first<S: Into<String>>(self, step: MockStep, times: usize, message: S) -> Self {
        self.set_failure(step, message.into(), Some(times));
        self
    }

    /// Never fire the load-complete event.
    pub fn without_load_event(mut self) -> Self {
        self.fire_load_event = false;
        self
    }

    /// Make every protocol call take `delay`.
    ///
    /// A call whose delay exceeds the current session timeout sleeps for
    /// the timeout and then fails, like a real protocol call would.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Print writes `bytes` and then fails with `message`.
    pub fn truncated_print<S: Into<String>>(mut self, bytes: Vec<u8>, message: S) -> Self {
        self.truncated = Some((bytes, message.into()));
        self
    }

    /// Fetch the navigation URL over HTTP and record the body.
    pub fn fetching_content(mut self) -> Self {
        self.fetch_on_navigate = true;
        self
    }

    /// Make [`Healthcheck::ping`] fail.
    pub fn with_failed_ping(self) -> Self {
        self.ping_fails.store(true, Ordering::SeqCst);
        self
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Steps of all recorded calls, in order.
    pub fn steps(&self) -> Vec<MockStep> {
        self.lock().calls.iter().map(|c| c.step).collect()
    }

    /// Number of calls of `step`.
    pub fn count(&self, step: MockStep) -> usize {
        self.lock().calls.iter().filter(|c| c.step == step).count()
    }

    /// Arguments of every call of `step`.
    pub fn arguments(&self, step: MockStep) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.step == step)
            .map(|c| c.argument.clone())
            .collect()
    }

    /// Bodies fetched by [`fetching_content`](Self::fetching_content).
    pub fn fetched_bodies(&self) -> Vec<String> {
        self.lock().fetched.iter().map(|f| f.body.clone()).collect()
    }

    /// Everything fetched by [`fetching_content`](Self::fetching_content).
    pub fn fetched(&self) -> Vec<FetchedContent> {
        self.lock().fetched.clone()
    }

    /// Print options of every print call.
    pub fn pdf_params(&self) -> Vec<PdfParams> {
        self.lock().pdf_params.clone()
    }

    /// Last timeout applied with `set_timeout`.
    pub fn last_timeout(&self) -> Option<Duration> {
        self.lock().timeout
    }

    /// Number of load listeners still registered.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Highest number of protocol calls observed in flight at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_call.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_failure(&self, step: MockStep, message: String, remaining: Option<usize>) {
        self.lock()
            .failures
            .insert(step, Failure { message, remaining });
    }

    /// Run one protocol call: track overlap, apply delay and failures,
    /// record the call.
    fn call<T>(&self, step: MockStep, argument: &str, body: impl FnOnce() -> Result<T>) -> Result<T> {
        let now_in_call = self.in_call.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_call.fetch_max(now_in_call, Ordering::SeqCst);
        let started = Instant::now();

        let result = self
            .delay(step)
            .and_then(|_| self.injected_failure(step))
            .and_then(|_| body());

        self.in_call.fetch_sub(1, Ordering::SeqCst);
        self.lock().calls.push(MockCall {
            step,
            argument: argument.to_string(),
            started,
            finished: Instant::now(),
        });
        result
    }

    fn delay(&self, step: MockStep) -> Result<()> {
        if self.step_delay.is_zero() {
            return Ok(());
        }
        let timeout = self.lock().timeout;
        match timeout {
            Some(timeout) if timeout < self.step_delay => {
                thread::sleep(timeout);
                Err(step.error(format!("timed out after {:?}", timeout)))
            }
            _ => {
                thread::sleep(self.step_delay);
                Ok(())
            }
        }
    }

    fn injected_failure(&self, step: MockStep) -> Result<()> {
        let mut state = self.lock();
        let Some(failure) = state.failures.get_mut(&step) else {
            return Ok(());
        };

        match failure.remaining {
            None => Err(step.error(failure.message.clone())),
            Some(0) => Ok(()),
            Some(ref mut n) => {
                *n -= 1;
                Err(step.error(failure.message.clone()))
            }
        }
    }

    fn fire_load_listeners(&self) {
        // Listeners run outside the state lock, like protocol event callbacks.
        let listeners: Vec<Arc<LoadListener>> = self.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    /// GET `url` and keep the body and content type.
    ///
    /// Uses the blocking client, so it must not run on an async worker.
    fn fetch(url: &str) -> Result<FetchedContent> {
        let response = reqwest::blocking::get(url)
            .map_err(|e| RenderError::Navigation(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Navigation(format!("GET {url}: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .text()
            .map_err(|e| RenderError::Navigation(format!("GET {url}: {e}")))?;

        Ok(FetchedContent { content_type, body })
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("pdf_len", &self.pdf.len())
            .field("fire_load_event", &self.fire_load_event)
            .field("step_delay", &self.step_delay)
            .field("calls", &self.lock().calls.len())
            .finish()
    }
}

impl Healthcheck for MockSession {
    fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.ping_fails.load(Ordering::SeqCst) {
            return Err(RenderError::Session("mock ping failure".to_string()));
        }
        Ok(())
    }
}

impl DevToolsSession for MockSession {
    fn set_timeout(&self, timeout: Duration) {
        self.lock().timeout = Some(timeout);
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.call(MockStep::Navigate, url, || {
            if self.fetch_on_navigate {
                let fetched = Self::fetch(url)?;
                self.lock().fetched.push(fetched);
            }
            Ok(())
        })
    }

    fn add_load_listener(&self, listener: LoadListener) -> Result<ListenerId> {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.lock().listeners.insert(id, Arc::new(listener));
        Ok(ListenerId(id))
    }

    fn remove_load_listener(&self, id: ListenerId) {
        self.lock().listeners.remove(&id.0);
    }

    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>> {
        self.call(MockStep::Evaluate, expression, || Ok(Some(serde_json::json!(1))))
    }

    fn main_frame_id(&self) -> Result<String> {
        self.call(MockStep::MainFrame, "", || Ok("MOCK-FRAME".to_string()))
    }

    fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()> {
        let _ = frame_id;
        self.call(MockStep::SetContent, html, || Ok(()))?;
        if self.fire_load_event {
            self.fire_load_listeners();
        }
        Ok(())
    }

    fn count_elements(&self, selector: &str) -> Result<usize> {
        self.call(MockStep::CountElements, selector, || Ok(0))
    }

    fn print_to_pdf(&self, params: &PdfParams, out: &mut Vec<u8>) -> Result<()> {
        self.lock().pdf_params.push(params.clone());
        self.call(MockStep::Print, "", || {
            if let Some((bytes, message)) = &self.truncated {
                out.extend_from_slice(bytes);
                return Err(RenderError::Print(message.clone()));
            }
            out.extend_from_slice(&self.pdf);
            Ok(())
        })
    }
}

/// Factory handing out one shared [`MockSession`].
///
/// # Example
///
/// ```rust,ignore
/// use html2pdf_service::factory::mock::{MockSession, MockSessionFactory};
/// use std::sync::Arc;
///
/// let session = Arc::new(MockSession::new());
/// let factory = Arc::new(MockSessionFactory::new(Arc::clone(&session)));
/// let manager = BrowserSessionManager::start(factory.clone()).await?;
/// assert_eq!(factory.creation_count(), 1);
/// ```
pub struct MockSessionFactory {
    session: Option<Arc<MockSession>>,
    error_message: String,
    creation_count: Arc<AtomicUsize>,
}

impl MockSessionFactory {
    /// Factory that returns `session` on every call.
    pub fn new(session: Arc<MockSession>) -> Self {
        Self {
            session: Some(session),
            error_message: String::new(),
            creation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Factory that always fails with the given message.
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self {
            session: None,
            error_message: message.into(),
            creation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of creation attempts.
    pub fn creation_count(&self) -> usize {
        self.creation_count.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockSessionFactory {
    fn create(&self) -> Result<Arc<dyn DevToolsSession>> {
        self.creation_count.fetch_add(1, Ordering::SeqCst);
        match &self.session {
            Some(session) => Ok(Arc::clone(session) as Arc<dyn DevToolsSession>),
            None => Err(RenderError::Session(self.error_message.clone())),
        }
    }
}

impl std::fmt::Debug for MockSessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSessionFactory")
            .field("fails", &self.session.is_none())
            .field("error_message", &self.error_message)
            .field("creation_count", &self.creation_count())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
