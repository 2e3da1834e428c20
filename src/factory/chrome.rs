//! Chrome/Chromium session implementation.
//!
//! This module provides [`ChromeSessionFactory`], which launches one
//! headless Chrome process, and [`ChromeSession`], the
//! [`DevToolsSession`] backed by a single tab of that process.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_service::ChromeSessionFactory;
//!
//! // Auto-detect Chrome installation
//! let factory = ChromeSessionFactory::with_defaults();
//!
//! // Or specify custom path
//! let factory = ChromeSessionFactory::with_path("/usr/bin/google-chrome".to_string());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use headless_chrome::browser::tab::EventListener;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::SessionFactory;
use crate::error::{RenderError, Result};
use crate::traits::{DevToolsSession, Healthcheck, ListenerId, LoadListener, PdfParams};

/// The engine is shut down by `headless_chrome` after this long without
/// protocol traffic. The session is meant to live as long as the process.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Protocol timeout applied until the pipeline sets its own.
const DEFAULT_TAB_TIMEOUT: Duration = Duration::from_secs(20);

type SharedListener = dyn EventListener<Event> + Send + Sync;

/// Factory for launching headless Chrome sessions.
///
/// Supports both auto-detection and custom Chrome binary paths.
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and can be safely shared across threads.
pub struct ChromeSessionFactory {
    /// Function that generates the launch options.
    launch_options_fn: Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>,
}

impl ChromeSessionFactory {
    /// Create factory with a custom launch options function.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use html2pdf_service::{ChromeSessionFactory, create_chrome_options, RenderError};
    ///
    /// let factory = ChromeSessionFactory::new(|| {
    ///     create_chrome_options(Some("/custom/path"))
    ///         .map_err(|e| RenderError::Configuration(e.to_string()))
    /// });
    /// ```
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
        }
    }

    /// Create factory with auto-detected Chrome path.
    ///
    /// # Platform Detection
    ///
    /// The `headless_chrome` crate searches common installation paths:
    ///
    /// | Platform | Paths Searched |
    /// |----------|----------------|
    /// | Linux | `/usr/bin/google-chrome`, `/usr/bin/chromium`, etc. |
    /// | macOS | `/Applications/Google Chrome.app/...` |
    /// | Windows | `C:\Program Files\Google\Chrome\...` |
    pub fn with_defaults() -> Self {
        log::debug!("Creating ChromeSessionFactory with auto-detect");
        Self::new(|| {
            create_chrome_options(None).map_err(|e| RenderError::Configuration(e.to_string()))
        })
    }

    /// Create factory with a custom Chrome binary path.
    pub fn with_path(chrome_path: String) -> Self {
        log::debug!("Creating ChromeSessionFactory with custom path: {}", chrome_path);
        Self::new(move || {
            create_chrome_options(Some(&chrome_path))
                .map_err(|e| RenderError::Configuration(e.to_string()))
        })
    }

    /// Pick [`with_path`](Self::with_path) or
    /// [`with_defaults`](Self::with_defaults) from an optional path.
    pub fn from_path(chrome_path: Option<String>) -> Self {
        match chrome_path {
            Some(path) => Self::with_path(path),
            None => Self::with_defaults(),
        }
    }
}

impl SessionFactory for ChromeSessionFactory {
    /// Launch Chrome and open the tab the service will drive.
    ///
    /// # Errors
    ///
    /// * [`RenderError::Configuration`] if launch options generation fails.
    /// * [`RenderError::Session`] if Chrome fails to launch or open a tab.
    fn create(&self) -> Result<Arc<dyn DevToolsSession>> {
        log::trace!("ChromeSessionFactory::create() called");

        let options = (self.launch_options_fn)()?;

        log::debug!("Launching Chrome browser...");
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {}", e);
            RenderError::Session(e.to_string())
        })?;

        let tab = browser.new_tab().map_err(|e| {
            log::error!("❌ Failed to open session tab: {}", e);
            RenderError::Session(e.to_string())
        })?;
        tab.set_default_timeout(DEFAULT_TAB_TIMEOUT);

        log::info!("✅ Chrome session ready");
        Ok(Arc::new(ChromeSession::new(browser, tab)))
    }
}

/// A [`DevToolsSession`] bound to one Chrome tab.
///
/// Owns the [`Browser`], so the Chrome process lives as long as the session.
pub struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
    listeners: Mutex<HashMap<u64, Weak<SharedListener>>>,
    next_listener_id: AtomicU64,
}

impl ChromeSession {
    pub fn new(browser: Browser, tab: Arc<Tab>) -> Self {
        Self {
            browser,
            tab,
            listeners: Mutex::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// The underlying tab, for callers that need raw protocol access.
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }
}

impl std::fmt::Debug for ChromeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeSession")
            .field("target_id", self.tab.get_target_id())
            .finish_non_exhaustive()
    }
}

impl Healthcheck for ChromeSession {
    fn ping(&self) -> Result<()> {
        log::trace!("Pinging Chrome session...");
        self.browser.get_version().map_err(|e| {
            log::error!("❌ Chrome session ping failed: {}", e);
            RenderError::Session(e.to_string())
        })?;
        log::trace!("✅ Chrome session ping successful");
        Ok(())
    }
}

impl DevToolsSession for ChromeSession {
    fn set_timeout(&self, timeout: Duration) {
        self.tab.set_default_timeout(timeout);
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| RenderError::Navigation(format!("{}: {}", url, e)))
    }

    fn add_load_listener(&self, listener: LoadListener) -> Result<ListenerId> {
        let handler: Arc<SharedListener> = Arc::new(move |event: &Event| {
            if let Event::PageLoadEventFired(_) = event {
                listener();
            }
        });

        let weak = self
            .tab
            .add_event_listener(handler)
            .map_err(|e| RenderError::Session(e.to_string()))?;

        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, weak);

        Ok(ListenerId(id))
    }

    fn remove_load_listener(&self, id: ListenerId) {
        let weak = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id.0);

        if let Some(weak) = weak {
            if let Err(e) = self.tab.remove_event_listener(&weak) {
                log::warn!("⚠️ Failed to remove load listener {}: {}", id.0, e);
            }
        }
    }

    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>> {
        let remote = self
            .tab
            .evaluate(&guarded_expression(expression), false)
            .map_err(|e| RenderError::Script(e.to_string()))?;

        match remote.value {
            Some(serde_json::Value::String(outcome)) => parse_outcome(&outcome),
            other => Err(RenderError::Script(format!(
                "unexpected evaluation result: {:?}",
                other
            ))),
        }
    }

    fn main_frame_id(&self) -> Result<String> {
        let tree = self
            .tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| RenderError::Content(format!("frame tree unavailable: {}", e)))?;
        Ok(tree.frame_tree.frame.id)
    }

    fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()> {
        self.tab
            .call_method(Page::SetDocumentContent {
                frame_id: frame_id.to_string(),
                html: html.to_string(),
            })
            .map(|_| ())
            .map_err(|e| RenderError::Content(format!("setDocumentContent failed: {}", e)))
    }

    fn count_elements(&self, selector: &str) -> Result<usize> {
        let selector = serde_json::to_string(selector)
            .map_err(|e| RenderError::Script(e.to_string()))?;
        let value = self.evaluate(&format!("document.querySelectorAll({}).length", selector))?;

        value
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .ok_or_else(|| RenderError::Script("element count was not a number".to_string()))
    }

    fn print_to_pdf(&self, params: &PdfParams, out: &mut Vec<u8>) -> Result<()> {
        let options = PrintToPdfOptions {
            landscape: Some(params.landscape),
            display_header_footer: Some(params.display_header_footer),
            print_background: Some(params.print_background),
            scale: Some(params.scale),
            paper_width: Some(params.paper_width),
            paper_height: Some(params.paper_height),
            margin_top: Some(params.margin_top),
            margin_bottom: Some(params.margin_bottom),
            margin_left: Some(params.margin_left),
            margin_right: Some(params.margin_right),
            header_template: Some(params.header_template.clone()),
            footer_template: Some(params.footer_template.clone()),
            prefer_css_page_size: Some(params.prefer_css_page_size),
            ..Default::default()
        };

        let pdf = self
            .tab
            .print_to_pdf(Some(options))
            .map_err(|e| RenderError::Print(e.to_string()))?;
        out.extend_from_slice(&pdf);
        Ok(())
    }
}

/// Wrap `expression` so a thrown exception comes back as data.
///
/// `Runtime.evaluate` reports exceptions out of band, and `headless_chrome`
/// drops that report, so the expression is evaluated inside a try/catch and
/// the outcome serialized to a JSON string.
fn guarded_expression(expression: &str) -> String {
    format!(
        "(() => {{ try {{ return JSON.stringify({{ ok: true, value: ({}) }}); }} \
         catch (e) {{ return JSON.stringify({{ ok: false, error: String(e) }}); }} }})()",
        expression
    )
}

fn parse_outcome(outcome: &str) -> Result<Option<serde_json::Value>> {
    let outcome: serde_json::Value = serde_json::from_str(outcome)
        .map_err(|e| RenderError::Script(format!("malformed evaluation result: {}", e)))?;

    if outcome.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        return Ok(outcome.get("value").cloned());
    }

    let message = outcome
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown exception");
    Err(RenderError::Script(message.to_string()))
}

/// Create Chrome launch options with an optional custom path.
///
/// # Chrome Flags Applied
///
/// ## Memory and Performance
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm (container-friendly)
/// - `--disable-crash-reporter` - No crash reporting
///
/// ## GPU
/// - `--disable-gpu`
/// - `--disable-software-rasterizer`
///
/// ## Disabled Features
/// - `--disable-extensions`
/// - `--disable-sync`
/// - `--disable-default-apps`
///
/// ## Stability
/// - `--disable-background-timer-throttling` - The make-visible script relies on `setTimeout`
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-renderer-backgrounding`
/// - `--disable-hang-monitor`
/// - `--disable-ipc-flooding-protection`
///
/// The idle timeout is raised so the single session survives quiet periods.
pub fn create_chrome_options(
    chrome_path: Option<&str>,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    match chrome_path {
        Some(path) => log::debug!("Creating Chrome options with custom path: {}", path),
        None => log::debug!("Creating Chrome options (auto-detect browser)"),
    }

    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = chrome_path {
        builder.path(Some(path.to_string().into()));
    }

    builder
        .headless(true)
        .sandbox(false)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .disable_default_args(true)
        .args(vec![
            // ===== Memory and Performance =====
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            // ===== GPU =====
            "--disable-gpu".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            // ===== Disable Unnecessary Features =====
            "--disable-extensions".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),
            "--no-first-run".as_ref(),
            // ===== Timers must fire in a headless page =====
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            // ===== CDP Stability =====
            "--disable-hang-monitor".as_ref(),
            "--disable-ipc-flooding-protection".as_ref(),
            "--enable-automation".as_ref(),
        ])
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            let path_msg = chrome_path.unwrap_or("auto-detect");
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                path_msg,
                e
            );
            e.into()
        })
}

// ============================================================================
// Unit Tests
// ============================================================================
