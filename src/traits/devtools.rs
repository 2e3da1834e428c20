//! The DevTools protocol surface used by the conversion pipeline.
//!
//! [`DevToolsSession`] narrows the Chrome DevTools Protocol down to the
//! actions one conversion needs. Every method is blocking and is bounded by
//! the timeout last set with [`DevToolsSession::set_timeout`].

use std::time::Duration;

use crate::error::Result;
use crate::traits::Healthcheck;

/// Callback invoked when the page fires its load-complete event.
///
/// Runs on the protocol event thread, so it must be cheap and must not
/// call back into the session.
pub type LoadListener = Box<dyn Fn() + Send + Sync>;

/// Handle for a registered [`LoadListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Options for `Page.printToPDF`.
///
/// Lengths are in inches. Built from a
/// [`ConversionRequest`](crate::ConversionRequest) by
/// [`ConversionRequest::pdf_params`](crate::ConversionRequest::pdf_params).
#[derive(Debug, Clone, PartialEq)]
pub struct PdfParams {
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub display_header_footer: bool,
    pub landscape: bool,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub paper_width: f64,
    pub paper_height: f64,
    pub scale: f64,
    pub header_template: String,
    pub footer_template: String,
}

/// A live connection to one page of the rendering engine.
///
/// The session is shared for the whole process lifetime but is only ever
/// driven by one pipeline at a time; the converter's lock guarantees that.
///
/// # Implementors
///
/// - [`ChromeSession`](crate::ChromeSession) - a tab of a headless Chrome
/// - `MockSession` - scripted behavior for tests (`test-utils` feature)
pub trait DevToolsSession: Healthcheck {
    /// Apply a protocol timeout to every call that follows.
    fn set_timeout(&self, timeout: Duration);

    /// Navigate to `url` and wait for the navigation to settle.
    ///
    /// # Errors
    ///
    /// [`RenderError::Navigation`](crate::RenderError::Navigation)
    fn navigate(&self, url: &str) -> Result<()>;

    /// Register a listener for the page load-complete event.
    fn add_load_listener(&self, listener: LoadListener) -> Result<ListenerId>;

    /// Deregister a listener. Unknown ids are ignored.
    fn remove_load_listener(&self, id: ListenerId);

    /// Evaluate a JavaScript expression and return its JSON value.
    ///
    /// # Errors
    ///
    /// [`RenderError::Script`](crate::RenderError::Script) when evaluation
    /// fails at the protocol level.
    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>>;

    /// Identifier of the top-level document frame.
    fn main_frame_id(&self) -> Result<String>;

    /// Replace the whole document of `frame_id` with `html`.
    fn set_document_content(&self, frame_id: &str, html: &str) -> Result<()>;

    /// Count the elements matching a CSS selector. Zero is not an error.
    fn count_elements(&self, selector: &str) -> Result<usize>;

    /// Print the current page, appending the PDF bytes to `out`.
    ///
    /// On failure `out` keeps whatever was written before the error.
    fn print_to_pdf(&self, params: &PdfParams, out: &mut Vec<u8>) -> Result<()>;
}
