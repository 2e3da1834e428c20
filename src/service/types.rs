//! Shared types for the conversion service.
//!
//! This module provides the framework-agnostic API contract: the wire
//! request, its validated domain form, the conversion result and the JSON
//! envelope every response is wrapped in.
//!
//! # Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`HtmlRequest`] | Wire body of `POST /v1/html2pdf`, every field optional |
//! | [`ConversionRequest`] | Validated request with defaults filled in |
//! | [`ValidationError`] | Missing required field |
//! | [`ConversionResult`] | Rendered bytes, possibly partial or empty |
//! | [`BaseResponse`] | `{message, success, code, errors, result}` envelope |
//! | [`HealthResponse`] | Health check response |
//!
//! # Usage
//!
//! ```rust
//! use html2pdf_service::service::HtmlRequest;
//!
//! let request: HtmlRequest = serde_json::from_str(
//!     r#"{"content": "<p id='x'>hi</p>", "waitElementId": "x", "landscape": true}"#,
//! ).unwrap();
//!
//! let request = request.into_conversion_request().unwrap();
//! assert!(request.landscape);
//! assert_eq!(request.margin_top, 1.0);
//! assert_eq!(request.scale, 0.57);
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::traits::PdfParams;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_PRINT_BACKGROUND: bool = false;
pub const DEFAULT_PREFER_CSS_PAGE_SIZE: bool = false;
pub const DEFAULT_DISPLAY_HEADER_FOOTER: bool = true;
pub const DEFAULT_LANDSCAPE: bool = false;
pub const DEFAULT_MARGIN_TOP: f64 = 1.0;
pub const DEFAULT_MARGIN_BOTTOM: f64 = 1.0;
pub const DEFAULT_MARGIN_RIGHT: f64 = 0.0;
pub const DEFAULT_MARGIN_LEFT: f64 = 1.0;
/// A4 width in inches.
pub const DEFAULT_PAPER_WIDTH: f64 = 8.27;
/// A4 height in inches.
pub const DEFAULT_PAPER_HEIGHT: f64 = 11.69;
pub const DEFAULT_SCALE: f64 = 0.57;

/// `code` carried by every failure envelope.
pub const ERROR_CODE: u16 = 40;

/// Message of a successful conversion.
pub const SUCCESS_MESSAGE: &str = "html converted successfully";

/// Message of a conversion that produced no bytes.
pub const TIMEOUT_MESSAGE: &str = "Timeout";

// ============================================================================
// Request Types
// ============================================================================

/// Wire body of `POST /v1/html2pdf`.
///
/// Every field is optional on the wire; required fields and defaults are
/// enforced by [`into_conversion_request`](Self::into_conversion_request).
/// Field names are camelCase, and the PascalCase spellings (`Content`,
/// `WaitElementId`, ...) are accepted as aliases.
///
/// # Fields
///
/// | Field | Type | Default |
/// |-------|------|---------|
/// | `content` | string | required |
/// | `waitElementId` | string | required |
/// | `contentCss` | string | `""` |
/// | `headerTemplate` | string | `""` |
/// | `footerTemplate` | string | `""` |
/// | `printBackground` | bool | `false` |
/// | `preferCSSPageSize` | bool | `false` |
/// | `displayHeaderFooter` | bool | `true` |
/// | `landscape` | bool | `false` |
/// | `marginTop` | number | `1.0` |
/// | `marginBottom` | number | `1.0` |
/// | `marginRight` | number | `0` |
/// | `marginLeft` | number | `1.0` |
/// | `paperWidth` | number | `8.27` |
/// | `paperHeight` | number | `11.69` |
/// | `withScale` | number | `0.57` |
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlRequest {
    #[serde(default, alias = "Content", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, alias = "ContentCss", skip_serializing_if = "Option::is_none")]
    pub content_css: Option<String>,

    #[serde(default, alias = "HeaderTemplate", skip_serializing_if = "Option::is_none")]
    pub header_template: Option<String>,

    #[serde(default, alias = "FooterTemplate", skip_serializing_if = "Option::is_none")]
    pub footer_template: Option<String>,

    #[serde(default, alias = "WaitElementId", skip_serializing_if = "Option::is_none")]
    pub wait_element_id: Option<String>,

    #[serde(default, alias = "PrintBackground", skip_serializing_if = "Option::is_none")]
    pub print_background: Option<bool>,

    #[serde(
        default,
        rename = "preferCSSPageSize",
        alias = "PreferCSSPageSize",
        skip_serializing_if = "Option::is_none"
    )]
    pub prefer_css_page_size: Option<bool>,

    #[serde(default, alias = "DisplayHeaderFooter", skip_serializing_if = "Option::is_none")]
    pub display_header_footer: Option<bool>,

    #[serde(default, alias = "Landscape", skip_serializing_if = "Option::is_none")]
    pub landscape: Option<bool>,

    #[serde(default, alias = "MarginTop", skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<f64>,

    #[serde(default, alias = "MarginBottom", skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<f64>,

    #[serde(default, alias = "MarginRight", skip_serializing_if = "Option::is_none")]
    pub margin_right: Option<f64>,

    #[serde(default, alias = "MarginLeft", skip_serializing_if = "Option::is_none")]
    pub margin_left: Option<f64>,

    #[serde(default, alias = "PaperWidth", skip_serializing_if = "Option::is_none")]
    pub paper_width: Option<f64>,

    #[serde(default, alias = "PaperHeight", skip_serializing_if = "Option::is_none")]
    pub paper_height: Option<f64>,

    #[serde(default, alias = "WithScale", skip_serializing_if = "Option::is_none")]
    pub with_scale: Option<f64>,
}

impl HtmlRequest {
    /// Fill the documented defaults and check required fields.
    ///
    /// Empty strings count as missing. `content` is checked before
    /// `waitElementId`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingField`] naming the first missing field.
    pub fn into_conversion_request(self) -> Result<ConversionRequest, ValidationError> {
        let content = self
            .content
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("content"))?;

        let wait_element_id = self
            .wait_element_id
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("waitElementId"))?;

        Ok(ConversionRequest {
            content,
            content_css: self.content_css.unwrap_or_default(),
            header_template: self.header_template.unwrap_or_default(),
            footer_template: self.footer_template.unwrap_or_default(),
            wait_element_id,
            print_background: self.print_background.unwrap_or(DEFAULT_PRINT_BACKGROUND),
            prefer_css_page_size: self
                .prefer_css_page_size
                .unwrap_or(DEFAULT_PREFER_CSS_PAGE_SIZE),
            display_header_footer: self
                .display_header_footer
                .unwrap_or(DEFAULT_DISPLAY_HEADER_FOOTER),
            landscape: self.landscape.unwrap_or(DEFAULT_LANDSCAPE),
            margin_top: self.margin_top.unwrap_or(DEFAULT_MARGIN_TOP),
            margin_bottom: self.margin_bottom.unwrap_or(DEFAULT_MARGIN_BOTTOM),
            margin_right: self.margin_right.unwrap_or(DEFAULT_MARGIN_RIGHT),
            margin_left: self.margin_left.unwrap_or(DEFAULT_MARGIN_LEFT),
            paper_width: self.paper_width.unwrap_or(DEFAULT_PAPER_WIDTH),
            paper_height: self.paper_height.unwrap_or(DEFAULT_PAPER_HEIGHT),
            scale: self.with_scale.unwrap_or(DEFAULT_SCALE),
        })
    }
}

/// A request rejected before conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is absent or empty.
    #[error("field '{0}' is required")]
    MissingField(&'static str),

    /// The body is not a valid request document.
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

/// A validated conversion request.
///
/// Immutable input of [`Converter::convert`](crate::Converter::convert).
/// Build one from the wire with [`HtmlRequest::into_conversion_request`] or
/// directly with [`new`](Self::new), which applies the same defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// HTML document. When `content_css` is non-empty this is a template
    /// with exactly one `%s` slot.
    pub content: String,
    pub content_css: String,
    pub header_template: String,
    pub footer_template: String,
    /// DOM id (without `#`) queried before printing.
    pub wait_element_id: String,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub display_header_footer: bool,
    pub landscape: bool,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_right: f64,
    pub margin_left: f64,
    pub paper_width: f64,
    pub paper_height: f64,
    pub scale: f64,
}

impl ConversionRequest {
    /// Request with the documented defaults for every option.
    pub fn new(content: impl Into<String>, wait_element_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_css: String::new(),
            header_template: String::new(),
            footer_template: String::new(),
            wait_element_id: wait_element_id.into(),
            print_background: DEFAULT_PRINT_BACKGROUND,
            prefer_css_page_size: DEFAULT_PREFER_CSS_PAGE_SIZE,
            display_header_footer: DEFAULT_DISPLAY_HEADER_FOOTER,
            landscape: DEFAULT_LANDSCAPE,
            margin_top: DEFAULT_MARGIN_TOP,
            margin_bottom: DEFAULT_MARGIN_BOTTOM,
            margin_right: DEFAULT_MARGIN_RIGHT,
            margin_left: DEFAULT_MARGIN_LEFT,
            paper_width: DEFAULT_PAPER_WIDTH,
            paper_height: DEFAULT_PAPER_HEIGHT,
            scale: DEFAULT_SCALE,
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.content_css = css.into();
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header_template = header.into();
        self
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer_template = footer.into();
        self
    }

    /// Copy with every text field's line endings normalized to `\n`.
    pub fn normalized(&self) -> Self {
        Self {
            content: normalize_line_endings(&self.content),
            content_css: normalize_line_endings(&self.content_css),
            header_template: normalize_line_endings(&self.header_template),
            footer_template: normalize_line_endings(&self.footer_template),
            ..self.clone()
        }
    }

    /// CSS selector for the wait element.
    pub fn wait_selector(&self) -> String {
        format!("#{}", self.wait_element_id)
    }

    /// Print options for `Page.printToPDF`.
    pub fn pdf_params(&self) -> PdfParams {
        PdfParams {
            print_background: self.print_background,
            prefer_css_page_size: self.prefer_css_page_size,
            display_header_footer: self.display_header_footer,
            landscape: self.landscape,
            margin_top: self.margin_top,
            margin_bottom: self.margin_bottom,
            margin_left: self.margin_left,
            margin_right: self.margin_right,
            paper_width: self.paper_width,
            paper_height: self.paper_height,
            scale: self.scale,
            header_template: self.header_template.clone(),
            footer_template: self.footer_template.clone(),
        }
    }
}

/// Replace `\r\n` and lone `\r` with `\n`. Idempotent.
pub fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ============================================================================
// Result Types
// ============================================================================

/// Outcome of one conversion.
///
/// `content` is a complete PDF, the bytes captured before a failure
/// interrupted the pipeline, or empty. Empty is the only total-failure
/// signal; `cause` then holds the last pipeline error for diagnostics and
/// is always `None` when `content` is non-empty.
#[derive(Debug, Default)]
pub struct ConversionResult {
    pub content: Vec<u8>,
    pub cause: Option<RenderError>,
}

impl ConversionResult {
    pub fn success(content: Vec<u8>) -> Self {
        Self {
            content,
            cause: None,
        }
    }

    pub fn empty(cause: Option<RenderError>) -> Self {
        Self {
            content: Vec::new(),
            cause,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// `result` of a successful conversion: the PDF, base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfContent {
    #[serde(rename = "Content")]
    pub content: String,
}

impl PdfContent {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            content: BASE64.encode(bytes),
        }
    }

    /// Decode the PDF bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.content)
    }
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub title: String,
    pub detail: String,
}

impl From<&RenderError> for ErrorDetail {
    fn from(err: &RenderError) -> Self {
        Self {
            title: err.error_code().to_string(),
            detail: err.to_string(),
        }
    }
}

/// JSON envelope of every conversion response.
///
/// ```json
/// {"message": "html converted successfully", "success": true, "code": 200,
///  "result": {"Content": "JVBERi0xLjQ..."}}
/// ```
///
/// Failure envelopes always carry an `errors` array, possibly empty;
/// success envelopes never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseResponse {
    pub message: String,
    pub success: bool,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PdfContent>,
}

impl BaseResponse {
    pub fn with_success(message: impl Into<String>, code: u16, result: PdfContent) -> Self {
        Self {
            message: message.into(),
            success: true,
            code,
            errors: None,
            result: Some(result),
        }
    }

    pub fn with_error(message: impl Into<String>, code: u16, errors: Vec<ErrorDetail>) -> Self {
        Self {
            message: message.into(),
            success: false,
            code,
            errors: Some(errors),
            result: None,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            message: "ok".to_string(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_filled() {
        let request: HtmlRequest =
            serde_json::from_str(r#"{"content": "<p></p>", "waitElementId": "done"}"#).unwrap();
        let request = request.into_conversion_request().unwrap();

        assert!(!request.print_background);
        assert!(!request.prefer_css_page_size);
        assert!(request.display_header_footer);
        assert!(!request.landscape);
        assert_eq!(request.margin_top, 1.0);
        assert_eq!(request.margin_bottom, 1.0);
        assert_eq!(request.margin_right, 0.0);
        assert_eq!(request.margin_left, 1.0);
        assert_eq!(request.paper_width, 8.27);
        assert_eq!(request.paper_height, 11.69);
        assert_eq!(request.scale, 0.57);
        assert_eq!(request, ConversionRequest::new("<p></p>", "done"));
    }

    #[test]
    fn test_pascal_case_aliases() {
        let request: HtmlRequest = serde_json::from_str(
            r#"{"Content": "<p></p>", "WaitElementId": "x", "PreferCSSPageSize": true,
                "WithScale": 1.0, "ContentCss": "p{}"}"#,
        )
        .unwrap();
        let request = request.into_conversion_request().unwrap();

        assert!(request.prefer_css_page_size);
        assert_eq!(request.scale, 1.0);
        assert_eq!(request.content_css, "p{}");
    }

    #[test]
    fn test_explicit_false_overrides_true_default() {
        let request: HtmlRequest = serde_json::from_str(
            r#"{"content": "c", "waitElementId": "x", "displayHeaderFooter": false}"#,
        )
        .unwrap();
        assert!(!request.into_conversion_request().unwrap().display_header_footer);
    }

    #[test]
    fn test_missing_content_rejected() {
        let request: HtmlRequest = serde_json::from_str(r#"{"waitElementId": "x"}"#).unwrap();
        assert_eq!(
            request.into_conversion_request().unwrap_err(),
            ValidationError::MissingField("content")
        );

        let request: HtmlRequest =
            serde_json::from_str(r#"{"content": "", "waitElementId": "x"}"#).unwrap();
        assert_eq!(
            request.into_conversion_request().unwrap_err(),
            ValidationError::MissingField("content"),
            "Empty content should count as missing"
        );
    }

    #[test]
    fn test_missing_wait_element_rejected() {
        let request: HtmlRequest = serde_json::from_str(r#"{"content": "c"}"#).unwrap();
        assert_eq!(
            request.into_conversion_request().unwrap_err(),
            ValidationError::MissingField("waitElementId")
        );
    }

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\nd"), "a\nb\nc\nd");
        assert_eq!(normalize_line_endings("\r\r\n"), "\n\n");
        assert_eq!(normalize_line_endings("plain"), "plain");

        for input in ["a\r\n\r\nb", "\r", "x\ry\r\n", "\n\r"] {
            let once = normalize_line_endings(input);
            assert_eq!(normalize_line_endings(&once), once, "Not idempotent for {:?}", input);
            assert!(!once.contains('\r'));
        }
    }

    #[test]
    fn test_request_normalized_covers_all_text_fields() {
        let request = ConversionRequest::new("a\r\nb", "x")
            .with_css("p {\r}")
            .with_header("h\r\n")
            .with_footer("f\r");
        let normalized = request.normalized();

        assert_eq!(normalized.content, "a\nb");
        assert_eq!(normalized.content_css, "p {\n}");
        assert_eq!(normalized.header_template, "h\n");
        assert_eq!(normalized.footer_template, "f\n");
        assert_eq!(normalized.normalized(), normalized);
    }

    #[test]
    fn test_pdf_params_mapping() {
        let mut request = ConversionRequest::new("c", "x").with_header("<h/>");
        request.landscape = true;
        let params = request.pdf_params();

        assert!(params.landscape);
        assert_eq!(params.scale, DEFAULT_SCALE);
        assert_eq!(params.header_template, "<h/>");
        assert_eq!(params.footer_template, "");
        assert_eq!(request.wait_selector(), "#x");
    }

    #[test]
    fn test_success_envelope_shape() {
        let response =
            BaseResponse::with_success(SUCCESS_MESSAGE, 200, PdfContent::from_bytes(b"%PDF"));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["code"], 200);
        assert_eq!(json["result"]["Content"], "JVBERg==");
        assert!(json.get("errors").is_none(), "Success must omit errors");
    }

    #[test]
    fn test_error_envelope_shape() {
        let response = BaseResponse::with_error("bad", ERROR_CODE, Vec::new());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["code"], 40);
        assert_eq!(json["errors"], serde_json::json!([]));
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_pdf_content_decode() {
        let content = PdfContent::from_bytes(b"%PDF-1.4");
        assert_eq!(content.decode().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_health_response_default() {
        let json = serde_json::to_string(&HealthResponse::default()).unwrap();
        assert_eq!(json, r#"{"message":"ok"}"#);
    }
}
