//! Conversion service module.
//!
//! This module provides the **framework-agnostic core** of the service: the
//! [`Converter`] orchestrator, the API types, and the mapping from
//! conversion outcomes to HTTP status plus JSON envelope. The axum
//! integration is a thin layer over it.
//!
//! # Module Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     service module                           │
//! │                                                              │
//! │  ┌────────────────────────┐   ┌───────────────────────────┐  │
//! │  │      types.rs          │   │      converter.rs         │  │
//! │  │  HtmlRequest           │   │  Converter::convert()     │  │
//! │  │  ConversionRequest     │──▶│   lock → content server   │  │
//! │  │  ConversionResult      │   │   → pipeline (+ retry)    │  │
//! │  │  BaseResponse          │   │                           │  │
//! │  └────────────────────────┘   └───────────────────────────┘  │
//! │                 │                                            │
//! │                 ▼                                            │
//! │   conversion_response() / validation_response()              │
//! └──────────────────────────────────────────────────────────────┘
//!                   │ used by
//!                   ▼
//!          integrations::axum (handlers)
//! ```
//!
//! # Response Mapping
//!
//! | Outcome | Status | Envelope |
//! |---------|--------|----------|
//! | Non-empty result | 200 | `success:true, code:200, result.Content` |
//! | Invalid request | 400 | `success:false, code:40, errors:[]` |
//! | Empty result | 500 | `message:"Timeout"`, `errors[0]` = swallowed cause |
//! | Infrastructure error | 500 | `message` = error text |

mod converter;
mod types;

pub use converter::Converter;
pub use types::{
    BaseResponse, ConversionRequest, ConversionResult, ErrorDetail, HealthResponse, HtmlRequest,
    PdfContent, ValidationError, normalize_line_endings,
};
pub use types::{
    DEFAULT_DISPLAY_HEADER_FOOTER, DEFAULT_LANDSCAPE, DEFAULT_MARGIN_BOTTOM, DEFAULT_MARGIN_LEFT,
    DEFAULT_MARGIN_RIGHT, DEFAULT_MARGIN_TOP, DEFAULT_PAPER_HEIGHT, DEFAULT_PAPER_WIDTH,
    DEFAULT_PREFER_CSS_PAGE_SIZE, DEFAULT_PRINT_BACKGROUND, DEFAULT_SCALE, ERROR_CODE,
    SUCCESS_MESSAGE, TIMEOUT_MESSAGE,
};

use crate::error::RenderError;

/// HTTP status and envelope for a conversion outcome.
///
/// # Example
///
/// ```rust
/// use html2pdf_service::service::{conversion_response, ConversionResult};
///
/// let (status, body) = conversion_response(Ok(ConversionResult::success(b"%PDF".to_vec())));
/// assert_eq!(status, 200);
/// assert!(body.success);
///
/// let (status, body) = conversion_response(Ok(ConversionResult::empty(None)));
/// assert_eq!(status, 500);
/// assert_eq!(body.message, "Timeout");
/// ```
pub fn conversion_response(outcome: Result<ConversionResult, RenderError>) -> (u16, BaseResponse) {
    match outcome {
        Ok(result) if !result.is_empty() => (
            200,
            BaseResponse::with_success(SUCCESS_MESSAGE, 200, PdfContent::from_bytes(&result.content)),
        ),
        Ok(result) => {
            let errors = result.cause.as_ref().map(ErrorDetail::from).into_iter().collect();
            (500, BaseResponse::with_error(TIMEOUT_MESSAGE, ERROR_CODE, errors))
        }
        Err(e) => {
            log::error!("❌ Conversion failed: {}", e);
            (500, BaseResponse::with_error(e.to_string(), ERROR_CODE, Vec::new()))
        }
    }
}

/// HTTP status and envelope for a rejected request.
pub fn validation_response(err: &ValidationError) -> (u16, BaseResponse) {
    (400, BaseResponse::with_error(err.to_string(), ERROR_CODE, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_success_response() {
        let (status, body) = conversion_response(Ok(ConversionResult::success(b"%PDF-1.4".to_vec())));
        assert_eq!(status, 200);
        assert_eq!(body.message, SUCCESS_MESSAGE);
        assert_eq!(body.result.unwrap().decode().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_empty_result_reports_cause() {
        let cause = RenderError::DeadlineExceeded(Duration::from_secs(20));
        let (status, body) = conversion_response(Ok(ConversionResult::empty(Some(cause))));

        assert_eq!(status, 500);
        assert_eq!(body.message, TIMEOUT_MESSAGE);
        assert_eq!(body.code, ERROR_CODE);
        let errors = body.errors.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "DEADLINE_EXCEEDED");
    }

    #[test]
    fn test_infrastructure_error_message() {
        let err = RenderError::ContentServer("address in use".to_string());
        let (status, body) = conversion_response(Err(err));

        assert_eq!(status, 500);
        assert_eq!(body.message, "Content server error: address in use");
        assert!(!body.success);
    }

    #[test]
    fn test_validation_response() {
        let (status, body) = validation_response(&ValidationError::MissingField("content"));
        assert_eq!(status, 400);
        assert_eq!(body.code, 40);
        assert_eq!(body.errors, Some(Vec::new()));
        assert!(body.message.contains("content"));
    }
}
