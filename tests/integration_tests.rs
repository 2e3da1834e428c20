//! End-to-end tests of the HTTP API and the conversion fallback policy.
//!
//! Chrome is replaced by [`MockSession`]; the content server, pipeline,
//! converter and router are the real ones.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use html2pdf_service::factory::mock::{MOCK_PDF, MockSession, MockStep};
use html2pdf_service::integrations::axum::router;
use html2pdf_service::prelude::*;
use html2pdf_service::service::BaseResponse;
use tower::ServiceExt;

fn config(timeout: Duration) -> ServiceConfig {
    ServiceConfigBuilder::new()
        .conversion_timeout(timeout)
        .build()
        .expect("valid config")
}

fn app(session: Arc<MockSession>) -> Router {
    let config = config(Duration::from_secs(5));
    let converter = Arc::new(Converter::new(session, &config));
    router(converter, &config)
}

fn post_json(body: &str) -> Request<Body> {
    Request::post("/v1/html2pdf")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn envelope(response: axum::response::Response) -> BaseResponse {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("response should be a JSON envelope")
}

// ============================================================================
// HTTP scenarios
// ============================================================================

#[tokio::test]
async fn test_valid_request_returns_pdf() {
    let session = Arc::new(MockSession::new());
    let response = app(Arc::clone(&session))
        .oneshot(post_json(
            r#"{"content": "<html><body><p id='x'>hi</p></body></html>", "waitElementId": "x"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-correlation-id"));

    let body = envelope(response).await;
    assert!(body.success);
    assert_eq!(body.code, 200);
    assert_eq!(body.message, "html converted successfully");
    assert!(body.errors.is_none());

    let pdf = body.result.expect("result present").decode().unwrap();
    assert_eq!(pdf, MOCK_PDF);

    // Defaults reached the print call
    let params = &session.pdf_params()[0];
    assert!(params.display_header_footer);
    assert_eq!(params.scale, 0.57);
    assert_eq!(params.paper_width, 8.27);
}

#[tokio::test]
async fn test_missing_content_is_bad_request() {
    let session = Arc::new(MockSession::new());
    let response = app(Arc::clone(&session))
        .oneshot(post_json(r#"{"waitElementId": "x"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = envelope(response).await;
    assert!(!body.success);
    assert_eq!(body.code, 40);
    assert_eq!(body.errors, Some(Vec::new()));
    assert!(session.calls().is_empty(), "Invalid requests must not reach the browser");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let response = app(Arc::new(MockSession::new()))
        .oneshot(post_json("{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!envelope(response).await.success);
}

#[tokio::test]
async fn test_rejected_script_reports_timeout() {
    let session = Arc::new(
        MockSession::new().failing_at(MockStep::Evaluate, "SyntaxError: Unexpected token '<'"),
    );
    let response = app(Arc::clone(&session))
        .oneshot(post_json(r#"{"content": "<p", "waitElementId": "x"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = envelope(response).await;
    assert_eq!(body.message, "Timeout");
    assert!(!body.success);

    let errors = body.errors.expect("cause reported");
    assert_eq!(errors[0].title, "SCRIPT_FAILED");
    assert!(errors[0].detail.contains("SyntaxError"));
    assert_eq!(session.count(MockStep::Evaluate), 2, "Retry must have run");
}

#[tokio::test]
async fn test_bad_template_reports_timeout() {
    let session = Arc::new(MockSession::new());
    let response = app(session)
        .oneshot(post_json(
            r#"{"content": "<p>no slot</p>", "contentCss": "p { color: red }", "waitElementId": "x"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = envelope(response).await;
    assert_eq!(body.errors.unwrap()[0].title, "CONTENT_ERROR");
}

#[tokio::test]
async fn test_healthcheck() {
    let response = app(Arc::new(MockSession::new()))
        .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], br#"{"message":"ok"}"#);
}

// ============================================================================
// Converter
// ============================================================================

#[tokio::test]
async fn test_partial_bytes_returned_after_deadline() {
    let partial = b"%PDF-1.4\n1 0 obj".to_vec();
    let session = Arc::new(
        MockSession::new().truncated_print(partial.clone(), "deadline reached during printToPDF"),
    );
    let converter = Converter::new(session.clone(), &config(Duration::from_secs(5)));

    let result = converter
        .convert(ConversionRequest::new("<p></p>", "x"))
        .await
        .expect("partial result is not an error");

    assert_eq!(result.content, partial);
    assert_eq!(session.count(MockStep::Navigate), 1);
}

#[tokio::test]
async fn test_both_attempts_empty_is_empty_result() {
    let session = Arc::new(MockSession::new().without_load_event());
    let converter = Converter::new(session.clone(), &config(Duration::from_millis(150)));

    let result = converter
        .convert(ConversionRequest::new("<p></p>", "x"))
        .await
        .expect("total failure is not an error");

    assert!(result.is_empty());
    assert!(matches!(result.cause, Some(RenderError::DeadlineExceeded(_))));
    assert_eq!(session.count(MockStep::Navigate), 2);
    assert_eq!(session.count(MockStep::Print), 0);
    assert_eq!(session.listener_count(), 0, "Listeners must be cleaned up");

    let stats = converter.stats();
    assert_eq!(stats.conversions, 1);
    assert_eq!(stats.retried, 1);
    assert_eq!(stats.empty, 1);
}

#[tokio::test]
async fn test_stylesheet_served_to_browser() {
    let session = Arc::new(MockSession::new().fetching_content());
    let converter = Converter::new(session.clone(), &config(Duration::from_secs(5)));

    let request = ConversionRequest::new("<style>%s</style><p id='x'></p>", "x")
        .with_css("\r\n  p { margin: 0 }\r\n");
    converter.convert(request).await.unwrap();

    let fetched = session.fetched();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].body, "p { margin: 0 }");
    assert!(fetched[0].content_type.starts_with("text/css"), "{}", fetched[0].content_type);
    assert_eq!(
        session.arguments(MockStep::SetContent),
        vec!["<style>\n  p { margin: 0 }\n</style><p id='x'></p>"]
    );
}

#[tokio::test]
async fn test_retry_gets_fresh_deadline() {
    // Each attempt needs ~120ms of protocol time against a 200ms budget:
    // a shared budget would starve the retry.
    let session = Arc::new(
        MockSession::new()
            .with_step_delay(Duration::from_millis(20))
            .failing_first(MockStep::Print, 1, "renderer crashed"),
    );
    let converter = Converter::new(session.clone(), &config(Duration::from_millis(200)));

    let result = converter
        .convert(ConversionRequest::new("<p></p>", "x"))
        .await
        .unwrap();

    assert_eq!(result.content, MOCK_PDF);
    assert_eq!(session.count(MockStep::Print), 2);
}
