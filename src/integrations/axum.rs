//! Axum HTTP front end.
//!
//! This module builds the service's [`Router`]:
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/html2pdf` | Convert a request, answer with the JSON envelope |
//! | `GET` | `/healthcheck` | `{"message":"ok"}`, never waits on a conversion |
//! | `GET` | `/swagger.json` | OpenAPI document (only when enabled) |
//!
//! Every response carries an `X-Correlation-ID` header, echoed from the
//! request or freshly generated. The id is in [`correlation`] scope while
//! the request is handled, so every log line it produces carries it. Every
//! request is written to the access log.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_service::prelude::*;
//! use html2pdf_service::integrations::axum::router;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::default();
//!     let manager = BrowserSessionManager::start_chrome(&config).await?;
//!     let converter = Arc::new(Converter::new(manager.session(), &config));
//!
//!     let app = router(converter, &config);
//!     let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower::ServiceBuilder;

use crate::config::ServiceConfig;
use crate::correlation;
use crate::service::{
    BaseResponse, Converter, HealthResponse, HtmlRequest, ValidationError, conversion_response,
    validation_response,
};

/// Header carrying the request correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Correlation id of the current request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<Converter>,
}

/// Build the service router.
pub fn router(converter: Arc<Converter>, config: &ServiceConfig) -> Router {
    let mut router = Router::new()
        .route("/v1/html2pdf", post(html2pdf_handler))
        .route("/healthcheck", get(health_handler));

    if config.swagger_enabled {
        log::info!("API document served at /swagger.json");
        router = router.route("/swagger.json", get(swagger_handler));
    }

    router.with_state(AppState { converter }).layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(correlation_id))
            .layer(middleware::from_fn(access_log)),
    )
}

// ============================================================================
// Handlers
// ============================================================================

fn respond(status: u16, body: BaseResponse) -> (StatusCode, Json<BaseResponse>) {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body))
}

/// `POST /v1/html2pdf`
async fn html2pdf_handler(
    State(state): State<AppState>,
    payload: Result<Json<HtmlRequest>, JsonRejection>,
) -> (StatusCode, Json<BaseResponse>) {
    log::info!("Html2Pdf - Started");

    let request = payload
        .map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()))
        .and_then(|Json(body)| body.into_conversion_request());

    let request = match request {
        Ok(request) => request,
        Err(e) => {
            log::warn!("⚠️ Rejected conversion request: {}", e);
            let (status, body) = validation_response(&e);
            return respond(status, body);
        }
    };

    let (status, body) = conversion_response(state.converter.convert(request).await);
    log::info!("Html2Pdf - Finished ({})", status);
    respond(status, body)
}

/// `GET /healthcheck`
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `GET /swagger.json`
async fn swagger_handler() -> Json<serde_json::Value> {
    Json(openapi_document())
}

/// OpenAPI 3 description of the public routes.
pub fn openapi_document() -> serde_json::Value {
    serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "html2pdf",
            "description": "Converts HTML documents to PDF with headless Chrome.",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/v1/html2pdf": {
                "post": {
                    "tags": ["HTML PDF"],
                    "summary": "API Convert html to pdf",
                    "description": "Retrieve the pdf file of a html",
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/HtmlRequest"}}}
                    },
                    "responses": {
                        "200": {"description": "success", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BaseResponse"}}}},
                        "400": {"description": "error", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BaseResponse"}}}},
                        "500": {"description": "error", "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BaseResponse"}}}}
                    }
                }
            },
            "/healthcheck": {
                "get": {
                    "tags": ["Health"],
                    "summary": "Health check",
                    "responses": {
                        "200": {"description": "ok", "content": {"application/json": {"schema": {
                            "type": "object",
                            "properties": {"message": {"type": "string", "example": "ok"}}
                        }}}}
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "HtmlRequest": {
                    "type": "object",
                    "required": ["content", "waitElementId"],
                    "properties": {
                        "content": {"type": "string"},
                        "contentCss": {"type": "string"},
                        "headerTemplate": {"type": "string"},
                        "footerTemplate": {"type": "string"},
                        "waitElementId": {"type": "string"},
                        "printBackground": {"type": "boolean", "default": false},
                        "preferCSSPageSize": {"type": "boolean", "default": false},
                        "displayHeaderFooter": {"type": "boolean", "default": true},
                        "landscape": {"type": "boolean", "default": false},
                        "marginTop": {"type": "number", "default": 1.0},
                        "marginBottom": {"type": "number", "default": 1.0},
                        "marginRight": {"type": "number", "default": 0},
                        "marginLeft": {"type": "number", "default": 1.0},
                        "paperWidth": {"type": "number", "default": 8.27},
                        "paperHeight": {"type": "number", "default": 11.69},
                        "withScale": {"type": "number", "default": 0.57}
                    }
                },
                "BaseResponse": {
                    "type": "object",
                    "properties": {
                        "message": {"type": "string"},
                        "success": {"type": "boolean"},
                        "code": {"type": "integer"},
                        "errors": {"type": "array", "items": {
                            "type": "object",
                            "properties": {"title": {"type": "string"}, "detail": {"type": "string"}}
                        }},
                        "result": {"type": "object", "properties": {
                            "Content": {"type": "string", "format": "byte"}
                        }}
                    }
                }
            }
        }
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Attach a correlation id to the request and echo it on the response.
async fn correlation_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(CorrelationId(id.clone()));
    let mut response = correlation::scope(id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Log method, path, status and latency of every request.
async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        target: "access",
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
