//! API Middleware
//!
//! Request context and request logging.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::OperationContext;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const REQUEST_USER_HEADER: &str = "x-request-user-id";

// =========================================================================
// Operation context
// =========================================================================

/// Build the `OperationContext` for a request and store it in the request
/// extensions. A missing or malformed correlation id is replaced with a
/// fresh one; a malformed user id header is rejected.
pub async fn context_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::new().with_correlation_id(correlation_id);

    if let Some(raw) = headers.get(REQUEST_USER_HEADER) {
        match raw.to_str().ok().and_then(|s| s.parse::<i64>().ok()) {
            Some(user_id) => context = context.with_request_user(user_id),
            None => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid X-Request-User-Id header format",
                        "error_code": "invalid_user_id"
                    })),
                )
                    .into_response());
            }
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        context = context.with_client_ip(addr.ip());
    }

    let span = context.span("http_request");
    request.extensions_mut().insert(context);

    Ok(next.run(request).instrument(span).await)
}

// =========================================================================
// Request logging
// =========================================================================

/// Credentials forwarded by the gateway in front of the ledger
const CREDENTIAL_HEADERS: &[&str] = &["authorization", "proxy-authorization", "cookie"];

/// A header is redacted when it carries credentials or card PIN material
fn is_redacted(name: &str) -> bool {
    CREDENTIAL_HEADERS.contains(&name) || name.contains("pin")
}

/// Header pairs safe to put in a log line. `HeaderName` is already
/// lowercase.
pub fn loggable_headers(headers: &HeaderMap) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.as_str();
            let value = if is_redacted(name) {
                "[REDACTED]"
            } else {
                value.to_str().unwrap_or("[non-ascii]")
            };
            (name, value)
        })
        .collect()
}

/// Log one line per request and one per response. Bodies and query
/// strings stay out of the log; request bodies may hold PINs.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = std::time::Instant::now();

    tracing::debug!(
        method = %method,
        path = %path,
        headers = ?loggable_headers(request.headers()),
        "Request received"
    );

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request failed");
    } else {
        tracing::info!(method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request handled");
    }

    response
}
