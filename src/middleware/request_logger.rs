use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, State},
    http::{header::CONTENT_LENGTH, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

const MAX_BODY_LOG_SIZE: usize = 1024; // 1KB limit for body logging
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogSettings {
    pub log_body: bool,
}

pub async fn request_logger_middleware(
    State(settings): State<RequestLogSettings>,
    mut req: Request<Body>,
    next: Next<Body>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();
    let header_value = HeaderValue::from_str(&request_id).ok();

    // Insert request ID into headers for downstream handlers
    if let Some(value) = &header_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let declared_len = declared_body_len(&req);
    if settings.log_body && declared_len.map_or(false, |len| len <= MAX_BODY_LOG_SIZE) {
        // Content-Length frames the body, so this read stays within the limit.
        let (parts, body) = req.into_parts();
        let bytes = match Bytes::from_request(Request::new(body), &()).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Failed to read request body"
                );
                return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
            }
        };

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %describe_body(&bytes),
            "Incoming request"
        );

        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = ?declared_len,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = latency.as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Some(value) = header_value {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}

/// Length announced by the client. Chunked bodies have none and are never
/// buffered for logging.
fn declared_body_len(req: &Request<Body>) -> Option<usize> {
    req.headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// JSON bodies are logged with sensitive keys masked; anything else, or
/// anything over the size limit, only by length.
fn describe_body(bytes: &Bytes) -> String {
    if bytes.len() > MAX_BODY_LOG_SIZE {
        return format!("[{} bytes, not logged]", bytes.len());
    }
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(json) => {
            let sanitized = crate::utils::sanitize::sanitize_json(&json);
            serde_json::to_string(&sanitized).unwrap_or_else(|_| "[invalid json]".to_string())
        }
        Err(_) => format!("[non-json, {} bytes]", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    fn app(log_body: bool) -> Router {
        Router::new()
            .route("/test", post(|body: String| async move { body }))
            .layer(axum::middleware::from_fn_with_state(
                RequestLogSettings { log_body },
                request_logger_middleware,
            ))
    }

    #[tokio::test]
    async fn test_request_logger_adds_request_id() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_body_survives_logging() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test")
                    .header(CONTENT_LENGTH, 19)
                    .body(Body::from(r#"{"message":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper_body_string(response).await;
        assert_eq!(body, r#"{"message":"hello"}"#);
    }

    #[tokio::test]
    async fn test_oversized_body_passes_through_unbuffered() {
        let payload = "a".repeat(MAX_BODY_LOG_SIZE * 4);
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test")
                    .header(CONTENT_LENGTH, payload.len())
                    .body(Body::from(payload.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hyper_body_string(response).await, payload);
    }

    #[test]
    fn test_declared_body_len() {
        let sized = Request::builder()
            .header(CONTENT_LENGTH, "17")
            .body(Body::empty())
            .unwrap();
        assert_eq!(declared_body_len(&sized), Some(17));

        let chunked = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(declared_body_len(&chunked), None);
    }

    #[test]
    fn test_describe_body_masks_and_limits() {
        let logged = describe_body(&Bytes::from_static(
            br#"{"token":"abcdefghijklmnop","title":"x"}"#,
        ));
        assert!(logged.contains("abcd****mnop"));
        assert!(logged.contains("\"title\":\"x\""));

        let big = Bytes::from(vec![b'a'; MAX_BODY_LOG_SIZE + 1]);
        assert!(describe_body(&big).contains("not logged"));
        assert!(describe_body(&Bytes::from_static(b"plain")).contains("non-json"));
    }

    async fn hyper_body_string(response: Response) -> String {
        use axum::body::HttpBody;

        let mut body = response.into_body();
        let mut out = Vec::new();
        while let Some(chunk) = body.data().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }
}
