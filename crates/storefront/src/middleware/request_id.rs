//! Request ids for log and error correlation.
//!
//! An upstream `x-request-id` is reused when it is a sane token; otherwise a
//! UUID v4 is generated. The id is recorded on the request span, tagged in
//! Sentry, stored as a [`RequestId`] extension and echoed in the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted.
const MAX_UPSTREAM_LEN: usize = 128;

/// The id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

fn upstream_id(request: &Request) -> Option<String> {
    let raw = request.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    let sane = !raw.is_empty()
        && raw.len() <= MAX_UPSTREAM_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    sane.then(|| raw.to_owned())
}

/// Middleware that gives every request an id.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = upstream_id(&request).unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", id.as_str());
    sentry::configure_scope(|scope| scope.set_tag("request_id", &id));
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn with_header(value: &str) -> Request {
        Request::builder()
            .header(REQUEST_ID_HEADER, value)
            .body(Body::empty())
            .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_upstream_id_reused() {
        assert_eq!(upstream_id(&with_header("abc-123")), Some("abc-123".into()));
    }

    #[test]
    fn test_upstream_id_rejects_junk() {
        assert_eq!(upstream_id(&with_header("a b<script>")), None);
        assert_eq!(upstream_id(&with_header(&"x".repeat(200))), None);
    }
}
