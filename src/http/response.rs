//! Error responses.
//!
//! # Responsibilities
//! - Map pipeline failures to HTTP status codes
//! - Keep error bodies terse; details stay in the logs
//!
//! # Design Decisions
//! - Entropy failure is a 500, never a response with a weak nonce
//! - Origin timeouts result in 504 Gateway Timeout, other origin failures in
//!   502 Bad Gateway
//! - Error responses carry no caching or CSP headers

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::pipeline::PipelineError;

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, status.canonical_reason().unwrap_or("Error")).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let timeout = PipelineError::OriginTimeout(Duration::from_secs(15)).into_response();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.headers()["cache-control"], "no-store");

        let down = PipelineError::OriginUnreachable("refused".into()).into_response();
        assert_eq!(down.status(), StatusCode::BAD_GATEWAY);

        let large = PipelineError::BodyTooLarge { length: 10, limit: 1 }.into_response();
        assert_eq!(large.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_body_does_not_leak_details() {
        let response = PipelineError::OriginUnreachable("10.0.0.3:80 refused".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Bad Gateway");
    }
}
