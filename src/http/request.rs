//! Request identification and preparation.
//!
//! # Responsibilities
//! - Assign every request an X-Request-ID (UUID v4) unless one is present
//! - Echo the ID on the response
//! - Prepare the inbound request for the origin
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The ID is forwarded to the origin so both sides can correlate logs

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{HeaderName, Request};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

use crate::security::headers::prepare_forward_headers;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning a request ID to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Read the request ID assigned by [`set_request_id_layer`].
pub fn request_id(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Turn an inbound request into the request sent to the origin.
pub fn into_forwarded(mut request: Request<Body>, peer: SocketAddr) -> Request<Body> {
    prepare_forward_headers(request.headers_mut(), peer);
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Response};
    use std::convert::Infallible;
    use tower::{service_fn, Layer, ServiceExt};

    async fn echo_request_id(req: Request<Body>) -> Result<Response<Body>, Infallible> {
        Ok(Response::new(Body::from(request_id(&req))))
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_request_id_assigned_and_readable() {
        let service = set_request_id_layer().layer(service_fn(echo_request_id));

        let response = service.oneshot(Request::new(Body::empty())).await.unwrap();
        let id = body_text(response).await;
        assert_eq!(id.len(), 36);
        assert_ne!(id, "unknown");
    }

    #[tokio::test]
    async fn test_existing_request_id_kept() {
        let service = set_request_id_layer().layer(service_fn(echo_request_id));

        let mut request = Request::new(Body::empty());
        request
            .headers_mut()
            .insert(X_REQUEST_ID, HeaderValue::from_static("edge-42"));

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await, "edge-42");
    }

    #[tokio::test]
    async fn test_request_id_echoed_on_response() {
        let service = propagate_request_id_layer()
            .layer(set_request_id_layer().layer(service_fn(echo_request_id)));

        let mut request = Request::new(Body::empty());
        request
            .headers_mut()
            .insert(X_REQUEST_ID, HeaderValue::from_static("edge-7"));

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "edge-7");
    }

    #[test]
    fn test_forwarded_request_keeps_method_and_uri() {
        let request = Request::post("/form?a=1")
            .header("host", "www.example.com")
            .body(Body::from("a=b"))
            .unwrap();

        let forwarded = into_forwarded(request, "192.0.2.10:4000".parse().unwrap());
        assert_eq!(forwarded.method(), "POST");
        assert_eq!(forwarded.uri(), "/form?a=1");
        assert_eq!(forwarded.headers()["x-forwarded-for"], "192.0.2.10");
    }
}
