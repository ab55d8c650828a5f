//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Forwarded request
//!     → nonce (fatal on entropy failure)
//!     → origin.rs (single fetch)
//!     → classify path + content type
//!     → non-text: headers only, body streamed through untouched
//!     → text: buffer, rewrite with nonce, headers
//!       (content-encoded text skips the rewrite and streams)
//!     → response with origin status and reason phrase
//! ```
//!
//! # Design Decisions
//! - One origin fetch per request; the text path buffers instead of
//!   refetching, so request bodies are sent to the origin exactly once
//! - The policy set is loaded once per request, so a concurrent reload
//!   never mixes two policies in one response

pub mod origin;

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response, StatusCode};
use thiserror::Error;

use crate::policy::{EntropyUnavailable, Nonce, PolicySet};
use crate::security::headers::strip_hop_by_hop;

pub use origin::{HttpOrigin, Origin};

/// Ways a request can fail inside the edge.
///
/// Origin responses with error statuses are not errors; they pass through.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Entropy(#[from] EntropyUnavailable),

    #[error("origin unreachable: {0}")]
    OriginUnreachable(String),

    #[error("origin did not respond within {0:?}")]
    OriginTimeout(Duration),

    #[error("invalid origin uri: {0}")]
    InvalidOriginUri(#[source] axum::http::Error),

    #[error("origin body of {length} bytes exceeds the {limit} byte rewrite limit")]
    BodyTooLarge { length: u64, limit: usize },

    #[error("failed to read origin body: {0}")]
    BodyRead(#[source] axum::Error),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Entropy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::OriginTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::OriginUnreachable(_)
            | PipelineError::InvalidOriginUri(_)
            | PipelineError::BodyTooLarge { .. }
            | PipelineError::BodyRead(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Entropy(_) => "entropy_unavailable",
            PipelineError::OriginUnreachable(_) => "origin_unreachable",
            PipelineError::OriginTimeout(_) => "origin_timeout",
            PipelineError::InvalidOriginUri(_) => "invalid_origin_uri",
            PipelineError::BodyTooLarge { .. } => "body_too_large",
            PipelineError::BodyRead(_) => "body_read",
        }
    }
}

type NonceSource = fn() -> Result<Nonce, EntropyUnavailable>;

/// Per-request orchestration over an [`Origin`].
pub struct RequestPipeline<O> {
    origin: O,
    policy: Arc<ArcSwap<PolicySet>>,
    max_body_size: usize,
    nonce_source: NonceSource,
}

impl<O: Origin> RequestPipeline<O> {
    pub fn new(origin: O, policy: Arc<ArcSwap<PolicySet>>, max_body_size: usize) -> Self {
        Self {
            origin,
            policy,
            max_body_size,
            nonce_source: Nonce::generate,
        }
    }

    /// Replace the entropy-backed nonce source.
    pub fn with_nonce_source(mut self, source: NonceSource) -> Self {
        self.nonce_source = source;
        self
    }

    /// Shared handle to the live policy set, for hot reload.
    pub fn policy(&self) -> &Arc<ArcSwap<PolicySet>> {
        &self.policy
    }

    /// Handle one request end to end.
    ///
    /// The chosen [`Branch`](crate::policy::Branch) is attached to the
    /// response extensions for logging and metrics.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, PipelineError> {
        let nonce = (self.nonce_source)()?;
        let policy = self.policy.load_full();
        let path = request.uri().path().to_owned();

        let response = self.origin.fetch(request).await?;
        // Parts carry status, version and extensions; hyper keeps a
        // non-canonical reason phrase in the extensions.
        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let classification = policy.classifier.classify(&path, content_type);
        let branch = classification.branch();

        // Encoded text cannot be rewritten; it keeps its bytes and gets the
        // branch headers only.
        let encoded = classification.is_text && is_encoded(&parts.headers);
        if encoded {
            tracing::warn!(path = %path, "Origin sent an encoded text body, skipping rewrite");
        }

        if !classification.is_text || encoded {
            parts.headers = policy
                .headers
                .build(mem::take(&mut parts.headers), &classification, &nonce);
            parts.extensions.insert(branch);
            return Ok(Response::from_parts(parts, body));
        }

        if let Some(length) = content_length(&parts.headers) {
            if length > self.max_body_size as u64 {
                return Err(PipelineError::BodyTooLarge {
                    length,
                    limit: self.max_body_size,
                });
            }
        }
        let bytes = axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(PipelineError::BodyRead)?;
        let html = String::from_utf8_lossy(&bytes);
        let rewritten = policy.rewriter.rewrite(&html, &nonce);

        let mut headers = mem::take(&mut parts.headers);
        headers.remove(header::CONTENT_LENGTH);
        parts.headers = policy.headers.build(headers, &classification, &nonce);
        parts.extensions.insert(branch);

        Ok(Response::from_parts(parts, Body::from(rewritten)))
    }
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().eq_ignore_ascii_case("identity"))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
