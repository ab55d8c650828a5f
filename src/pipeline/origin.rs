//! Origin fetching.
//!
//! # Responsibilities
//! - Point forwarded requests at the configured origin
//! - Enforce the origin response deadline
//! - Hand back the origin response with its body still streaming
//!
//! # Design Decisions
//! - No retries here; that belongs to the network layer
//! - Timed-out fetches map to 504, connection failures to 502

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{OriginConfig, TimeoutConfig};
use crate::pipeline::PipelineError;

/// Something that can answer a forwarded request.
pub trait Origin: Send + Sync + 'static {
    fn fetch(
        &self,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, PipelineError>> + Send;
}

/// Plain HTTP origin reached through a pooled hyper client.
#[derive(Clone)]
pub struct HttpOrigin {
    client: Client<HttpConnector, Body>,
    scheme: Scheme,
    authority: Authority,
    timeout: Duration,
}

impl HttpOrigin {
    pub fn new(origin: &OriginConfig, timeouts: &TimeoutConfig) -> Result<Self, InvalidUri> {
        let base: Uri = origin.url.parse()?;
        let parts = base.into_parts();
        let authority = match parts.authority {
            Some(authority) => authority,
            // An authority-less URL: re-parse the raw text to surface the error.
            None => Authority::try_from(origin.url.as_str())?,
        };

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.origin_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            scheme: parts.scheme.unwrap_or(Scheme::HTTP),
            authority,
            timeout: Duration::from_secs(timeouts.origin_secs),
        })
    }

    fn target(&self, uri: &Uri) -> Result<Uri, PipelineError> {
        let path_and_query = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(PipelineError::InvalidOriginUri)
    }
}

impl Origin for HttpOrigin {
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, PipelineError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.target(&parts.uri)?;
        let request = Request::from_parts(parts, body);

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response.map(Body::new::<Incoming>)),
            Ok(Err(e)) => Err(PipelineError::OriginUnreachable(e.to_string())),
            Err(_) => Err(PipelineError::OriginTimeout(self.timeout)),
        }
    }
}
