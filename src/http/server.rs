//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all edge handler
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Bind server to listener
//! - Dispatch every request through the pipeline
//! - Apply policy reloads while serving
//! - Observability (metrics, request IDs)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, EdgeConfig};
use crate::http::request::{
    into_forwarded, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::observability::metrics;
use crate::pipeline::{HttpOrigin, RequestPipeline};
use crate::policy::{Branch, PolicySet};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RequestPipeline<HttpOrigin>>,
}

/// HTTP server for the nonce edge.
pub struct HttpServer {
    router: Router,
    config: EdgeConfig,
    policy: Arc<ArcSwap<PolicySet>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EdgeConfig) -> Result<Self, ConfigError> {
        let policy = Arc::new(ArcSwap::from_pointee(PolicySet::from_config(&config)?));
        let origin = HttpOrigin::new(&config.origin, &config.timeouts)?;

        let pipeline = RequestPipeline::new(origin, policy.clone(), config.security.max_body_size);
        let state = AppState {
            pipeline: Arc::new(pipeline),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            policy,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_request_body))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
    }

    /// Run the server until `shutdown` fires, applying `config_updates` to
    /// the live policy as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.origin.url,
            "HTTP server starting"
        );

        tokio::spawn(apply_policy_updates(self.policy.clone(), config_updates));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }
}

/// Compile and swap in each new configuration's policy. Listener and origin
/// settings in later revisions are ignored until restart.
async fn apply_policy_updates(
    policy: Arc<ArcSwap<PolicySet>>,
    mut updates: mpsc::UnboundedReceiver<EdgeConfig>,
) {
    while let Some(config) = updates.recv().await {
        match PolicySet::from_config(&config) {
            Ok(set) => {
                policy.store(Arc::new(set));
                metrics::record_reload(true);
                tracing::info!("Policy reloaded");
            }
            Err(e) => {
                metrics::record_reload(false);
                tracing::error!(error = %e, "Policy reload rejected, keeping current policy");
            }
        }
    }
}

/// Edge handler: every method, every path.
async fn edge_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Handling request"
    );

    match state.pipeline.handle(into_forwarded(request, peer)).await {
        Ok(response) => {
            let status = response.status();
            let branch = response
                .extensions()
                .get::<Branch>()
                .map_or("unknown", Branch::as_str);

            tracing::debug!(
                request_id = %request_id,
                status = status.as_u16(),
                branch,
                "Policy applied"
            );
            metrics::record_request(&method, status.as_u16(), branch, start_time);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                path = %path,
                kind = e.kind(),
                error = %e,
                "Request failed"
            );
            metrics::record_error(e.kind());
            metrics::record_request(&method, e.status().as_u16(), "error", start_time);
            e.into_response()
        }
    }
}
