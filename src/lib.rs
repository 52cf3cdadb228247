//! Guardrail relay - a minimal chat relay in front of a Guardrail Gateway
//!
//! The relay accepts a single chat message from the browser, forwards it to the gateway's
//! chat completion endpoint under a fixed provider, and reports back whether the gateway
//! answered or rejected the prompt or the response.

use axum::Router;
use axum::routing::{get, post};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, instrument};

pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod target;

use client::{HttpClient, HyperClient, PoolConfig};
use handlers::{chat_handler, index_handler};
use target::Target;

/// The main application state containing the HTTP client and the gateway target
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub target: Arc<Target>,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(target: Target, pool: PoolConfig) -> Self {
        let http_client = client::create_hyper_client(pool);
        Self {
            http_client,
            target: Arc::new(target),
        }
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(target: Target, http_client: T) -> Self {
        Self {
            http_client,
            target: Arc::new(target),
        }
    }
}

/// Build the main router for the relay
/// This creates routes for:
/// - `/` - The chat page
/// - `/api/chat` - Forwards a message to the gateway
///
/// Panics anywhere below the router are turned into a JSON `Backend exception` response.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route("/", get(index_handler))
        .route("/api/chat", post(chat_handler::<T>))
        .layer(CatchPanicLayer::custom(errors::panic_response))
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// The prefix must be `'static` (or owned) since the layer lives for the whole process.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::Exact)
        .with_default_metrics()
        .build_pair()
}
