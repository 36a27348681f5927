//! # docrelay: document upload and question relay
//!
//! `docrelay` is a small HTTP backend sitting between a browser client and a remote document
//! question-answering service. It owns no documents and no conversations: uploaded files go to
//! an S3 bucket, and everything about understanding them is delegated to the remote service.
//!
//! ## Request Flow
//!
//! An upload (`POST /api/upload`) is stored in the bucket under a unique key. The object's public
//! URL is then handed to the document service's ingestion endpoint, which answers with a
//! `session_id`. The client keeps that identifier and sends it along with every question
//! (`POST /api/chat`); questions are wrapped into the service's batch shape and the answer is
//! returned to the client exactly as received.
//!
//! Documents that are already publicly reachable can be registered by URL instead
//! (`POST /api/upload-url`), in which case nothing is stored.
//!
//! ## Modules
//!
//! - [`api`]: HTTP handlers and request/response models
//! - [`storage`]: the [`storage::ObjectStore`] seam and its S3 implementation
//! - [`upstream`]: the client for the document service
//! - [`config`]: YAML and environment configuration
//! - [`errors`]: the error type every handler returns
//! - [`telemetry`]: tracing setup
//!
//! ## Running
//!
//! ```bash
//! AWS_S3_BUCKET_NAME=docs AWS_S3_REGION=us-east-1 \
//! MODAL_UPLOAD_URL=https://... MODAL_CHAT_URL=https://... MODAL_API_TOKEN=... \
//! docrelay
//! ```
//!
//! The server listens on `0.0.0.0:8000` unless configured otherwise. See [`config`] for every
//! setting.

pub mod api;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod storage;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod upstream;

use crate::{
    config::{CorsConfig, CorsOrigin},
    openapi::ApiDoc,
    storage::{ObjectStore, S3Store},
    upstream::DocumentServiceClient,
};
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Shared state handed to every handler.
///
/// Requests share nothing mutable: the storage backend and the document service client are
/// both safe to use concurrently.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn ObjectStore>,
    pub upstream: DocumentServiceClient,
}

/// Build the CORS layer.
///
/// A wildcard combined with credentials cannot be expressed with `*` headers, so in that case the
/// request's own origin, method and headers are echoed back instead.
fn create_cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let wildcard = config.allowed_origins.contains(&CorsOrigin::Wildcard);

    let mut cors = if wildcard && !config.allow_credentials {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origin = if wildcard {
            AllowOrigin::mirror_request()
        } else {
            let mut origins = Vec::new();
            for origin in &config.allowed_origins {
                if let CorsOrigin::Url(url) = origin {
                    // Origins never carry a path, so `https://app.example.com/` becomes `https://app.example.com`
                    origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
                }
            }
            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(config.allow_credentials)
    };

    if let Some(max_age) = config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with every endpoint and middleware.
///
/// - `/api/upload`, `/api/upload-url`, `/api/chat`
/// - `/healthz`
/// - `/api-docs/openapi.json` and the rendered docs at `/docs`
/// - `/internal/metrics` when metrics are enabled
///
/// # Errors
///
/// Returns an error if the CORS configuration contains an origin that is not a valid header value.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Documents of any size are accepted
        .route(
            "/upload",
            post(api::handlers::upload::upload_document).layer(DefaultBodyLimit::disable()),
        )
        .route("/upload-url", post(api::handlers::upload::upload_url))
        .route("/chat", post(api::handlers::chat::chat));

    let cors_layer = create_cors_layer(&state.config.cors)?;
    let enable_metrics = state.config.enable_metrics;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(cors_layer);

    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled service: storage client, document service client and router.
///
/// 1. **Create**: [`Application::new`] builds the S3 and document service clients
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests until
///    the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting docrelay with configuration: {:#?}", config);

        let storage = S3Store::new(&config.storage).await;
        let upstream = DocumentServiceClient::new(&config.upstream)?;

        let state = AppState::builder()
            .config(config.clone())
            .storage(Arc::new(storage) as Arc<dyn ObjectStore>)
            .upstream(upstream)
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "docrelay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
