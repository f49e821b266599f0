//! OCR Studio API Gateway
//!
//! HTTP front end of the task service.
//! Handles:
//! - Task, document, analytics, and config discovery routes
//! - Rate limiting
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use ocrstudio_common::{
    config::{AppConfig, ObservabilityConfig},
    db::create_task_store,
    metrics::{self, LATENCY_BUCKETS, METRICS_PREFIX, UPLOAD_BUCKETS},
    service::TaskService,
    storage::FileSystemBlobStore,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tower::limit::ConcurrencyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: Arc<TaskService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting OCR Studio API Gateway v{}", ocrstudio_common::VERSION);

    // Initialize metrics
    install_metrics_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Task store and file storage
    let store = create_task_store(&config.database).await?;
    tokio::fs::create_dir_all(&config.ocr.root_path).await?;
    info!(root = %config.ocr.root_path.display(), "File storage ready");
    let blobs = Arc::new(FileSystemBlobStore::new(&config.ocr.root_path));

    // Create app state
    let state = AppState {
        config: config.clone(),
        service: Arc::new(TaskService::new(store, blobs)),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // In-flight requests get `shutdown_timeout` to drain after a signal
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    let drain_timeout = config.shutdown_timeout();
    tokio::select! {
        result = &mut server => result?,
        _ = async {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(drain_timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::warn!(timeout_secs = drain_timeout.as_secs(), "Graceful shutdown timed out");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_upload_duration_seconds", METRICS_PREFIX)),
            UPLOAD_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let server = &state.config.server;

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Multipart framing needs headroom over the file payload limit
    let body_limit = server.max_upload_bytes.saturating_add(1024 * 1024);

    // API routes
    let mut api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Task endpoints
        .route(
            "/task",
            get(handlers::tasks::list_tasks).post(handlers::tasks::create_task),
        )
        .route("/task/page", get(handlers::tasks::list_tasks_page))
        .route("/task/draft", post(handlers::tasks::create_draft))
        .route(
            "/task/{id}",
            get(handlers::tasks::get_task).delete(handlers::tasks::delete_task),
        )
        .route("/task/config/{id}", put(handlers::tasks::update_ocr_config))
        .route(
            "/task/scheduler/{id}",
            put(handlers::tasks::update_scheduler_config),
        )
        .route("/task/language/{id}", patch(handlers::tasks::update_language))

        // Document endpoints
        .route("/task/upload/{id}", put(handlers::tasks::upload_documents))
        .route("/task/file/{id}", delete(handlers::tasks::remove_file))

        // Analytics endpoints
        .route(
            "/task/analytic/count-by-status",
            get(handlers::analytics::count_by_status),
        )
        .route(
            "/task/analytic/average-in-documents",
            get(handlers::analytics::average_in_documents),
        )

        // Config discovery endpoints
        .route("/config/engine-mode", get(handlers::config_options::engine_modes))
        .route(
            "/config/page-segmentation-mode",
            get(handlers::config_options::page_segmentation_modes),
        )
        .route("/config/file-format", get(handlers::config_options::file_formats))
        .route_layer(axum_middleware::from_fn(middleware::metrics::track_metrics));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(&state.config.rate_limit);
        api_routes = api_routes.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
