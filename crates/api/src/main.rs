use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelforge_api::config::ServerConfig;
use modelforge_api::router::build_app_router;
use modelforge_api::state::AppState;
use modelforge_api::ws;
use modelforge_db::store::PgJobStore;
use modelforge_pipeline::{LocalStore, Materializer, Orchestrator, PipelineConfig};
use modelforge_providers::{ProviderRegistry, ProvidersConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "modelforge_api=debug,modelforge_pipeline=debug,modelforge_providers=debug,tower_http=debug"
            .into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pipeline_config = PipelineConfig::from_env();
    let providers_config = ProvidersConfig::from_env();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = modelforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    modelforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    modelforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Storage ---
    let storage = LocalStore::new(&config.storage.root, &config.storage.public_base_url);
    tracing::info!(
        root = %config.storage.root.display(),
        public_base_url = %config.storage.public_base_url,
        "File storage configured",
    );

    // --- Providers ---
    let providers = ProviderRegistry::from_config(&providers_config);
    for info in providers.describe() {
        tracing::info!(
            provider = %info.name,
            configured = info.configured,
            reason = info.reason.as_deref().unwrap_or(""),
            "Provider availability",
        );
    }

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Orchestrator ---
    let materializer = Arc::new(
        Materializer::new(
            storage.clone(),
            pipeline_config.download_timeout,
            pipeline_config.max_artifact_bytes,
        )
        .expect("Failed to build artifact download client"),
    );
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(PgJobStore::new(pool)),
        providers,
        materializer,
        Arc::new(ws::WsJobPublisher::new(Arc::clone(&ws_manager))),
        pipeline_config,
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        ws_manager: Arc::clone(&ws_manager),
        storage,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Let in-flight dispatches record their task ids; anything cut off here
    // is failed as abandoned on its next read.
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if orchestrator.drain(grace).await {
        tracing::info!("Pending dispatches finished");
    } else {
        tracing::warn!(
            grace_secs = config.shutdown_timeout_secs,
            "Dispatches still running at shutdown"
        );
    }

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
