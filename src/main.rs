use std::sync::Arc;

use agora_backend::{
    build_router,
    config::AppConfig,
    realtime::{self, EventBus},
    store::MemoryStore,
    verify::JwtVerifier,
    AppState,
};

// ─── Main ──────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora_backend=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting Agora backend on {}:{}", config.host, config.port);

    // Optional Redis for cross-instance fan-out
    let redis = if config.redis_url.is_empty() {
        None
    } else {
        let client = redis::Client::open(config.redis_url.as_str())
            .expect("Failed to create Redis client");
        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .expect("Failed to connect to Redis");
        tracing::info!("Redis connected");
        Some(manager)
    };

    let store = Arc::new(MemoryStore::new());
    let events = EventBus::new(redis);
    realtime::start_subscriber(events.clone(), config.redis_url.clone());

    let verifier = Arc::new(JwtVerifier::new(&config.identity_jwt_secret));

    let state = AppState::new(config.clone(), store, events, verifier);

    // Ensure city communities and default groups exist
    state
        .directory
        .seed()
        .await
        .expect("Failed to seed community directory");

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Agora backend listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Agora backend shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
