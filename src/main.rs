use coedit::config::Config;
use coedit::db;
use coedit::routes::app_router;
use coedit::services::DocumentStore;
use coedit::state::AppState;
use std::panic;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    let default_config = Config::default();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            default_config.default_log_filter().into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    info!("Service '{}' in {} mode", config.service_name, config.environment);

    // Open document storage
    let repo = match db::open_repository(&config).await {
        Ok(repo) => repo,
        Err(e) => {
            error!("Failed to open document storage: {}", e);
            std::process::exit(1);
        }
    };
    let state = AppState::new(DocumentStore::new(repo));

    let app_routes = app_router(state, &config);

    // Start the HTTP/API server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}
