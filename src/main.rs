//! Study Timer - A background timer-state service
//!
//! This is the main entry point for the study-timer application.

use tokio::net::TcpListener;
use tracing::info;

use study_timer::{
    api::create_router,
    config::Config,
    state::AppState,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("study_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting study-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, db={}, cancel_milestones={}, restore_timers={}, notifications={:?}",
        config.host,
        config.port,
        config.db_path.display(),
        config.cancel_milestones,
        config.restore_timers,
        config.notifications
    );

    // Wire the store, registry and controller and start the command loop
    let state = AppState::launch(&config).await;

    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /messages   - START_TIMER, PAUSE_TIMER, STOP_TIMER, GET_TIMER_STATE, SYNC_STUDY_SESSION");
    info!("  POST /sync/:tag  - Connectivity restored (tag study-session-sync)");
    info!("  GET  /health     - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
