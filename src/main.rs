//! Timer Tracker - Personal countdown timers with categories, alerts and history
//!
//! This is the main entry point for the timer-tracker server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use timer_tracker::{
    api::{create_router, ApiState},
    config::Config,
    services::{read_import_file, FileStorage},
    state::TimerStore,
    tasks::{notification_task, LogNotifier},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("timer_tracker={},tower_http=info", config.log_level()))
        .init();

    let data_dir = config.data_dir();
    let export_dir = config.export_dir();
    info!("Starting timer-tracker server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_dir={}, export_dir={}",
        config.host,
        config.port,
        data_dir.display(),
        export_dir.display()
    );

    // Load persisted timers, history and categories
    let storage = Arc::new(FileStorage::new(data_dir));
    let store = TimerStore::open(storage).await;

    if let Some(path) = &config.import {
        match read_import_file(path).await {
            Ok(records) => {
                let imported = store.add_imported_timers(&records);
                info!("Imported {} timers from {}", imported, path.display());
            }
            Err(e) => warn!("Skipping import of {}: {}", path.display(), e),
        }
    }

    // Forward completion and halfway alerts
    tokio::spawn(notification_task(store.subscribe(), Arc::new(LogNotifier)));

    let state = Arc::new(ApiState::new(
        Arc::clone(&store),
        export_dir,
        config.port,
        config.host.clone(),
    ));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers                     - List timers");
    info!("  POST   /timers                     - Create a timer");
    info!("  GET    /timers/by-category         - Timers grouped by category");
    info!("  GET    /timers/:id                 - Show one timer");
    info!("  PATCH  /timers/:id                 - Edit name, duration or category");
    info!("  DELETE /timers/:id                 - Delete a timer");
    info!("  POST   /timers/:id/{{start,pause,reset,acknowledge}}");
    info!("  PUT    /timers/:id/halfway-alert   - Enable or disable the halfway alert");
    info!("  GET    /categories                 - List categories");
    info!("  POST   /categories                 - Add a category");
    info!("  POST   /categories/:name/{{start,pause,reset}}");
    info!("  GET    /logs                       - Completion history");
    info!("  GET    /export                     - Timers as JSON");
    info!("  POST   /export                     - Write an export file");
    info!("  POST   /import                     - Import timers");
    info!("  DELETE /data                       - Clear all data");
    info!("  GET    /status                     - Store counts and uptime");
    info!("  GET    /health                     - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    store.flush().await;
    info!("Server shutdown complete");
    Ok(())
}
