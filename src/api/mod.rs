//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::{path::PathBuf, sync::Arc, time::Instant};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::TimerStore;
use handlers::*;

/// Shared state handed to every handler
#[derive(Debug)]
pub struct ApiState {
    pub store: Arc<TimerStore>,
    /// Where `POST /export` writes files
    pub export_dir: PathBuf,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl ApiState {
    pub fn new(store: Arc<TimerStore>, export_dir: PathBuf, port: u16, host: String) -> Self {
        Self {
            store,
            export_dir,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler).post(create_timer_handler))
        .route("/timers/by-category", get(timers_by_category_handler))
        .route(
            "/timers/:id",
            get(get_timer_handler).patch(edit_timer_handler).delete(delete_timer_handler),
        )
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/timers/:id/acknowledge", post(acknowledge_timer_handler))
        .route("/timers/:id/halfway-alert", put(halfway_alert_handler))
        .route("/categories", get(list_categories_handler).post(add_category_handler))
        .route("/categories/:name/start", post(start_category_handler))
        .route("/categories/:name/pause", post(pause_category_handler))
        .route("/categories/:name/reset", post(reset_category_handler))
        .route("/logs", get(logs_handler))
        .route("/export", get(export_json_handler).post(export_file_handler))
        .route("/import", post(import_handler))
        .route("/data", delete(clear_data_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
