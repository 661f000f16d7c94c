//! HTTP endpoint handlers

use std::{collections::BTreeMap, sync::Arc};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    services::{export_timers, TransferError},
    state::{TimerLogSnapshot, TimerSnapshot, TimerStatus},
};
use super::{
    responses::{
        grouped_views, timer_views, ApiResponse, CountResponse, CreateTimerRequest,
        EditTimerRequest, ExportResponse, HalfwayAlertRequest, HealthResponse,
        NewCategoryRequest, StatusResponse, TimerView,
    },
    ApiState,
};

type ApiError = (StatusCode, Json<ApiResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(format!("No timer with id {}", id))),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message.into())))
}

/// Look up a timer after a command; a vanished timer is reported as not found
fn timer_view(state: &ApiState, id: &str) -> ApiResult<TimerView> {
    state
        .store
        .find_timer(id)
        .map(|timer| Json(TimerView::from(timer)))
        .ok_or_else(|| not_found(id))
}

/// Handle GET /timers - All timers in creation order
pub async fn list_timers_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<TimerView>> {
    Json(timer_views(state.store.timers()))
}

/// Handle GET /timers/by-category - Timers grouped by category
pub async fn timers_by_category_handler(
    State(state): State<Arc<ApiState>>,
) -> Json<BTreeMap<String, Vec<TimerView>>> {
    Json(grouped_views(state.store.timers_by_category()))
}

/// Handle POST /timers - Create a timer
pub async fn create_timer_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateTimerRequest>,
) -> Result<(StatusCode, Json<TimerView>), ApiError> {
    let name = request.name.trim();
    let category = request.category.trim();
    if name.is_empty() {
        return Err(bad_request("Timer name must not be empty"));
    }
    if category.is_empty() {
        return Err(bad_request("Timer category must not be empty"));
    }
    if request.duration <= 0 {
        return Err(bad_request("Timer duration must be a positive number of seconds"));
    }

    let timer = state.store.add_timer(
        name,
        request.duration as u64,
        category,
        request.is_halfway_alert_enabled,
    );
    Ok((StatusCode::CREATED, Json(TimerView::from(timer))))
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    timer_view(&state, &id)
}

/// Handle PATCH /timers/:id - Rename, change duration or recategorize
pub async fn edit_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(request): Json<EditTimerRequest>,
) -> ApiResult<TimerView> {
    if state.store.find_timer(&id).is_none() {
        return Err(not_found(&id));
    }
    if let Some(duration) = request.duration {
        if duration <= 0 {
            return Err(bad_request("Timer duration must be a positive number of seconds"));
        }
        state.store.set_timer_duration(&id, duration as u64);
    }
    if let Some(name) = &request.name {
        state.store.rename_timer(&id, name);
    }
    if let Some(category) = &request.category {
        state.store.set_timer_category(&id, category);
    }
    timer_view(&state, &id)
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse> {
    if state.store.remove_timer(&id) {
        Ok(Json(ApiResponse::ok(format!("Timer {} deleted", id))))
    } else {
        Err(not_found(&id))
    }
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    if !state.store.start_timer(&id) {
        return Err(not_found(&id));
    }
    timer_view(&state, &id)
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    if !state.store.pause_timer(&id) {
        return Err(not_found(&id));
    }
    timer_view(&state, &id)
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    if !state.store.reset_timer(&id) {
        return Err(not_found(&id));
    }
    timer_view(&state, &id)
}

/// Handle POST /timers/:id/acknowledge - Dismiss a completion
pub async fn acknowledge_timer_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    if !state.store.acknowledge_completion(&id) {
        return Err(not_found(&id));
    }
    timer_view(&state, &id)
}

/// Handle PUT /timers/:id/halfway-alert
pub async fn halfway_alert_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(request): Json<HalfwayAlertRequest>,
) -> ApiResult<TimerView> {
    if !state.store.toggle_halfway_alert(&id, request.enabled) {
        return Err(not_found(&id));
    }
    timer_view(&state, &id)
}

/// Handle GET /categories - Known and in-use categories, sorted
pub async fn list_categories_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<String>> {
    Json(state.store.categories())
}

/// Handle POST /categories - Add a category
pub async fn add_category_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<NewCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(bad_request("Category name must not be empty"));
    }
    if state.store.add_new_category(name) {
        Ok((StatusCode::CREATED, Json(ApiResponse::ok(format!("Category \"{}\" added", name)))))
    } else {
        Ok((StatusCode::OK, Json(ApiResponse::ok(format!("Category \"{}\" already exists", name)))))
    }
}

/// Handle POST /categories/:name/start
pub async fn start_category_handler(
    State(state): State<Arc<ApiState>>,
    Path(category): Path<String>,
) -> Json<CountResponse> {
    let count = state.store.start_category_timers(&category);
    Json(CountResponse::new(format!("Started {} timers in {}", count, category), count))
}

/// Handle POST /categories/:name/pause
pub async fn pause_category_handler(
    State(state): State<Arc<ApiState>>,
    Path(category): Path<String>,
) -> Json<CountResponse> {
    let count = state.store.pause_category_timers(&category);
    Json(CountResponse::new(format!("Paused {} timers in {}", count, category), count))
}

/// Handle POST /categories/:name/reset
pub async fn reset_category_handler(
    State(state): State<Arc<ApiState>>,
    Path(category): Path<String>,
) -> Json<CountResponse> {
    let count = state.store.reset_category_timers(&category);
    Json(CountResponse::new(format!("Reset {} timers in {}", count, category), count))
}

/// Handle GET /logs - Completion history, newest first
pub async fn logs_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<TimerLogSnapshot>> {
    Json(state.store.sorted_timer_logs())
}

/// Handle GET /export - Timer snapshots as a JSON array
pub async fn export_json_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<TimerSnapshot>> {
    Json(state.store.timers())
}

/// Handle POST /export - Write an export file to the export directory
pub async fn export_file_handler(State(state): State<Arc<ApiState>>) -> ApiResult<ExportResponse> {
    let timers = state.store.timers();
    match export_timers(&state.export_dir, &timers).await {
        Ok(path) => Ok(Json(ExportResponse {
            path: path.display().to_string(),
            count: timers.len(),
        })),
        Err(TransferError::NothingToExport) => Err(bad_request("There are no timers to export")),
        Err(e) => {
            error!("Timer export failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Could not export timers: {}", e))),
            ))
        }
    }
}

/// Handle POST /import - Import a JSON array of timer snapshots
pub async fn import_handler(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<Value>,
) -> ApiResult<CountResponse> {
    let Value::Array(records) = body else {
        warn!("Rejected import: body is not a JSON array");
        return Err(bad_request("Import body must be a JSON array of timers"));
    };

    let count = state.store.add_imported_timers(&records);
    let message = if count > 0 {
        format!("{} new timer(s) imported", count)
    } else {
        "No new timers to import or all timers already exist".to_string()
    };
    Ok(Json(CountResponse::new(message, count)))
}

/// Handle DELETE /data - Remove every timer, log and user category
pub async fn clear_data_handler(State(state): State<Arc<ApiState>>) -> Json<ApiResponse> {
    state.store.clear_all_data();
    info!("Clear-data endpoint called");
    Json(ApiResponse::ok("All data cleared".to_string()))
}

/// Handle GET /status - Return store counts and running timers
pub async fn status_handler(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let running = state
        .store
        .timers()
        .into_iter()
        .filter(|t| t.status == TimerStatus::Running)
        .collect();

    Json(StatusResponse {
        summary: state.store.summary(),
        running_timers: timer_views(running),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
