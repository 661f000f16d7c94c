//! API request and response structures

use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{format_mm_ss, progress, StoreSummary, TimerSnapshot};

/// A timer plus the values a UI derives from it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: TimerSnapshot,
    pub progress: f64,
    pub formatted_remaining_time: String,
}

impl From<TimerSnapshot> for TimerView {
    fn from(timer: TimerSnapshot) -> Self {
        Self {
            progress: progress(timer.duration, timer.remaining_time),
            formatted_remaining_time: format_mm_ss(timer.remaining_time),
            timer,
        }
    }
}

pub fn timer_views(timers: Vec<TimerSnapshot>) -> Vec<TimerView> {
    timers.into_iter().map(TimerView::from).collect()
}

pub fn grouped_views(grouped: BTreeMap<String, Vec<TimerSnapshot>>) -> BTreeMap<String, Vec<TimerView>> {
    grouped
        .into_iter()
        .map(|(category, timers)| (category, timer_views(timers)))
        .collect()
}

/// Body of `POST /timers`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimerRequest {
    pub name: String,
    pub duration: i64,
    pub category: String,
    #[serde(default)]
    pub is_halfway_alert_enabled: bool,
}

/// Body of `PATCH /timers/:id`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditTimerRequest {
    pub name: Option<String>,
    pub duration: Option<i64>,
    pub category: Option<String>,
}

/// Body of `PUT /timers/:id/halfway-alert`
#[derive(Debug, Clone, Deserialize)]
pub struct HalfwayAlertRequest {
    pub enabled: bool,
}

/// Body of `POST /categories`
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategoryRequest {
    pub name: String,
}

/// Outcome of a command that affects several timers or records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub status: String,
    pub message: String,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

impl CountResponse {
    pub fn new(message: String, count: usize) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            count,
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a single-resource command, or an error explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ApiResponse {
    pub fn new(status: &str, message: String) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn ok(message: String) -> Self {
        Self::new("ok", message)
    }

    pub fn error(message: String) -> Self {
        Self::new("error", message)
    }
}

/// Response of `POST /export`
#[derive(Debug, Clone, Serialize)]
pub struct ExportResponse {
    pub path: String,
    pub count: usize,
}

/// Status response with store counts
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub summary: StoreSummary,
    pub running_timers: Vec<TimerView>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
