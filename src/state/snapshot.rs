//! Plain-data snapshots and the record validator shared by hydration and import
//!
//! Stored and imported JSON is untrusted: fields may be missing, have the
//! wrong type, or carry stale runtime state. Every record goes through
//! [`validate_timer`] / [`validate_log`], which either produce a typed
//! snapshot or a [`Rejection`] explaining why the record was skipped.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::timer::TimerStatus;

/// Duration applied when a record carries no usable duration
pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Persisted form of a timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub id: String,
    pub name: String,
    pub duration: u64,
    pub category: String,
    pub remaining_time: u64,
    pub status: TimerStatus,
    pub is_halfway_alert_enabled: bool,
    pub halfway_alert_triggered: bool,
    pub completion_acknowledged: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Persisted form of a completion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerLogSnapshot {
    pub id: String,
    pub timer_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub completed_at: DateTime<Utc>,
    pub duration: u64,
}

/// Why a record was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotAnObject,
    MissingId,
    MissingName,
    MissingTimerName,
    NonPositiveDuration,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::NotAnObject => "record is not a JSON object",
            Rejection::MissingId => "record has no id",
            Rejection::MissingName => "record has no name",
            Rejection::MissingTimerName => "record has no timer name",
            Rejection::NonPositiveDuration => "record duration is zero or negative",
        };
        f.write_str(reason)
    }
}

/// Boundary a timer record is crossing; each applies its own defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    /// Previously persisted data read back at startup
    Hydration,
    /// A user-supplied import file
    Import,
}

impl RecordSource {
    fn default_name(&self) -> Option<&'static str> {
        match self {
            RecordSource::Hydration => None,
            RecordSource::Import => Some("Imported Timer"),
        }
    }

    fn default_category(&self) -> &'static str {
        match self {
            RecordSource::Hydration => "Uncategorized",
            RecordSource::Import => "Imported",
        }
    }
}

/// Validate a raw timer record into an idle snapshot
///
/// Runtime fields are never trusted: the result is idle, has its full
/// duration remaining, and carries no halfway or acknowledgement state.
pub fn validate_timer(raw: &Value, source: RecordSource) -> Result<TimerSnapshot, Rejection> {
    let record = raw.as_object().ok_or(Rejection::NotAnObject)?;

    let id = match (coerce_string(record.get("id")), source) {
        (Some(id), _) => id,
        (None, RecordSource::Import) => new_id(),
        (None, RecordSource::Hydration) => return Err(Rejection::MissingId),
    };

    let name = match (coerce_string(record.get("name")), source.default_name()) {
        (Some(name), _) => name,
        (None, Some(default)) => default.to_string(),
        (None, None) => return Err(Rejection::MissingName),
    };

    let duration = match (coerce_duration(record.get("duration")), source) {
        (DurationField::Valid(secs), _) => secs,
        (DurationField::Absent, _) | (DurationField::Invalid, RecordSource::Import) => {
            DEFAULT_DURATION_SECS
        }
        (DurationField::Invalid, RecordSource::Hydration) => {
            return Err(Rejection::NonPositiveDuration)
        }
    };

    let category = coerce_string(record.get("category"))
        .unwrap_or_else(|| source.default_category().to_string());

    Ok(TimerSnapshot {
        id,
        name,
        duration,
        category,
        remaining_time: duration,
        status: TimerStatus::Idle,
        is_halfway_alert_enabled: coerce_bool(record.get("isHalfwayAlertEnabled")),
        halfway_alert_triggered: false,
        completion_acknowledged: false,
        created_at: coerce_timestamp(record.get("createdAt")),
    })
}

/// Validate a raw completion record
pub fn validate_log(raw: &Value) -> Result<TimerLogSnapshot, Rejection> {
    let record = raw.as_object().ok_or(Rejection::NotAnObject)?;

    let id = coerce_string(record.get("id")).ok_or(Rejection::MissingId)?;
    let timer_name = coerce_string(record.get("timerName")).ok_or(Rejection::MissingTimerName)?;
    let duration = match coerce_duration(record.get("duration")) {
        DurationField::Valid(secs) => secs,
        DurationField::Absent | DurationField::Invalid => 0,
    };

    Ok(TimerLogSnapshot {
        id,
        timer_name,
        completed_at: coerce_timestamp(record.get("completedAt")),
        duration,
    })
}

/// Fresh globally unique id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Read a string field, accepting numbers and booleans as their text form
fn coerce_string(field: Option<&Value>) -> Option<String> {
    let text = match field? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

enum DurationField {
    Absent,
    Invalid,
    Valid(u64),
}

/// Read a duration in whole seconds; fractions are truncated
fn coerce_duration(field: Option<&Value>) -> DurationField {
    let seconds = match field {
        None | Some(Value::Null) => return DurationField::Absent,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match seconds {
        Some(secs) if secs.is_finite() && secs >= 1.0 => DurationField::Valid(secs.trunc() as u64),
        _ => DurationField::Invalid,
    }
}

fn coerce_bool(field: Option<&Value>) -> bool {
    match field {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Read a timestamp stored as epoch milliseconds or RFC 3339; defaults to now
fn coerce_timestamp(field: Option<&Value>) -> DateTime<Utc> {
    let parsed = match field {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single())),
        _ => None,
    };
    parsed.unwrap_or_else(Utc::now)
}

/// Validate a stored category list: trimmed, non-empty, first occurrence wins
pub fn validate_categories(raw: &Value) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for item in raw.as_array().map(Vec::as_slice).unwrap_or_default() {
        if let Some(name) = item.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            if !categories.iter().any(|c| c == name) {
                categories.push(name.to_string());
            }
        }
    }
    categories
}
