//! Provider status normalization.
//!
//! Every backend reports task state in its own vocabulary: plain strings,
//! objects that carry the state under one of several keys, or numeric code
//! tables. [`normalize_status`] folds all of them into an uppercase
//! diagnostic label plus an optional 0-100 progress value.
//!
//! The label is informational only. The authoritative job state is derived
//! from it through [`NormalizedStatus::outcome`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::provider::Provider;

/// Label used when no status could be located in a payload.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Keys probed, in order, when a status is nested inside an object.
const STATUS_KEYS: [&str; 6] = ["status", "state", "code", "name", "type", "value"];

/// Wrapper objects some providers put the task record under.
const ENVELOPE_KEYS: [&str; 3] = ["data", "result", "task"];

/// Maximum object nesting followed while probing for a status.
const MAX_STATUS_DEPTH: usize = 4;

/// Non-integral values up to this magnitude are read as 0-1 fractions.
const FRACTION_CEILING: f64 = 2.0;

const SUCCESS_LABELS: &[&str] = &[
    "SUCCEEDED",
    "SUCCESS",
    "SUCCESSFUL",
    "COMPLETED",
    "COMPLETE",
    "DONE",
    "FINISHED",
];

const FAILURE_LABELS: &[&str] = &[
    "FAILED",
    "FAILURE",
    "ERROR",
    "ERRORED",
    "CANCELED",
    "CANCELLED",
    "EXPIRED",
    "TIMEOUT",
    "TIMED_OUT",
    "REJECTED",
];

static LOG_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)\s*%").expect("static regex"));

/// A provider status reduced to the shared vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedStatus {
    /// Uppercase, underscore-separated diagnostic label.
    pub label: String,
    /// Completion percentage; `None` means unknown, which is not the same as 0.
    pub progress_percent: Option<i16>,
}

/// Coarse classification of a normalized label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Pending,
    Succeeded,
    Failed,
}

impl NormalizedStatus {
    pub fn outcome(&self) -> TaskOutcome {
        classify_label(&self.label)
    }
}

/// Classify a diagnostic label as success-like, failure-like, or neither.
pub fn classify_label(label: &str) -> TaskOutcome {
    if SUCCESS_LABELS.contains(&label) {
        TaskOutcome::Succeeded
    } else if FAILURE_LABELS.contains(&label) {
        TaskOutcome::Failed
    } else {
        TaskOutcome::Pending
    }
}

/// Normalize a raw provider payload.
pub fn normalize_status(provider: Provider, payload: &Value) -> NormalizedStatus {
    match provider {
        Provider::Meshy => normalize_meshy(payload),
        Provider::Replicate => normalize_replicate(payload),
        Provider::Photogrammetry => normalize_photogrammetry(payload),
        Provider::Mock => NormalizedStatus {
            label: raw_status_label(payload, None).unwrap_or_else(|| UNKNOWN_LABEL.into()),
            progress_percent: find_progress(payload),
        },
    }
}

/// Map a photogrammetry engine status code to its label.
///
/// Unknown codes keep the raw number in the label instead of being dropped.
pub fn photogrammetry_code_label(code: i64) -> String {
    match code {
        10 => "QUEUED".to_string(),
        20 => "RUNNING".to_string(),
        30 => "FAILED".to_string(),
        40 => "COMPLETED".to_string(),
        50 => "CANCELED".to_string(),
        other => format!("STATUS_{other}"),
    }
}

/// Normalize a progress value.
///
/// Accepts numbers and numeric strings (an optional trailing `%` forces a
/// percentage reading). Integral values are percentages; non-integral values
/// no larger than 2 in magnitude are fractions of 1. The result is clamped to
/// 0..=100 and rounded. Anything non-numeric yields `None`.
pub fn normalize_progress(value: &Value) -> Option<i16> {
    match value {
        Value::Number(n) => {
            let raw = n.as_f64()?;
            let integral = n.is_i64() || n.is_u64();
            percent_from(raw, integral)
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(percent) = trimmed.strip_suffix('%') {
                let raw: f64 = percent.trim().parse().ok()?;
                return clamp_percent(raw);
            }
            let raw: f64 = trimmed.parse().ok()?;
            let integral = !trimmed.contains(['.', 'e', 'E']);
            percent_from(raw, integral)
        }
        _ => None,
    }
}

/// Clamp an already-percentage value into 0..=100 and round it.
pub fn clamp_percent(raw: f64) -> Option<i16> {
    if !raw.is_finite() {
        return None;
    }
    Some(raw.clamp(0.0, 100.0).round() as i16)
}

fn percent_from(raw: f64, integral: bool) -> Option<i16> {
    if !integral && raw.abs() <= FRACTION_CEILING {
        clamp_percent(raw * 100.0)
    } else {
        clamp_percent(raw)
    }
}

// ---------------------------------------------------------------------------
// Per-provider readers
// ---------------------------------------------------------------------------

/// Meshy reports `status` as a string and `progress` as a percent, though
/// fractional readings have been seen on the multi-image endpoint.
fn normalize_meshy(payload: &Value) -> NormalizedStatus {
    let label = payload
        .get("status")
        .and_then(Value::as_str)
        .and_then(label_from_str)
        .or_else(|| raw_status_label(payload, None))
        .unwrap_or_else(|| UNKNOWN_LABEL.into());

    let progress_percent = payload.get("progress").and_then(normalize_progress);

    NormalizedStatus {
        label,
        progress_percent,
    }
}

/// Replicate reports `status` as a string; progress only shows up in logs.
fn normalize_replicate(payload: &Value) -> NormalizedStatus {
    let label = raw_status_label(payload, None).unwrap_or_else(|| UNKNOWN_LABEL.into());

    let progress_percent = find_progress(payload).or_else(|| {
        payload
            .get("logs")
            .and_then(Value::as_str)
            .and_then(progress_from_logs)
    });

    NormalizedStatus {
        label,
        progress_percent,
    }
}

/// The photogrammetry engine uses numeric codes, sometimes wrapped in `data`.
fn normalize_photogrammetry(payload: &Value) -> NormalizedStatus {
    NormalizedStatus {
        label: raw_status_label(payload, Some(photogrammetry_code_label))
            .unwrap_or_else(|| UNKNOWN_LABEL.into()),
        progress_percent: find_progress(payload),
    }
}

// ---------------------------------------------------------------------------
// Shape probing
// ---------------------------------------------------------------------------

type CodeTable = fn(i64) -> String;

/// Locate a status anywhere plausible in the payload and turn it into a label.
fn raw_status_label(payload: &Value, codes: Option<CodeTable>) -> Option<String> {
    if let Some(label) = label_from_value(payload, codes, 0) {
        return Some(label);
    }
    let obj = payload.as_object()?;
    ENVELOPE_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|inner| label_from_value(inner, codes, 1))
}

fn label_from_value(value: &Value, codes: Option<CodeTable>, depth: usize) -> Option<String> {
    if depth > MAX_STATUS_DEPTH {
        return None;
    }
    match value {
        Value::String(s) => match (codes, s.trim().parse::<i64>()) {
            (Some(table), Ok(code)) => Some(table(code)),
            _ => label_from_str(s),
        },
        Value::Number(n) => {
            let code = n.as_i64()?;
            Some(match codes {
                Some(table) => table(code),
                None => format!("CODE_{code}"),
            })
        }
        Value::Object(obj) => STATUS_KEYS
            .iter()
            .filter_map(|key| obj.get(*key))
            .find_map(|inner| label_from_value(inner, codes, depth + 1)),
        _ => None,
    }
}

fn label_from_str(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect(),
    )
}

/// Probe `progress` at the top level and inside the usual envelopes.
fn find_progress(payload: &Value) -> Option<i16> {
    let obj = payload.as_object()?;
    if let Some(progress) = obj.get("progress").and_then(normalize_progress) {
        return Some(progress);
    }
    ENVELOPE_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(|inner| inner.get("progress"))
        .find_map(normalize_progress)
}

/// Take the last `NN%` marker in a log stream.
fn progress_from_logs(logs: &str) -> Option<i16> {
    LOG_PERCENT
        .captures_iter(logs)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(clamp_percent)
}
