//! Last-resort searches over untyped provider payloads.
//!
//! Adapters parse the shapes they know first and only fall back to these
//! scans when the typed path finds nothing.

use reqwest::Url;
use serde_json::{Map, Value};

/// File extensions recognised as 3D deliverables or bundles of them.
pub const MODEL_EXTENSIONS: &[&str] = &["glb", "gltf", "obj", "fbx", "usdz", "stl", "ply", "zip"];

/// Keys whose string values are taken as result URLs even without a
/// recognised extension (signed URLs often have none).
const RESULT_KEYS: &[&str] = &[
    "glb",
    "model",
    "model_url",
    "model_file",
    "mesh",
    "output",
    "result",
    "result_url",
    "archive_url",
    "download_url",
    "url",
];

/// Subtrees that echo request inputs and never hold results.
const SKIP_KEYS: &[&str] = &["input", "inputs", "urls", "image_url", "image_urls"];

const ERROR_KEYS: &[&str] = &["error", "message", "detail", "failure_reason", "reason"];
const ERROR_ENVELOPES: &[&str] = &["task_error", "data", "result", "task"];

const MAX_DEPTH: usize = 8;

pub fn is_http_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("https://") || s.starts_with("http://")
}

/// Lowercased extension of the last path segment, ignoring query strings.
pub fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn has_model_extension(url: &str) -> bool {
    url_extension(url).is_some_and(|ext| MODEL_EXTENSIONS.contains(&ext.as_str()))
}

/// A URL string, or the first URL string in an array.
pub fn first_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_http_url(s) => Some(s.trim().to_string()),
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::String(s) if is_http_url(s) => Some(s.trim().to_string()),
            _ => None,
        }),
        _ => None,
    }
}

/// Recursively search a payload for a result URL.
///
/// Prefers any URL with a 3D file extension; otherwise takes the first URL
/// stored under a result-like key. Input echoes are skipped.
pub fn find_model_url(value: &Value) -> Option<String> {
    let mut by_extension = None;
    let mut by_key = None;
    walk(value, None, 0, &mut by_extension, &mut by_key);
    by_extension.or(by_key)
}

fn walk(
    value: &Value,
    key: Option<&str>,
    depth: usize,
    by_extension: &mut Option<String>,
    by_key: &mut Option<String>,
) {
    if depth > MAX_DEPTH || by_extension.is_some() {
        return;
    }
    match value {
        Value::String(s) if is_http_url(s) => {
            if has_model_extension(s) {
                *by_extension = Some(s.trim().to_string());
            } else if by_key.is_none() && key.is_some_and(|k| RESULT_KEYS.contains(&k)) {
                *by_key = Some(s.trim().to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, key, depth + 1, by_extension, by_key);
            }
        }
        Value::Object(map) => walk_object(map, depth, by_extension, by_key),
        _ => {}
    }
}

fn walk_object(
    map: &Map<String, Value>,
    depth: usize,
    by_extension: &mut Option<String>,
    by_key: &mut Option<String>,
) {
    for (key, inner) in map {
        if SKIP_KEYS.contains(&key.as_str()) {
            continue;
        }
        walk(inner, Some(key.as_str()), depth + 1, by_extension, by_key);
    }
}

/// Find a human-readable failure message at the top level or inside the
/// usual envelopes.
pub fn find_error_message(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    if let Some(message) = error_in(obj) {
        return Some(message);
    }
    ERROR_ENVELOPES
        .iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(Value::as_object)
        .find_map(error_in)
}

fn error_in(obj: &Map<String, Value>) -> Option<String> {
    ERROR_KEYS
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        })
}
