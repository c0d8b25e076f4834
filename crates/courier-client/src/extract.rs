//! Tolerant extraction of job metadata from tool results.
//!
//! Backend tools return job metadata inconsistently: as flat fields on the
//! result object, or re-encoded as a JSON string inside a generic list of
//! content items (each item carries a `text` field whose value may itself be
//! a JSON document, or a bare URL). The heuristics here isolate all of that
//! variability so the orchestrator stays a clean state machine.
//!
//! Each heuristic is a small pure lookup; they compose by first-success.
//! Malformed nested JSON is a non-match, never an error.

use serde_json::Value;

use courier_types::errors::CourierError;
use courier_types::protocol::StatusSnapshot;

/// Field names that may carry a job identifier, in priority order.
pub const ID_FIELDS: &[&str] = &[
    "request_id",
    "requestId",
    "session_id",
    "sessionId",
    "id",
    "job_id",
    "jobId",
];

/// Field names that may carry a result URL, in priority order.
pub const URL_FIELDS: &[&str] = &[
    "url",
    "download_url",
    "downloadUrl",
    "output_url",
    "outputUrl",
    "result_url",
];

/// Status reported when the payload names none.
const STATUS_UNKNOWN: &str = "unknown";

/// Extract the job identifier from a submit response.
///
/// Tries [`ID_FIELDS`] on the top-level payload first, then on each
/// JSON-unwrapped content item. The first non-empty value wins. Exhaustion
/// is a terminal error for the whole job.
pub fn extract_job_id(payload: &Value) -> Result<String, CourierError> {
    if let Some(id) = lookup_fields(payload, ID_FIELDS) {
        return Ok(id);
    }
    for item in unwrapped_content_items(payload) {
        if let Some(id) = lookup_fields(&item, ID_FIELDS) {
            return Ok(id);
        }
    }
    Err(CourierError::Extraction { tried: ID_FIELDS })
}

/// Extract the status text and canonical payload from a status response.
///
/// Reads `status`, else `state`, else `"unknown"` from the top level. When
/// the payload carries a content list, the first item that unwraps to a JSON
/// object becomes the canonical snapshot payload, and its `status`/`state`
/// (if present) takes precedence over the top-level value. The status text
/// is always lowercased.
pub fn extract_status(payload: &Value) -> StatusSnapshot {
    let mut status = lookup_status(payload);
    let mut snapshot = payload.clone();

    let mut first_unwrapped = None;
    for item in unwrapped_content_items(payload) {
        if first_unwrapped.is_none() {
            first_unwrapped = Some(item.clone());
        }
        if let Some(inner) = lookup_status(&item) {
            status = Some(inner);
            snapshot = item;
            first_unwrapped = None;
            break;
        }
    }
    // No unwrapped item named a status, but unwrapping did succeed: the
    // unwrapped object is still the deeper payload.
    if let Some(item) = first_unwrapped {
        snapshot = item;
    }

    StatusSnapshot {
        status: status
            .unwrap_or_else(|| STATUS_UNKNOWN.to_string())
            .to_lowercase(),
        payload: snapshot,
    }
}

/// Extract a result/download URL, if one is present.
///
/// Tries [`URL_FIELDS`] and then `images[0].url` on the top-level payload,
/// then repeats both checks on each JSON-unwrapped content item. A content
/// item whose text is not valid JSON but starts with `http` is taken as a
/// bare URL. Absence is not an error at this layer.
pub fn extract_url(payload: &Value) -> Option<String> {
    if let Some(url) = url_from_object(payload) {
        return Some(url);
    }
    for text in content_item_texts(payload) {
        match serde_json::from_str::<Value>(text) {
            Ok(inner) => {
                if let Some(url) = url_from_object(&inner) {
                    return Some(url);
                }
            }
            Err(_) => {
                if text.starts_with("http") {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

/// URL checks against one object: named fields first, then `images[0].url`.
fn url_from_object(value: &Value) -> Option<String> {
    if let Some(url) = lookup_fields(value, URL_FIELDS) {
        return Some(url);
    }
    value
        .get("images")?
        .as_array()?
        .first()?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

/// First non-empty value among `fields` on a JSON object, in order.
///
/// String values must be non-empty; numbers are accepted and stringified
/// (some backends return numeric job ids). Anything else is skipped.
fn lookup_fields(value: &Value, fields: &[&str]) -> Option<String> {
    let obj = value.as_object()?;
    for field in fields {
        match obj.get(*field) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// `status` else `state`, as a string.
fn lookup_status(value: &Value) -> Option<String> {
    value
        .get("status")
        .or_else(|| value.get("state"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Text payloads of the content items, if the payload carries a content list.
fn content_item_texts(value: &Value) -> impl Iterator<Item = &str> {
    value
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
}

/// Content item texts that parse as JSON objects.
fn unwrapped_content_items(value: &Value) -> impl Iterator<Item = Value> + '_ {
    content_item_texts(value)
        .filter_map(|text| serde_json::from_str::<Value>(text).ok())
        .filter(Value::is_object)
}
