/// Shared wire and job types used across the courier crates.
///
/// These types are the lingua franca of the client — the session, the
/// orchestrator, and the CLI all agree on these structures.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================
// JSON-RPC Types
// ============================================================

/// A JSON-RPC 2.0 message (request or response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID (None for notifications).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Method name (for requests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Parameters (for requests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Result (for responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error (for error responses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcMessage {
    /// Build a request envelope with a fresh unique id.
    ///
    /// Envelopes are immutable after construction; a new one is built for
    /// every call.
    pub fn request(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::Value::String(Uuid::new_v4().to_string())),
            method: Some(method.to_string()),
            params: Some(params),
            result: None,
            error: None,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// ============================================================
// Job Types
// ============================================================

/// Correlates the submit/status/result calls of one asynchronous job.
///
/// The `request_id` is extracted once from the submit response and reused
/// verbatim for every subsequent call — it is never re-derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    /// Opaque job identifier assigned by the server.
    pub request_id: String,
    /// Parameter name under which the identifier is passed to status/result
    /// calls (e.g. "request_id").
    pub id_param: String,
}

impl JobHandle {
    /// Arguments object addressing this job in a status or result call.
    pub fn as_args(&self) -> serde_json::Value {
        let mut args = serde_json::Map::new();
        args.insert(
            self.id_param.clone(),
            serde_json::Value::String(self.request_id.clone()),
        );
        serde_json::Value::Object(args)
    }
}

/// One observation of a job's status.
///
/// Produced fresh on each poll; the last snapshot before the poll loop exits
/// is retained as a fallback source for the download URL.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Lowercase-normalized status text ("unknown" when the payload names none).
    pub status: String,
    /// The most deeply-unwrapped payload object the status was read from.
    pub payload: serde_json::Value,
}

/// States of the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Submit call in flight.
    Submitting,
    /// Waiting for a terminal status.
    Polling,
    /// Status classified as completed.
    Completed,
    /// Status classified as failed.
    Failed,
    /// Poll budget exhausted.
    TimedOut,
}

impl JobState {
    /// Whether this state ends the job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }
}

/// Terminal result returned to the caller for a successful job.
///
/// A completed job without a resolvable download URL is still a success: the
/// report then carries a `note` instead of a `saved_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// The job identifier the run was correlated under.
    pub request_id: String,
    /// The terminal status text.
    pub status: String,
    /// Resolved artifact URL, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Where the artifact was written, if it was downloaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<PathBuf>,
    /// Degraded-success explanation when no artifact could be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Number of status checks issued before the terminal classification.
    pub polls: u32,
    /// When the job reached its terminal state.
    pub finished_at: DateTime<Utc>,
}
