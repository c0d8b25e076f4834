//! Protocol session over JSON-RPC/HTTP.
//!
//! Maintains one logical session across multiple remote tool invocations:
//! - HTTP POST for JSON-RPC requests (`initialize`, `tools/call`)
//! - Session correlation via the `Mcp-Session-Id` header, generated
//!   client-side and overwritten by the server's handshake response
//! - JSON and SSE (`text/event-stream`) response bodies
//!
//! The handshake runs lazily on the first tool call, so callers never need
//! to sequence initialize-then-call manually. The session id is attached to
//! every request, not just the handshake — servers use it to correlate
//! state across calls.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use courier_types::errors::CourierError;
use courier_types::protocol::JsonRpcMessage;
use courier_types::traits::ToolCaller;

/// Protocol version sent in the initialize handshake.
const PROTOCOL_VERSION: &str = "2025-06-18";

/// Header carrying the session identifier.
const SESSION_HEADER: &str = "mcp-session-id";

// ============================================================
// Configuration
// ============================================================

/// Configuration for a protocol session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Full URL of the server endpoint (e.g. `https://tools.example.com/mcp`).
    pub endpoint: String,
    /// Additional headers to include in every request (e.g. auth tokens).
    pub headers: HashMap<String, String>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for a complete request/response exchange.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            headers: HashMap::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================
// SSE Body Parsing
// ============================================================

/// A parsed event from a `text/event-stream` body.
#[derive(Debug, Default)]
struct SseEvent {
    /// The `event:` field (event type).
    event: Option<String>,
    /// The `data:` field (accumulated across multiple `data:` lines).
    data: String,
}

/// Parse a raw SSE body into individual events.
///
/// Events are separated by blank lines. `:` comment lines are skipped and
/// multiple `data:` lines within one event are joined with newlines.
fn parse_sse_events(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    for raw_event in body.split("\n\n") {
        let trimmed = raw_event.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut event = SseEvent::default();
        let mut has_data = false;

        for line in trimmed.lines() {
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.find(':') {
                Some(pos) => {
                    let value = line[pos + 1..]
                        .strip_prefix(' ')
                        .unwrap_or(&line[pos + 1..]);
                    (&line[..pos], value)
                }
                None => (line, ""),
            };

            match field {
                "event" => event.event = Some(value.to_string()),
                "data" => {
                    if has_data {
                        event.data.push('\n');
                    }
                    event.data.push_str(value);
                    has_data = true;
                }
                // `id`, `retry`, and unknown fields are ignored.
                _ => {}
            }
        }

        if has_data {
            events.push(event);
        }
    }
    events
}

/// Extract the first JSON-RPC message from an SSE body.
///
/// Only "message" events (or events with no explicit type) are considered;
/// events whose data does not parse as JSON-RPC are logged and skipped.
fn first_rpc_message(body: &str) -> Option<JsonRpcMessage> {
    for event in parse_sse_events(body) {
        let is_message = event.event.as_deref().map_or(true, |e| e == "message");
        if !is_message || event.data.is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonRpcMessage>(&event.data) {
            Ok(msg) => return Some(msg),
            Err(e) => {
                tracing::warn!(
                    data = event.data,
                    error = %e,
                    "skipping SSE event that is not a JSON-RPC message"
                );
            }
        }
    }
    None
}

// ============================================================
// McpSession
// ============================================================

/// A session against one remote tool server.
///
/// Created once per job; owns the session identifier and the one-time
/// initialization handshake. Methods take `&mut self` — a session is not
/// safe for concurrent callers.
pub struct McpSession {
    config: SessionConfig,
    client: reqwest::Client,
    session_id: Option<String>,
    initialized: bool,
}

impl McpSession {
    /// Create a new session with the given configuration.
    ///
    /// Builds a `reqwest::Client` with the configured timeouts. No network
    /// traffic happens until the first call.
    pub fn new(config: SessionConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CourierError::Protocol(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            session_id: None,
            initialized: false,
        })
    }

    /// The resolved session id, if the handshake has run.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Perform the initialization handshake. Idempotent.
    ///
    /// Generates a client-side session id, attaches it to the handshake
    /// request, and adopts whichever id the server returns in its
    /// `Mcp-Session-Id` response header (falling back to the generated one
    /// if the server omits it). Returns the resolved session id.
    pub async fn initialize(&mut self) -> Result<String, CourierError> {
        if self.initialized {
            if let Some(id) = &self.session_id {
                return Ok(id.clone());
            }
        }

        let generated = Uuid::new_v4().to_string();
        self.session_id = Some(generated.clone());

        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "courier",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let response = self.post(JsonRpcMessage::request("initialize", params)).await?;
        if let Some(error) = response.error {
            return Err(CourierError::Protocol(format!(
                "initialize rejected by server: {} (code {})",
                error.message, error.code
            )));
        }

        self.initialized = true;
        // post() may have overwritten session_id from the response header.
        let resolved = self.session_id.clone().unwrap_or(generated);
        tracing::info!(session_id = %resolved, "session initialized");
        Ok(resolved)
    }

    /// Call a remote tool and return its result payload.
    ///
    /// Auto-initializes the session if needed (lazy, at most once). A
    /// response carrying a JSON-RPC error field surfaces as a protocol
    /// error with the server-provided detail.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, CourierError> {
        if !self.initialized {
            self.initialize().await?;
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        tracing::debug!(tool = name, "calling remote tool");
        let response = self.post(JsonRpcMessage::request("tools/call", params)).await?;
        if let Some(error) = response.error {
            return Err(CourierError::Protocol(format!(
                "tool '{name}' returned an error: {} (code {})",
                error.message, error.code
            )));
        }

        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// Build the headers for a request, including session and extra headers.
    fn build_headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();

        headers.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            "application/json, text/event-stream".parse().unwrap(),
        );

        for (key, value) in &self.config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            }
        }

        if let Some(ref session_id) = self.session_id {
            if let Ok(val) = reqwest::header::HeaderValue::from_str(session_id) {
                headers.insert(
                    reqwest::header::HeaderName::from_static(SESSION_HEADER),
                    val,
                );
            }
        }

        headers
    }

    /// POST one envelope and return the decoded response envelope.
    ///
    /// Captures the server's `Mcp-Session-Id` response header before
    /// anything else, so even a failed exchange updates the session id.
    async fn post(&mut self, message: JsonRpcMessage) -> Result<JsonRpcMessage, CourierError> {
        let body = serde_json::to_string(&message)?;

        tracing::debug!(
            url = %self.config.endpoint,
            method = ?message.method,
            "sending JSON-RPC request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.build_headers())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CourierError::Protocol(format!("HTTP request timed out: {e}"))
                } else if e.is_connect() {
                    CourierError::Protocol(format!(
                        "failed to connect to {}: {e}",
                        self.config.endpoint
                    ))
                } else {
                    CourierError::Protocol(format!("HTTP request failed: {e}"))
                }
            })?;

        if let Some(value) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!(session_id = value, "captured session id from server");
            self.session_id = Some(value.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_http_error(status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let response_body = response
            .text()
            .await
            .map_err(|e| CourierError::Protocol(format!("failed to read response body: {e}")))?;

        if content_type.contains("text/event-stream") {
            first_rpc_message(&response_body).ok_or_else(|| {
                CourierError::Protocol(
                    "SSE response contained no JSON-RPC message".to_string(),
                )
            })
        } else {
            serde_json::from_str(&response_body).map_err(|e| {
                CourierError::Protocol(format!("invalid JSON-RPC response body: {e}"))
            })
        }
    }

    /// Classify an HTTP error status code.
    ///
    /// 4xx means the request itself was rejected; 5xx means the server
    /// broke. Neither is retried at this layer.
    fn classify_http_error(status: reqwest::StatusCode) -> CourierError {
        if status.is_client_error() {
            CourierError::Protocol(format!("server rejected request: HTTP {status}"))
        } else if status.is_server_error() {
            CourierError::Protocol(format!("server error: HTTP {status}"))
        } else {
            CourierError::Protocol(format!("unexpected HTTP status {status}"))
        }
    }
}

#[async_trait]
impl ToolCaller for McpSession {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, CourierError> {
        McpSession::call_tool(self, name, arguments).await
    }
}

// ============================================================
// Tests
// ============================================================
