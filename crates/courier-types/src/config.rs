/// Configuration types for a courier job, parsed from a YAML job file.
///
/// Everything except the endpoint, the tool names, and the submit arguments
/// has a serde default, so a minimal job file stays small:
///
/// ```yaml
/// endpoint: https://tools.example.com/mcp
/// tools:
///   submit: generate_image
///   status: check_status
///   result: fetch_result
/// submit_args:
///   prompt: "a lighthouse at dusk"
/// ```
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// URL of the remote tool server endpoint.
    pub endpoint: String,
    /// Extra headers attached to every request (auth tokens etc.).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Names of the submit/status/result tools on the server.
    pub tools: ToolNames,
    /// Arguments passed to the submit tool, verbatim.
    #[serde(default = "default_submit_args")]
    pub submit_args: serde_json::Value,
    /// Where to write the downloaded artifact (file or directory).
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    /// Poll loop timing.
    #[serde(default)]
    pub poll: PollConfig,
    /// Status texts that classify a job as completed.
    #[serde(default = "default_completed_statuses")]
    pub completed_statuses: Vec<String>,
    /// Status texts that classify a job as failed.
    #[serde(default = "default_failed_statuses")]
    pub failed_statuses: Vec<String>,
    /// Parameter name under which the job id is passed to status/result calls.
    #[serde(default = "default_id_param")]
    pub id_param: String,
    /// HTTP client tuning.
    #[serde(default)]
    pub http: HttpConfig,
}

/// The three tool names a job is driven through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolNames {
    /// Tool that accepts the job and returns its identifier.
    pub submit: String,
    /// Tool that reports the job's current status.
    pub status: String,
    /// Tool that returns the finished job's result.
    pub result: String,
}

/// Poll loop timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds to sleep between status checks.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Maximum number of status checks before the job is declared timed out.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// HTTP client tuning for the protocol session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for establishing a connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Timeout for a complete request/response exchange, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_submit_args() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_output_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    300
}

fn default_id_param() -> String {
    "request_id".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

pub(crate) fn default_completed_statuses() -> Vec<String> {
    ["completed", "done", "success", "finished", "ready"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub(crate) fn default_failed_statuses() -> Vec<String> {
    ["failed", "error", "cancelled", "timeout"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
endpoint: https://tools.example.com/mcp
tools:
  submit: generate_image
  status: check_status
  result: fetch_result
submit_args:
  prompt: "a lighthouse at dusk"
"#
    }

    #[test]
    fn minimal_job_file_gets_defaults() {
        let config: JobConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.endpoint, "https://tools.example.com/mcp");
        assert_eq!(config.tools.submit, "generate_image");
        assert_eq!(config.poll.interval_secs, 2);
        assert_eq!(config.poll.max_attempts, 300);
        assert_eq!(config.id_param, "request_id");
        assert!(config.headers.is_empty());
        assert_eq!(config.output_path, PathBuf::from("."));
        assert_eq!(
            config.submit_args,
            serde_json::json!({"prompt": "a lighthouse at dusk"})
        );
    }

    #[test]
    fn full_job_file_overrides_defaults() {
        let yaml = r#"
endpoint: http://localhost:8080/mcp
headers:
  authorization: Bearer token-xyz
tools:
  submit: submit
  status: status
  result: result
submit_args: {}
output_path: /tmp/artifacts/
poll:
  interval_secs: 1
  max_attempts: 10
completed_statuses: [ok]
failed_statuses: [bad]
id_param: task_id
http:
  connect_timeout_secs: 3
  request_timeout_secs: 7
"#;
        let config: JobConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.headers["authorization"], "Bearer token-xyz");
        assert_eq!(config.poll.interval_secs, 1);
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.completed_statuses, vec!["ok"]);
        assert_eq!(config.failed_statuses, vec!["bad"]);
        assert_eq!(config.id_param, "task_id");
        assert_eq!(config.http.connect_timeout_secs, 3);
        assert_eq!(config.http.request_timeout_secs, 7);
    }

    #[test]
    fn default_status_sets_are_disjoint() {
        let completed = default_completed_statuses();
        let failed = default_failed_statuses();
        for status in &completed {
            assert!(
                !failed.iter().any(|f| f.eq_ignore_ascii_case(status)),
                "status '{status}' appears in both default sets"
            );
        }
    }

    #[test]
    fn missing_submit_args_defaults_to_empty_object() {
        let yaml = r#"
endpoint: https://tools.example.com/mcp
tools:
  submit: a
  status: b
  result: c
"#;
        let config: JobConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.submit_args, serde_json::json!({}));
    }
}
