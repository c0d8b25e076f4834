//! Job orchestration: submit → poll → retrieve → download.
//!
//! One `JobRunner` drives exactly one job to a terminal state. Status and
//! result calls are issued strictly after the submit call completes and
//! strictly in poll order — there are no overlapping polls. Network failures
//! are not retried here; only the status poll loop is a bounded
//! protocol-level retry.

use std::time::Duration;

use chrono::Utc;

use courier_types::config::JobConfig;
use courier_types::errors::CourierError;
use courier_types::protocol::{JobHandle, JobReport, JobState, StatusSnapshot};
use courier_types::traits::{ArtifactFetcher, ToolCaller};

use crate::extract;

/// Classification of one status text against the configured status sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Completed,
    Failed,
    Pending,
}

/// Drives one asynchronous job from submission to a terminal state.
///
/// Generic over the session ([`ToolCaller`]) and downloader
/// ([`ArtifactFetcher`]) seams so the state machine can be tested with
/// scripted fakes.
pub struct JobRunner<C, F> {
    caller: C,
    fetcher: F,
    config: JobConfig,
    state: JobState,
}

impl<C: ToolCaller, F: ArtifactFetcher> JobRunner<C, F> {
    /// Create a runner for one job.
    pub fn new(caller: C, fetcher: F, config: JobConfig) -> Self {
        Self {
            caller,
            fetcher,
            config,
            state: JobState::Submitting,
        }
    }

    /// The runner's current state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run the job to a terminal state.
    ///
    /// Returns a report for `Completed` (including the degraded no-artifact
    /// case); `Failed` and `TimedOut` surface as errors carrying the last
    /// known payload and the poll budget respectively.
    pub async fn run(&mut self) -> Result<JobReport, CourierError> {
        let handle = self.submit().await?;
        let (snapshot, polls) = self.poll(&handle).await?;
        self.retrieve(&handle, snapshot, polls).await
    }

    /// Submit the job and resolve its identifier.
    async fn submit(&mut self) -> Result<JobHandle, CourierError> {
        self.state = JobState::Submitting;
        tracing::info!(tool = %self.config.tools.submit, "submitting job");

        let result = self
            .caller
            .call_tool(&self.config.tools.submit, self.config.submit_args.clone())
            .await?;

        let request_id = extract::extract_job_id(&result)?;
        tracing::info!(request_id = %request_id, "job accepted");

        Ok(JobHandle {
            request_id,
            id_param: self.config.id_param.clone(),
        })
    }

    /// Poll the status tool until a terminal classification or budget
    /// exhaustion. Returns the completed snapshot and the poll count.
    ///
    /// The interval sleep happens only between polls — never after a
    /// terminal classification, and never after the final attempt.
    async fn poll(&mut self, handle: &JobHandle) -> Result<(StatusSnapshot, u32), CourierError> {
        self.state = JobState::Polling;
        let max = self.config.poll.max_attempts;
        let interval = Duration::from_secs(self.config.poll.interval_secs);

        for attempt in 1..=max {
            let result = self
                .caller
                .call_tool(&self.config.tools.status, handle.as_args())
                .await?;
            let snapshot = extract::extract_status(&result);
            tracing::debug!(attempt, status = %snapshot.status, "status check");

            match self.classify(&snapshot.status) {
                StatusClass::Completed => {
                    self.state = JobState::Completed;
                    tracing::info!(attempt, status = %snapshot.status, "job completed");
                    return Ok((snapshot, attempt));
                }
                StatusClass::Failed => {
                    self.state = JobState::Failed;
                    return Err(CourierError::JobFailed {
                        status: snapshot.status,
                        payload: snapshot.payload,
                    });
                }
                StatusClass::Pending => {
                    if attempt < max {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        }

        self.state = JobState::TimedOut;
        Err(CourierError::JobTimeout {
            attempts: max,
            max_attempts: max,
        })
    }

    /// Fetch the result, resolve the artifact URL, and download it.
    ///
    /// The URL is looked up in the result payload first, then in the last
    /// status snapshot. A completed job without a resolvable URL is still a
    /// success — the report carries a note instead of a path.
    async fn retrieve(
        &mut self,
        handle: &JobHandle,
        snapshot: StatusSnapshot,
        polls: u32,
    ) -> Result<JobReport, CourierError> {
        let result = self
            .caller
            .call_tool(&self.config.tools.result, handle.as_args())
            .await?;

        let url = extract::extract_url(&result).or_else(|| extract::extract_url(&snapshot.payload));

        let mut report = JobReport {
            request_id: handle.request_id.clone(),
            status: snapshot.status,
            download_url: url.clone(),
            saved_path: None,
            note: None,
            polls,
            finished_at: Utc::now(),
        };

        match url {
            Some(url) => {
                tracing::info!(url = %url, "downloading artifact");
                let path = self.fetcher.fetch(&url, &self.config.output_path).await?;
                tracing::info!(path = %path.display(), "artifact saved");
                report.saved_path = Some(path);
            }
            None => {
                tracing::warn!("job completed but no download URL could be resolved");
                report.note =
                    Some("job completed but the result contained no download URL".to_string());
            }
        }

        Ok(report)
    }

    /// Classify a normalized status text against the configured sets.
    fn classify(&self, status: &str) -> StatusClass {
        if self
            .config
            .completed_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
        {
            StatusClass::Completed
        } else if self
            .config
            .failed_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
        {
            StatusClass::Failed
        } else {
            StatusClass::Pending
        }
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// ToolCaller fake that replays a scripted response queue and records
    /// every call it sees.
    struct ScriptedCaller {
        responses: VecDeque<Value>,
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl ScriptedCaller {
        fn new(responses: Vec<Value>) -> (Self, Arc<Mutex<Vec<(String, Value)>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    responses: responses.into(),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ToolCaller for ScriptedCaller {
        async fn call_tool(
            &mut self,
            name: &str,
            arguments: Value,
        ) -> Result<Value, CourierError> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            self.responses
                .pop_front()
                .ok_or_else(|| CourierError::Protocol("scripted responses exhausted".to_string()))
        }
    }

    /// ArtifactFetcher fake that records requested URLs without touching
    /// the network or the filesystem.
    struct RecordingFetcher {
        fetched: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingFetcher {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            let fetched = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    fetched: fetched.clone(),
                },
                fetched,
            )
        }
    }

    #[async_trait]
    impl ArtifactFetcher for RecordingFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf, CourierError> {
            self.fetched.lock().unwrap().push(url.to_string());
            Ok(dest.join("artifact.bin"))
        }
    }

    fn test_config() -> JobConfig {
        serde_yaml::from_str(
            r#"
endpoint: http://localhost/mcp
tools:
  submit: submit_job
  status: check_status
  result: fetch_result
submit_args:
  prompt: "test"
output_path: /tmp/out/
poll:
  interval_secs: 0
  max_attempts: 5
"#,
        )
        .unwrap()
    }

    fn runner(
        responses: Vec<Value>,
    ) -> (
        JobRunner<ScriptedCaller, RecordingFetcher>,
        Arc<Mutex<Vec<(String, Value)>>>,
        Arc<Mutex<Vec<String>>>,
    ) {
        let (caller, calls) = ScriptedCaller::new(responses);
        let (fetcher, fetched) = RecordingFetcher::new();
        (JobRunner::new(caller, fetcher, test_config()), calls, fetched)
    }

    #[tokio::test]
    async fn happy_path_reaches_completed_after_exact_poll_count() {
        let (mut runner, calls, fetched) = runner(vec![
            json!({"request_id": "abc123"}),
            json!({"status": "running"}),
            json!({"status": "running"}),
            json!({"status": "completed"}),
            json!({"images": [{"url": "http://x/y.png"}]}),
        ]);

        let report = runner.run().await.unwrap();

        assert_eq!(report.request_id, "abc123");
        assert_eq!(report.status, "completed");
        assert_eq!(report.polls, 3);
        assert_eq!(report.download_url.as_deref(), Some("http://x/y.png"));
        assert_eq!(
            report.saved_path.as_deref(),
            Some(Path::new("/tmp/out/artifact.bin"))
        );
        assert!(report.note.is_none());
        assert_eq!(runner.state(), JobState::Completed);

        assert_eq!(fetched.lock().unwrap().as_slice(), ["http://x/y.png"]);

        // Submit, exactly three polls, then one result call — in order.
        let seen = calls.lock().unwrap().clone();
        let names: Vec<&str> = seen.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            [
                "submit_job",
                "check_status",
                "check_status",
                "check_status",
                "fetch_result"
            ]
        );
    }

    #[tokio::test]
    async fn resolved_identifier_is_reused_verbatim() {
        let (mut runner, calls, _) = runner(vec![
            // Identifier only available through the content-item unwrap.
            json!({"content": [{"type": "text", "text": "{\"job_id\": \"deep-7\"}"}]}),
            json!({"status": "done"}),
            json!({"url": "http://x/a.bin"}),
        ]);

        runner.run().await.unwrap();

        let seen = calls.lock().unwrap().clone();
        assert_eq!(seen[1].0, "check_status");
        assert_eq!(seen[1].1, json!({"request_id": "deep-7"}));
        assert_eq!(seen[2].0, "fetch_result");
        assert_eq!(seen[2].1, json!({"request_id": "deep-7"}));
    }

    #[tokio::test]
    async fn configured_id_param_addresses_status_calls() {
        let (caller, calls) = ScriptedCaller::new(vec![
            json!({"request_id": "abc"}),
            json!({"status": "ready"}),
            json!({"url": "http://x/a"}),
        ]);
        let (fetcher, _) = RecordingFetcher::new();
        let mut config = test_config();
        config.id_param = "task".to_string();
        let mut runner = JobRunner::new(caller, fetcher, config);

        runner.run().await.unwrap();

        let seen = calls.lock().unwrap().clone();
        assert_eq!(seen[1].1, json!({"task": "abc"}));
    }

    #[tokio::test]
    async fn failed_status_surfaces_job_failed_error() {
        let (mut runner, _, fetched) = runner(vec![
            json!({"request_id": "abc"}),
            json!({"status": "running"}),
            json!({"status": "failed", "reason": "out of quota"}),
        ]);

        let err = runner.run().await.unwrap_err();
        match err {
            CourierError::JobFailed { status, payload } => {
                assert_eq!(status, "failed");
                assert_eq!(payload["reason"], "out of quota");
            }
            other => panic!("expected JobFailed, got: {other:?}"),
        }
        assert_eq!(runner.state(), JobState::Failed);
        assert!(fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_poll_budget_surfaces_timeout() {
        let (caller, calls) = ScriptedCaller::new(vec![
            json!({"request_id": "abc"}),
            json!({"status": "pending"}),
            json!({"status": "pending"}),
            json!({"status": "pending"}),
        ]);
        let (fetcher, _) = RecordingFetcher::new();
        let mut config = test_config();
        config.poll.max_attempts = 3;
        let mut runner = JobRunner::new(caller, fetcher, config);

        let err = runner.run().await.unwrap_err();
        match err {
            CourierError::JobTimeout {
                attempts,
                max_attempts,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(max_attempts, 3);
            }
            other => panic!("expected JobTimeout, got: {other:?}"),
        }
        assert_eq!(runner.state(), JobState::TimedOut);

        // Exactly max_attempts status calls were issued.
        let polls = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == "check_status")
            .count();
        assert_eq!(polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_only_between_polls() {
        let (caller, _) = ScriptedCaller::new(vec![
            json!({"request_id": "abc"}),
            json!({"status": "running"}),
            json!({"status": "running"}),
            json!({"status": "completed"}),
            json!({"url": "http://x/a"}),
        ]);
        let (fetcher, _) = RecordingFetcher::new();
        let mut config = test_config();
        config.poll.interval_secs = 2;
        let mut runner = JobRunner::new(caller, fetcher, config);

        let started = tokio::time::Instant::now();
        runner.run().await.unwrap();

        // Three polls mean two interval sleeps — none after the terminal one.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_url_is_degraded_success() {
        let (mut runner, _, fetched) = runner(vec![
            json!({"request_id": "abc"}),
            json!({"status": "completed"}),
            json!({"detail": "no artifact for this job"}),
        ]);

        let report = runner.run().await.unwrap();
        assert_eq!(report.status, "completed");
        assert!(report.download_url.is_none());
        assert!(report.saved_path.is_none());
        assert!(report.note.is_some());
        assert!(fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn url_falls_back_to_last_status_snapshot() {
        let (mut runner, _, fetched) = runner(vec![
            json!({"request_id": "abc"}),
            json!({"status": "completed", "download_url": "http://snap/z.bin"}),
            json!({"detail": "result has no url"}),
        ]);

        let report = runner.run().await.unwrap();
        assert_eq!(report.download_url.as_deref(), Some("http://snap/z.bin"));
        assert_eq!(fetched.lock().unwrap().as_slice(), ["http://snap/z.bin"]);
    }

    #[tokio::test]
    async fn unextractable_submit_response_is_fatal() {
        let (mut runner, calls, _) = runner(vec![json!({"acknowledged": true})]);

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, CourierError::Extraction { .. }));

        // No status call was ever issued.
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transport_error_during_poll_propagates_unchanged() {
        // Script runs dry on the second poll, standing in for a transport
        // failure — it must surface as Protocol, not as a job failure.
        let (mut runner, _, _) = runner(vec![
            json!({"request_id": "abc"}),
            json!({"status": "running"}),
        ]);

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, CourierError::Protocol(_)));
    }

    #[tokio::test]
    async fn custom_status_sets_drive_classification() {
        let (caller, _) = ScriptedCaller::new(vec![
            json!({"request_id": "abc"}),
            json!({"status": "archived"}),
            json!({"url": "http://x/a"}),
        ]);
        let (fetcher, _) = RecordingFetcher::new();
        let mut config = test_config();
        config.completed_statuses = vec!["archived".to_string()];
        let mut runner = JobRunner::new(caller, fetcher, config);

        let report = runner.run().await.unwrap();
        assert_eq!(report.status, "archived");
    }
}
