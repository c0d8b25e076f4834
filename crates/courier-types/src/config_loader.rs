/// Job-file loader with validation.
///
/// Reads a YAML job file, parses it into [`JobConfig`], and validates it for
/// internal consistency before anything touches the network. Invalid configs
/// are rejected up front with an error naming the offending field.
use std::path::Path;

use crate::config::JobConfig;
use crate::errors::CourierError;

/// Load a job file and validate it.
pub fn load_job_file(path: &Path) -> Result<JobConfig, CourierError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CourierError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config: JobConfig = serde_yaml::from_str(&content)
        .map_err(|e| CourierError::Config(format!("failed to parse {}: {e}", path.display())))?;
    validate(&config)?;
    tracing::debug!(path = %path.display(), "job file loaded");
    Ok(config)
}

/// Validate a job configuration for internal consistency.
///
/// Checks:
/// - Endpoint is non-empty and http(s)-schemed
/// - All three tool names are non-empty
/// - The id parameter name is non-empty
/// - The poll budget is positive
/// - The completed and failed status sets do not overlap
pub fn validate(config: &JobConfig) -> Result<(), CourierError> {
    if config.endpoint.is_empty() {
        return Err(CourierError::Config("endpoint must not be empty".to_string()));
    }
    if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
        return Err(CourierError::Config(format!(
            "endpoint '{}' must use an http or https URL",
            config.endpoint
        )));
    }

    for (role, name) in [
        ("submit", &config.tools.submit),
        ("status", &config.tools.status),
        ("result", &config.tools.result),
    ] {
        if name.is_empty() {
            return Err(CourierError::Config(format!(
                "tools.{role} must not be empty"
            )));
        }
    }

    if config.id_param.is_empty() {
        return Err(CourierError::Config("id_param must not be empty".to_string()));
    }

    if config.poll.max_attempts == 0 {
        return Err(CourierError::Config(
            "poll.max_attempts must be positive (got 0)".to_string(),
        ));
    }

    for status in &config.completed_statuses {
        if config
            .failed_statuses
            .iter()
            .any(|f| f.eq_ignore_ascii_case(status))
        {
            return Err(CourierError::Config(format!(
                "status '{status}' appears in both completed_statuses and failed_statuses"
            )));
        }
    }

    Ok(())
}
