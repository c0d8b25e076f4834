/// Unified error type for the courier job client.
///
/// All crates use this error type for propagation across crate boundaries.
/// The job-level variants (`JobFailed`, `JobTimeout`) are distinct from
/// transport-level failures (`Protocol`): a failed status reported by the
/// server is a protocol-level outcome of a healthy exchange, while a
/// `Protocol` error means the exchange itself broke down.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// The handshake or a tool-call response carried an error field, or the
    /// transport call itself failed. Fatal, never retried.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The submit response contained no recognizable job identifier.
    #[error("no job identifier found in submit response (tried fields: {})", .tried.join(", "))]
    Extraction {
        /// Field names that were tried, in priority order.
        tried: &'static [&'static str],
    },

    /// The remote job reported a status from the configured failed set.
    #[error("job failed with status '{status}'")]
    JobFailed {
        /// The normalized status text that triggered the failure.
        status: String,
        /// The last status payload received from the server.
        payload: serde_json::Value,
    },

    /// The poll budget was exhausted without a terminal status.
    #[error("job timed out after {attempts} of {max_attempts} status checks")]
    JobTimeout {
        /// Number of status checks actually issued.
        attempts: u32,
        /// The configured poll budget.
        max_attempts: u32,
    },

    /// Artifact download or persist failure.
    #[error("download error: {0}")]
    Download(String),

    /// Error from configuration loading or validation.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for CourierError {
    fn from(err: serde_yaml::Error) -> Self {
        CourierError::Serialization(err.to_string())
    }
}
