/// Trait contracts at the courier seams.
///
/// The orchestrator codes against these interfaces instead of the concrete
/// session and downloader types, so it can be tested with scripted fakes and
/// no network.
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::errors::CourierError;

/// Invokes named tools on the remote server.
///
/// Implemented by the protocol session. Takes `&mut self` because a session
/// mutates itself (lazy handshake, adopted session id) — it is deliberately
/// not usable from concurrent callers without external serialization.
#[async_trait]
pub trait ToolCaller: Send {
    /// Call a remote tool and return its result payload.
    ///
    /// A response carrying a JSON-RPC error field surfaces as
    /// [`CourierError::Protocol`], never as a job-status failure.
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, CourierError>;
}

/// Fetches a byte stream from a URL and persists it.
///
/// `dest` may be a file path (used verbatim) or a directory (a filename is
/// derived from response metadata or the URL). Returns the path actually
/// written.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Download `url` and write it under `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf, CourierError>;
}
