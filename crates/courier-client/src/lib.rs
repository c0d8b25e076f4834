//! Core client for asynchronous remote-job execution over JSON-RPC/HTTP.
//!
//! A server exposes "submit a job, poll for completion, fetch the result"
//! semantics behind named tools. This crate drives one such job end to end:
//! - `session` owns the protocol handshake and wraps every call in a
//!   JSON-RPC envelope
//! - `extract` makes sense of the loosely-structured tool results
//! - `job` is the submit → poll → retrieve → download state machine
//! - `download` persists the resulting artifact

pub mod download;
pub mod extract;
pub mod job;
pub mod session;

pub use download::HttpDownloader;
pub use job::JobRunner;
pub use session::{McpSession, SessionConfig};
