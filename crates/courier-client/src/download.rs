//! Artifact download: fetch a byte stream and persist it.
//!
//! When the destination is a directory, the filename is derived from the
//! `Content-Disposition` response header, else from the URL path, else a
//! fixed fallback. Derived names are sanitized so a hostile header cannot
//! escape the destination directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use courier_types::errors::CourierError;
use courier_types::traits::ArtifactFetcher;

/// Filename used when neither the response nor the URL names one.
const DEFAULT_FILENAME: &str = "artifact.bin";

/// HTTP downloader for resolved artifact URLs.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    /// Create a downloader.
    ///
    /// Only the connect timeout is bounded — large artifacts may take
    /// arbitrarily long to stream.
    pub fn new() -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CourierError::Download(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpDownloader {
    /// Download `url` and write it under `dest`. Returns the path written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<PathBuf, CourierError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CourierError::Download(format!("GET {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CourierError::Download(format!(
                "GET {url} returned HTTP {status}"
            )));
        }

        let content_disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let target = resolve_target(dest, url, content_disposition.as_deref());
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CourierError::Download(format!(
                        "failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let mut file = tokio::fs::File::create(&target).await.map_err(|e| {
            CourierError::Download(format!("failed to create {}: {e}", target.display()))
        })?;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CourierError::Download(format!("read from {url} failed: {e}")))?
        {
            file.write_all(&chunk).await.map_err(|e| {
                CourierError::Download(format!("write to {} failed: {e}", target.display()))
            })?;
        }

        file.flush().await.map_err(|e| {
            CourierError::Download(format!("flush of {} failed: {e}", target.display()))
        })?;

        tracing::debug!(url, path = %target.display(), "artifact written");
        Ok(target)
    }
}

/// Resolve the final file path for a download.
///
/// A file destination is used verbatim. A directory destination (existing
/// directory, or a path spelled with a trailing separator) gets a derived
/// filename.
fn resolve_target(dest: &Path, url: &str, content_disposition: Option<&str>) -> PathBuf {
    let spelled_as_dir = dest
        .as_os_str()
        .to_string_lossy()
        .ends_with(['/', '\\']);
    if !dest.is_dir() && !spelled_as_dir {
        return dest.to_path_buf();
    }

    let name = content_disposition
        .and_then(filename_from_content_disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
    dest.join(sanitize_filename(&name))
}

/// Extract a filename from a `Content-Disposition` header value.
///
/// Supports the `filename="value"` / `filename=value` forms and the RFC 5987
/// `filename*=UTF-8''percent-encoded` form; `filename*` takes precedence
/// when both are present.
fn filename_from_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((name, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                if let Some(encoded) = raw
                    .strip_prefix("UTF-8''")
                    .or_else(|| raw.strip_prefix("utf-8''"))
                {
                    let decoded = percent_decode(encoded);
                    if !decoded.is_empty() {
                        return Some(decoded);
                    }
                }
            }
            "filename" => {
                let unquoted = raw.trim_matches('"');
                if !unquoted.is_empty() {
                    plain = Some(unquoted.to_string());
                }
            }
            _ => {}
        }
    }
    plain
}

/// Last path segment of a URL, ignoring query string and fragment.
fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let (_, segment) = after_scheme.rsplit_once('/')?;
    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Keep only the final path component of a derived name and drop leading
/// dots, so the result can never leave the destination directory.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let trimmed = base.trim_start_matches('.');
    if trimmed.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Percent-decode an RFC 5987 encoded value; invalid escapes pass through.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let high = (bytes[i + 1] as char).to_digit(16);
            let low = (bytes[i + 2] as char).to_digit(16);
            if let (Some(h), Some(l)) = (high, low) {
                out.push((h as u8) << 4 | l as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================
// Tests
// ============================================================
