//! Range-resumable streaming fetch into a temp file.
//!
//! The temp file's length is the resume offset. A `206` answer whose
//! `Content-Range` starts at that offset is appended; a `206` starting at
//! byte zero or any other success restarts the file from zero.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderValue, RANGE};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::observer::DownloadObserver;
use super::orchestrator::EpisodeUnit;
use crate::http_client::{HttpTimeouts, build_http_client};
use crate::resolver::BROWSER_USER_AGENT;

const HTTP_PARTIAL_CONTENT: u16 = 206;
const HTTP_RANGE_NOT_SATISFIABLE: u16 = 416;

/// What one successful fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    /// Offset the transfer started from (0 when the server ignored the range).
    pub resumed_from: u64,
    /// Bytes written by this fetch.
    pub bytes_written: u64,
    /// Temp file length afterwards.
    pub total_bytes: u64,
}

/// HTTP client for media streaming.
///
/// Created once and shared by every unit so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with media timeouts and the browser User-Agent.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(BROWSER_USER_AGENT, HttpTimeouts::media())
    }

    /// Creates a client with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn with_timeouts(user_agent: &str, timeouts: HttpTimeouts) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, timeouts)?,
        })
    }

    /// Wraps an existing reqwest client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Streams `url` into `temp_path`, resuming from its current length.
    ///
    /// `cancel` is checked before the request and between chunks. On
    /// cancellation everything received so far is flushed and kept.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::RangeNotSatisfiable`] on `416` or on a `206`
    /// that starts neither at the offset nor at zero,
    /// [`DownloadError::Cancelled`] when `cancel` fires, and the transport,
    /// status, IO and integrity errors of [`DownloadError`] otherwise.
    #[instrument(skip(self, cancel, unit, observer), fields(path = %temp_path.display()))]
    pub async fn fetch_resumable(
        &self,
        url: &str,
        temp_path: &Path,
        cancel: &CancellationToken,
        unit: &EpisodeUnit,
        observer: &dyn DownloadObserver,
    ) -> Result<FetchSummary, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let offset = existing_length(temp_path).await?;

        let mut request = self.client.get(parsed);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        debug!(offset, "requesting media");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            sent = request.send() => sent.map_err(|e| DownloadError::from_reqwest(url, e))?,
        };

        let status = response.status().as_u16();
        if status == HTTP_RANGE_NOT_SATISFIABLE {
            return Err(DownloadError::range_not_satisfiable(url, offset));
        }
        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, status));
        }

        let range_start = if status == HTTP_PARTIAL_CONTENT {
            parse_content_range_start(response.headers().get(CONTENT_RANGE))
        } else {
            None
        };
        let append = match range_start {
            _ if offset == 0 || status != HTTP_PARTIAL_CONTENT => false,
            None => true,
            Some(start) if start == offset => true,
            Some(0) => false,
            Some(start) => {
                warn!(offset, start, "partial content starts at the wrong byte");
                return Err(DownloadError::range_not_satisfiable(url, offset));
            }
        };
        if offset > 0 && !append {
            warn!(offset, status, "server ignored range, restarting from zero");
        }
        let start = if append { offset } else { 0 };

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let file = open_temp(temp_path, append).await?;

        observer.on_transfer_start(unit, start, content_length.map(|len| start + len));
        let streamed = stream_to_file(file, response, url, temp_path, cancel, unit, observer).await;
        observer.on_transfer_end(unit);
        let bytes_written = streamed?;

        if let Some(expected) = content_length
            && expected != bytes_written
        {
            return Err(DownloadError::integrity(temp_path, expected, bytes_written));
        }

        let summary = FetchSummary {
            resumed_from: start,
            bytes_written,
            total_bytes: start + bytes_written,
        };
        info!(
            bytes = summary.total_bytes,
            resumed = append,
            "media fetch complete"
        );
        Ok(summary)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// First byte position of `Content-Range: bytes <start>-<end>/<total>`.
fn parse_content_range_start(value: Option<&HeaderValue>) -> Option<u64> {
    let range = value?.to_str().ok()?.trim().strip_prefix("bytes")?;
    let (start, _) = range.trim_start().split_once('-')?;
    start.trim().parse::<u64>().ok()
}

async fn existing_length(path: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

async fn open_temp(path: &Path, append: bool) -> Result<File, DownloadError> {
    let file = if append {
        OpenOptions::new().append(true).open(path).await
    } else {
        File::create(path).await
    };
    file.map_err(|e| DownloadError::io(path, e))
}

/// Streams the body to `file`, returning bytes written.
///
/// Received bytes are flushed even when the stream fails or is cancelled,
/// so the temp file length stays a valid resume offset.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    cancel: &CancellationToken,
    unit: &EpisodeUnit,
    observer: &dyn DownloadObserver,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(DownloadError::cancelled(url)),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break Ok(());
        };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => break Err(DownloadError::from_reqwest(url, e)),
        };
        if let Err(e) = writer.write_all(&chunk).await {
            break Err(DownloadError::io(path, e));
        }
        bytes_written += chunk.len() as u64;
        observer.on_transfer_progress(unit, chunk.len() as u64);
    };

    let flushed = writer.flush().await.map_err(|e| DownloadError::io(path, e));
    if outcome.is_err() {
        debug!(bytes_written, "stream stopped early, partial data kept");
    }
    outcome?;
    flushed?;
    Ok(bytes_written)
}
