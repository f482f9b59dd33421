//! Single URL-to-file transfer
//!
//! A [`Transfer`] is one attempt at one URL: request it with the session
//! token, stream the body into a private temporary file next to the
//! destination, then rename it into place. A file therefore only appears under
//! its final name once every byte has been written and synced. A retry is a
//! new `Transfer`, never a reused one.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::app::client::Session;
use crate::app::orchestrator::progress::TransferProgress;
use crate::constants::files;
use crate::errors::{TransferError, TransferResult};

pub mod filename;

pub use filename::resolve_file_name;

/// Distinguishes temp files of concurrent attempts within this process
static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// How a transfer attempt ended
#[derive(Debug)]
pub enum TransferOutcome {
    /// The file is committed under its final name
    Success { path: PathBuf, bytes_written: u64 },
    /// Worth another attempt in a later round
    RetryableFailure(TransferError),
    /// Will not succeed on retry; `Io` and `Auth` errors also abort the batch
    PermanentFailure(TransferError),
}

impl TransferOutcome {
    fn from_result(result: TransferResult<(PathBuf, u64)>) -> Self {
        match result {
            Ok((path, bytes_written)) => Self::Success {
                path,
                bytes_written,
            },
            Err(e) if e.is_retryable() => Self::RetryableFailure(e),
            Err(e) => Self::PermanentFailure(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One attempt to download one URL into a destination directory
#[derive(Debug)]
pub struct Transfer {
    url: String,
    destination_dir: PathBuf,
    temp_path: Option<PathBuf>,
    final_path: Option<PathBuf>,
    bytes_written: u64,
    timeout: Option<Duration>,
    progress: Option<TransferProgress>,
}

impl Transfer {
    pub fn new(url: impl Into<String>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination_dir: destination_dir.into(),
            temp_path: None,
            final_path: None,
            bytes_written: 0,
            timeout: None,
            progress: None,
        }
    }

    /// Give up on the attempt, as retryable, once it has run this long
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Report written bytes through a progress handle
    pub fn with_progress(mut self, progress: TransferProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run the attempt to completion
    ///
    /// The deadline covers the request and the body. Once every byte is on
    /// disk the rename runs without it, so a committed file is never reported
    /// as a failure. Never leaves a temporary file behind, whatever the outcome.
    pub async fn run(mut self, session: &Session) -> TransferOutcome {
        tracing::debug!("Downloading {}", self.url);

        let fetched = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.download(session)).await {
                Ok(result) => result,
                Err(_) => Err(TransferError::retryable(format!(
                    "transfer did not finish within {}s",
                    limit.as_secs_f64()
                ))),
            },
            None => self.download(session).await,
        };

        self.complete(fetched).await
    }

    /// Commit a fully downloaded temp file, or clean up after a failed download
    async fn complete(&mut self, fetched: TransferResult<()>) -> TransferOutcome {
        let result = match fetched {
            Ok(()) => self.commit().await,
            Err(e) => Err(e),
        };
        self.finish(result).await
    }

    async fn finish(&mut self, result: TransferResult<PathBuf>) -> TransferOutcome {
        match &result {
            Ok(path) => {
                tracing::info!(
                    "Saved {} ({} bytes) from {}",
                    path.display(),
                    self.bytes_written,
                    self.url
                );
            }
            Err(e) => {
                self.discard_temp().await;
                if e.is_retryable() {
                    tracing::warn!("Transfer of {} failed: {}", self.url, e);
                } else {
                    tracing::error!("Transfer of {} failed permanently: {}", self.url, e);
                }
            }
        }

        TransferOutcome::from_result(result.map(|path| (path, self.bytes_written)))
    }

    /// Request the URL and stream its body into the temporary file
    async fn download(&mut self, session: &Session) -> TransferResult<()> {
        let url = Url::parse(&self.url).map_err(|e| TransferError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        let response = self.request(session, &url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TransferError::NotFound);
        }
        if !status.is_success() {
            return Err(TransferError::retryable(format!("HTTP {}", status)));
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok());
        let name = resolve_file_name(&url, disposition).ok_or_else(|| TransferError::InvalidUrl {
            url: self.url.clone(),
            reason: "no usable file name in URL or Content-Disposition".to_string(),
        })?;
        self.prepare_paths(&name);

        let expected_len = response.content_length();
        self.bytes_written = self
            .stream_body(response.bytes_stream(), expected_len)
            .await?;
        Ok(())
    }

    /// GET the URL, refreshing the token and retrying once on expiry
    async fn request(&self, session: &Session, url: &Url) -> TransferResult<Response> {
        let first = session
            .authorized_download(url)
            .await
            .map_err(TransferError::retryable)?;
        if !first.is_auth_expired() {
            return Ok(first.response);
        }

        tracing::warn!("Token expired while requesting {}; refreshing", self.url);
        session.refresh(first.generation).await?;

        let retry = session
            .authorized_download(url)
            .await
            .map_err(TransferError::retryable)?;
        if retry.is_auth_expired() {
            return Err(TransferError::Unauthorized);
        }
        Ok(retry.response)
    }

    fn prepare_paths(&mut self, name: &str) {
        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let temp_name = format!(
            "{}.{}-{}{}",
            name,
            std::process::id(),
            sequence,
            files::TEMP_FILE_SUFFIX
        );
        self.temp_path = Some(self.destination_dir.join(temp_name));
        self.final_path = Some(self.destination_dir.join(name));
    }

    /// Write the body to the temporary file, returning the byte count
    async fn stream_body<S, B, E>(&mut self, stream: S, expected_len: Option<u64>) -> TransferResult<u64>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let temp_path = self.temp_path.clone().ok_or_else(|| {
            TransferError::retryable("temporary path not prepared before streaming")
        })?;

        let mut file = File::create(&temp_path).await.map_err(|e| {
            TransferError::retryable(format!("cannot create {}: {}", temp_path.display(), e))
        })?;

        tokio::pin!(stream);
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                TransferError::retryable(format!("stream interrupted after {} bytes: {}", written, e))
            })?;
            let bytes = chunk.as_ref();

            file.write_all(bytes)
                .await
                .map_err(|e| TransferError::retryable(format!("write failed: {}", e)))?;

            written += bytes.len() as u64;
            if let Some(progress) = self.progress.as_mut() {
                progress.record(bytes.len() as u64);
            }
        }

        file.flush()
            .await
            .map_err(|e| TransferError::retryable(format!("flush failed: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| TransferError::retryable(format!("sync failed: {}", e)))?;

        if let Some(expected) = expected_len {
            if expected != written {
                return Err(TransferError::retryable(format!(
                    "incomplete body: got {} of {} bytes",
                    written, expected
                )));
            }
        }

        Ok(written)
    }

    /// Rename the finished temporary file to its final name
    async fn commit(&mut self) -> TransferResult<PathBuf> {
        let (Some(temp_path), Some(final_path)) = (self.temp_path.clone(), self.final_path.clone())
        else {
            return Err(TransferError::retryable("nothing to commit"));
        };

        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(|source| TransferError::Io {
                temp_path: temp_path.clone(),
                final_path: final_path.clone(),
                source,
            })?;

        self.temp_path = None;
        Ok(final_path)
    }

    /// Remove the temporary file, if one was created
    async fn discard_temp(&mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            remove_if_present(&temp_path).await;
        }
    }
}

impl Drop for Transfer {
    /// Covers attempts that never reached `finish`: a panic mid-stream or a
    /// cancelled task
    fn drop(&mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            match std::fs::remove_file(&temp_path) {
                Ok(()) => tracing::debug!("Removed abandoned file {}", temp_path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Could not remove abandoned file {}: {}",
                    temp_path.display(),
                    e
                ),
            }
        }
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove partial file {}: {}", path.display(), e),
    }
}
