//! Artifact downloads
//!
//! [`Downloader`] is the seam between source resolution and the network.
//! [`HttpDownloader`] is the production implementation: a blocking HTTP client
//! with bounded retries and a progress bar. `file://` URLs are served from the
//! local filesystem so release mirrors can live on a shared drive.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{PairError, Result};
use crate::progress::DownloadProgress;

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Attempts made before a download error is surfaced
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Buffer size for reading/writing during downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Fetches a URL into a local file
pub trait Downloader: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// `dest` must not be trusted after an error.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Blocking HTTP downloader with bounded retries
#[derive(Debug)]
pub struct HttpDownloader {
    client: Client,
    attempts: u32,
    backoff: Duration,
    show_progress: bool,
}

impl HttpDownloader {
    /// Create a downloader with default timeout and retry policy
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a downloader with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pair-kb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PairError::DownloadFailed {
                url: String::new(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            attempts: DEFAULT_ATTEMPTS,
            backoff: Duration::from_millis(500),
            show_progress: false,
        })
    }

    /// Override the retry policy (linear back-off: `backoff * attempt`)
    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Show a progress bar while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn fetch_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let failed = |reason: String| PairError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("server returned {}", response.status())));
        }

        let progress = DownloadProgress::new(self.show_progress, response.content_length(), url);
        let file = File::create(dest).map_err(|e| crate::error::write_failed(dest, e))?;
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = response
                .read(&mut buffer)
                .map_err(|e| failed(format!("connection interrupted: {e}")))?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buffer[..n])
                .map_err(|e| crate::error::write_failed(dest, e))?;
            written += n as u64;
            progress.set_position(written);
        }
        writer.flush().map_err(|e| crate::error::write_failed(dest, e))?;
        progress.finish();

        Ok(written)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(path) = url.strip_prefix("file://") {
            return fs::copy(path, dest).map_err(|e| PairError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        let mut attempt = 1;
        loop {
            match self.fetch_once(url, dest) {
                Ok(bytes) => {
                    tracing::debug!(url, bytes, "downloaded");
                    return Ok(bytes);
                }
                Err(e @ PairError::DownloadFailed { .. }) if attempt < self.attempts => {
                    tracing::warn!(url, attempt, "download failed, retrying: {e}");
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether fetching `url` needs the network
pub fn is_remote_url(url: &str) -> bool {
    !url.starts_with("file://")
}
