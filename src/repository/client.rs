// src/repository/client.rs

//! HTTP client for remote p2 repositories
//!
//! Wraps reqwest with retry support for fetching repository content and
//! streaming artifact bytes into a sink. In offline mode every request
//! fails with [`Error::OfflineError`] before touching the network.

use std::io::{Read, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::progress::{ProgressTracker, checkpoint};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Join a repository location and a relative path
///
/// The base is treated as a directory. Locations that are not absolute
/// URLs are joined textually.
pub fn join_url(base: &str, relative: &str) -> String {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    match Url::parse(&base).and_then(|url| url.join(relative)) {
        Ok(url) => url.into(),
        Err(_) => format!("{base}{relative}"),
    }
}

/// Copy a response body into `sink` in chunks, checking for cancellation
fn stream_response(
    mut response: reqwest::blocking::Response,
    sink: &mut dyn Write,
    monitor: &dyn ProgressTracker,
) -> Result<u64> {
    let mut copied: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        checkpoint(monitor)?;
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::IoError(format!("Failed to read response: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        sink.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;

        copied += bytes_read as u64;
        monitor.increment(bytes_read as u64);
    }

    Ok(copied)
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
    offline: bool,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new(offline: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
            offline,
        })
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    fn ensure_online(&self, url: &str) -> Result<()> {
        if self.offline {
            return Err(Error::OfflineError(url.to_string()));
        }
        Ok(())
    }

    /// Send a GET request, retrying transport failures
    fn get_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response> {
        self.ensure_online(url)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if response.status() == reqwest::StatusCode::NOT_FOUND {
                        return Err(Error::NotFoundError(url.to_string()));
                    }
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Fetch and deserialize a JSON document
    pub fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        info!("Fetching {}", url);
        let response = self.get_with_retry(url)?;
        response
            .json()
            .map_err(|e| Error::DownloadError(format!("Failed to parse JSON from {url}: {e}")))
    }

    /// Check whether a URL exists without downloading it
    pub fn exists(&self, url: &str) -> Result<bool> {
        self.ensure_online(url)?;
        match self.client.head(url).send() {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => Err(Error::DownloadError(format!("Failed to query {url}: {e}"))),
        }
    }

    /// Stream a URL into `sink`
    ///
    /// Never buffers the whole body. The monitor is advanced by the number
    /// of bytes copied and checked for cancellation between chunks.
    pub fn download_to(&self, url: &str, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Result<u64> {
        debug!("Downloading {}", url);
        let response = self.get_with_retry(url)?;
        if let Some(length) = response.content_length() {
            monitor.set_length(length);
        }
        let copied = stream_response(response, sink, monitor)?;
        debug!("Downloaded {} bytes from {}", copied, url);
        Ok(copied)
    }
}
