//! Streaming HTTP fetcher with bounded retry
//!
//! The fetcher writes a remote resource to a file without buffering the whole
//! body. Transient transport failures are retried according to
//! [`RetryConfig`]; anything else fails the fetch immediately. A transfer that
//! completes but leaves an empty file counts as a failure.

use crate::config::RetryConfig;
use crate::error::{Error, FetchError, Result};
use crate::retry::retry_transient;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info};

/// Timeout for establishing a connection to a media host
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Streams HTTP resources to disk, retrying transient failures
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new(retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, retry })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Retry policy in use
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Download `url` into `dest`, returning the number of bytes written
    ///
    /// The parent directory of `dest` must exist. On failure the destination
    /// may be absent, empty or partially written.
    ///
    /// # Errors
    ///
    /// - [`FetchError::HttpStatus`] when the server answers with an error status
    /// - [`FetchError::EmptyBody`] when the transfer succeeds but writes nothing
    /// - [`Error::Network`] when every attempt failed at the transport level
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        retry_transient(&self.retry, || self.fetch_once(url, dest)).await?;

        let written = tokio::fs::metadata(dest).await?.len();
        if written == 0 {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            }
            .into());
        }

        info!(url, ?dest, bytes = written, "downloaded");
        Ok(written)
    }

    /// Download `url` into `dest`, reporting only success or failure
    ///
    /// Never returns an error: failures are logged and reported as `false`.
    pub async fn download(&self, url: &str, dest: &Path) -> bool {
        match self.fetch_to_file(url, dest).await {
            Ok(_) => true,
            Err(e) => {
                error!(url, ?dest, error = %e, "failed to download");
                false
            }
        }
    }

    async fn fetch_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let write_failed = |e: std::io::Error| -> Error {
            FetchError::WriteFailed {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        };

        let file = tokio::fs::File::create(dest).await.map_err(write_failed)?;
        let mut writer = BufWriter::with_capacity(self.retry.chunk_size, file);
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await.map_err(write_failed)?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(write_failed)?;

        debug!(url, bytes = written, "transfer complete");
        Ok(written)
    }
}
