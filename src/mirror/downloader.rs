//! Asset downloader
//!
//! Streams a resource to `<name>.part` and renames it into place only once
//! the whole body has arrived, so a file under its final name is always
//! complete. An existing file is never fetched again.

use crate::config::NetworkConfig;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Reasons an asset could not be stored
///
/// Never fatal: the caller logs it and leaves the reference to degrade.
#[derive(Debug, Error)]
pub enum AssetFetchError {
    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Builds the HTTP client shared by asset and sitemap downloads
///
/// # Arguments
///
/// * `config` - Network settings (timeout, user agent, `Accept-Language`)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &NetworkConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Downloads assets into the shared asset directory
#[derive(Debug, Clone)]
pub struct AssetDownloader {
    client: Client,
}

impl AssetDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Makes sure `local_path` holds the resource at `url`
    ///
    /// Returns `true` when the file exists afterwards. An existing file
    /// short-circuits without any network request. Failures are logged here
    /// and reported only as `false`.
    pub async fn fetch(&self, url: &Url, local_path: &Path) -> bool {
        if tokio::fs::try_exists(local_path).await.unwrap_or(false) {
            tracing::trace!(url = %url, path = %local_path.display(), "Asset already on disk");
            return true;
        }

        match self.download(url, local_path).await {
            Ok(bytes) => {
                tracing::debug!(url = %url, bytes, "Fetched asset");
                true
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Asset download failed");
                false
            }
        }
    }

    async fn download(&self, url: &Url, local_path: &Path) -> Result<u64, AssetFetchError> {
        let partial = partial_path(local_path);

        let result = self.stream_to(url, &partial).await;
        let result = match result {
            Ok(bytes) => tokio::fs::rename(&partial, local_path)
                .await
                .map(|_| bytes)
                .map_err(|source| AssetFetchError::Io {
                    path: local_path.to_path_buf(),
                    source,
                }),
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }

        result
    }

    async fn stream_to(&self, url: &Url, partial: &Path) -> Result<u64, AssetFetchError> {
        let http_error = |source| AssetFetchError::Http {
            url: url.to_string(),
            source,
        };
        let io_error = |source| AssetFetchError::Io {
            path: partial.to_path_buf(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = partial.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let mut file = tokio::fs::File::create(partial).await.map_err(io_error)?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_error)?;
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(io_error)?;
        Ok(written)
    }
}

fn partial_path(local_path: &Path) -> PathBuf {
    let mut name = local_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    local_path.with_file_name(name)
}
