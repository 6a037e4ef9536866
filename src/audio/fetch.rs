//! Asset transport: local files or HTTP.

use crate::error::LoadError;
use async_trait::async_trait;
use log::trace;
use std::sync::Arc;

/// Retrieves the raw bytes behind an asset URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

/// Reads assets from the local filesystem. Accepts plain paths and `file://` URLs.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AssetFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        trace!("Reading {}", path);

        tokio::fs::read(path).await.map_err(|source| LoadError::Io {
            url: url.to_string(),
            source,
        })
    }
}

/// Fetches assets over HTTP(S). Any non-success status is a failure.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let network = |e: reqwest::Error| LoadError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(network)?;
        Ok(bytes.to_vec())
    }
}

/// Picks the transport matching an asset root.
pub fn fetcher_for(asset_root: &str) -> Arc<dyn AssetFetcher> {
    if asset_root.starts_with("http://") || asset_root.starts_with("https://") {
        Arc::new(HttpFetcher::new())
    } else {
        Arc::new(FileFetcher::new())
    }
}
