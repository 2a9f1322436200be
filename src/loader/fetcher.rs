//! Fetcher Module
//!
//! Turns a resource address into raw bytes. Retries and authentication are
//! the fetcher's own business; the loader calls it at most once per flight.

use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;

// == Fetcher Trait ==
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves the raw bytes stored at `address`.
    async fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError>;
}

// == HTTP Fetcher ==
/// Fetches resources over HTTP(S) with a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client (timeouts, proxies, headers).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            address: address.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(address).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        debug!(address, bytes = body.len(), "Fetched resource");
        Ok(body.to_vec())
    }
}
