//! Byte transport for layer descriptors and tile payloads.
//!
//! The provider never talks to the network directly. It goes through the
//! [`Fetch`] trait, so tests and offline tools can serve bytes from memory.
//!
//! # Implementations
//!
//! - [`HttpFetcher`]: HTTP(S) via reqwest
//! - [`MemoryFetcher`]: In-memory map of URL to bytes

use crate::error::{Error, Result};
use reqwest::Url;
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
};

/// Future type for fetch operations.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + 'a>>;

/// A single GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    /// Value for the `Accept` header, if any.
    pub accept: Option<String>,
}

impl FetchRequest {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { url, accept: None }
    }

    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// Something that can turn a URL into bytes.
pub trait Fetch: Send + Sync + 'static {
    /// Fetch the full body of `request`.
    ///
    /// Non-success statuses must be reported as [`Error::HttpStatus`].
    fn fetch(&self, request: &FetchRequest) -> FetchFuture<'_>;
}

/// Fetcher backed by a reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing reqwest client, e.g. one with custom timeouts.
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let url = request.url.to_string();
            tracing::debug!("Fetching {url}");

            let mut builder = self.http.get(request.url);
            if let Some(accept) = &request.accept {
                builder = builder.header(reqwest::header::ACCEPT, accept);
            }

            let response = builder.send().await.map_err(|e| Error::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(|e| Error::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;

            tracing::debug!("Fetched {} bytes from {url}", bytes.len());
            Ok(bytes.to_vec())
        })
    }
}

/// Fetcher serving bytes from an in-memory map.
///
/// Unknown URLs answer with status 404. Every request is recorded, which
/// lets callers check what was fetched and with which `Accept` header.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    data: Arc<RwLock<MemoryFetcherInner>>,
}

#[derive(Debug, Default)]
struct MemoryFetcherInner {
    entries: HashMap<String, Vec<u8>>,
    requests: Vec<FetchRequest>,
}

impl MemoryFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `data` for `url`, replacing any previous entry.
    pub fn insert(&self, url: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .insert(url.into(), data.into());
    }

    /// All requests made so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }

    /// URLs of all requests made so far, oldest first.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.url.to_string()).collect()
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture<'_> {
        let url = request.url.to_string();
        let result = {
            let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
            data.requests.push(request.clone());
            data.entries.get(&url).cloned()
        };
        Box::pin(async move { result.ok_or(Error::HttpStatus { url, status: 404 }) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://example.com/a.terrain", vec![1, 2, 3]);

        let url = Url::parse("https://example.com/a.terrain").unwrap();
        let request = FetchRequest::new(url).with_accept("application/octet-stream");
        assert_eq!(fetcher.fetch(&request).await.unwrap(), vec![1, 2, 3]);

        let missing = FetchRequest::new(Url::parse("https://example.com/b.terrain").unwrap());
        assert!(matches!(
            fetcher.fetch(&missing).await,
            Err(Error::HttpStatus { status: 404, .. })
        ));

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].accept.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(
            fetcher.requested_urls()[1],
            "https://example.com/b.terrain"
        );
    }

    #[tokio::test]
    async fn test_memory_fetcher_clones_share_entries() {
        let fetcher = MemoryFetcher::new();
        let clone = fetcher.clone();
        clone.insert("https://example.com/layer.json", b"{}".to_vec());

        let request = FetchRequest::new(Url::parse("https://example.com/layer.json").unwrap());
        assert_eq!(fetcher.fetch(&request).await.unwrap(), b"{}");
        assert_eq!(clone.requests().len(), 1);
    }
}
