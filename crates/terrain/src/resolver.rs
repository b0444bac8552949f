//! Follows `parentUrl` references to build a [`LayerStack`].

use std::sync::Arc;

use reqwest::Url;

use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchRequest};
use crate::layer::{LayerMetadata, descriptor_url};
use crate::stack::LayerStack;

/// Default maximum number of layers in a chain.
pub const DEFAULT_MAX_LAYER_DEPTH: usize = 5;

const DESCRIPTOR_ACCEPT: &str = "application/json,*/*;q=0.01";

/// Resolves a tileset and all of its ancestors.
///
/// Resolution is a bounded loop: each descriptor is fetched, parsed and
/// pushed after its child, and a chain longer than the depth limit is an
/// error. Malformed data that points back at itself therefore fails instead
/// of looping forever.
#[derive(Debug)]
pub struct LayerChainResolver<F: Fetch> {
    fetcher: Arc<F>,
    max_depth: usize,
}

impl<F: Fetch> LayerChainResolver<F> {
    #[must_use]
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            max_depth: DEFAULT_MAX_LAYER_DEPTH,
        }
    }

    /// Set the maximum number of layers. At least one layer is always allowed.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve the tileset rooted at `base_url`, whose descriptor lives at
    /// `<base_url>/layer.json`.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, parse or depth error encountered.
    pub async fn resolve(&self, base_url: &str) -> Result<LayerStack> {
        let url = descriptor_url(base_url)?;
        let bytes = self.fetch_descriptor(&url).await?;
        self.resolve_document(url, &bytes).await
    }

    /// Resolve starting from an already fetched descriptor.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, parse or depth error encountered.
    pub async fn resolve_document(&self, url: Url, bytes: &[u8]) -> Result<LayerStack> {
        let mut layers = Vec::new();
        let mut layer = LayerMetadata::parse(&url, bytes)?;

        loop {
            let parent = layer.resolve_parent()?;
            tracing::debug!(
                url = %layer.url,
                format = %layer.format,
                templates = layer.url_templates.len(),
                "parsed layer descriptor"
            );
            layers.push(layer);

            let Some(parent_url) = parent else {
                break;
            };
            if layers.len() >= self.max_depth {
                return Err(Error::ChainTooDeep {
                    url: parent_url.to_string(),
                    max_depth: self.max_depth,
                });
            }

            let bytes = self.fetch_descriptor(&parent_url).await?;
            layer = LayerMetadata::parse(&parent_url, &bytes)?;
        }

        Ok(LayerStack::new(layers))
    }

    async fn fetch_descriptor(&self, url: &Url) -> Result<Vec<u8>> {
        tracing::debug!(url = %url, "fetching layer descriptor");
        let request = FetchRequest::new(url.clone()).with_accept(DESCRIPTOR_ACCEPT);
        self.fetcher.fetch(&request).await
    }
}
