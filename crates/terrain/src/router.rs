//! Turns a tile coordinate into a concrete request.

use reqwest::Url;
use terrain_decode::ExtensionRequest;

use crate::availability::Availability;
use crate::error::{Error, Result};
use crate::layer::{LayerMetadata, TileFormat, merge_query};
use crate::stack::LayerStack;
use crate::types::TileKey;

const QUANTIZED_MESH_MEDIA_TYPE: &str = "application/vnd.quantized-mesh";
const ACCEPT_FALLBACK: &str = "application/octet-stream;q=0.9,*/*;q=0.01";

/// Everything needed to fetch and decode one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFetchSpec {
    /// The tile in TMS rows.
    pub key: TileKey,
    /// Index of the serving layer in the stack.
    pub layer_index: usize,
    pub format: TileFormat,
    pub url: Url,
    /// `host:port` of `url`, the admission key.
    pub server_key: String,
    pub accept: String,
    /// Extensions both requested and served by the layer, with the layer's
    /// extension length byte order.
    pub extensions: ExtensionRequest,
}

/// Outcome of routing a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Fetch(TileFetchSpec),
    /// No layer has the tile; nothing should be fetched.
    Unavailable,
}

/// Picks the layer serving a tile and builds its URL.
///
/// The router only reads the stack. It does no throttling; the returned
/// `server_key` is handed to the admission system by the caller.
#[derive(Debug, Clone, Copy)]
pub struct TileRequestRouter<'a> {
    stack: &'a LayerStack,
    requested: ExtensionRequest,
}

impl<'a> TileRequestRouter<'a> {
    /// Route over `stack` on behalf of a caller wanting `requested`.
    #[must_use]
    pub fn new(stack: &'a LayerStack, requested: ExtensionRequest) -> Self {
        Self { stack, requested }
    }

    /// Route the tile at `level`, `x`, `y` (TMS rows).
    ///
    /// The first layer reporting the tile available serves it. If none
    /// does, the first layer that cannot tell serves it. Otherwise the tile
    /// is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the expanded template is not a
    /// valid URL.
    pub fn build_request(&self, level: u32, x: u32, y: u32) -> Result<Route> {
        let key = TileKey::new(level, x, y);
        let mut fallback = None;
        for (index, layer) in self.stack.layers().iter().enumerate() {
            match layer.availability(level, x, y) {
                Availability::Available => {
                    return self.fetch_spec(index, layer, key).map(Route::Fetch);
                }
                Availability::Unknown if fallback.is_none() => fallback = Some((index, layer)),
                Availability::Unknown | Availability::Unavailable => {}
            }
        }

        match fallback {
            Some((index, layer)) => self.fetch_spec(index, layer, key).map(Route::Fetch),
            None => Ok(Route::Unavailable),
        }
    }

    fn fetch_spec(
        &self,
        layer_index: usize,
        layer: &LayerMetadata,
        key: TileKey,
    ) -> Result<TileFetchSpec> {
        let url = tile_url(layer, key)?;
        let server_key = server_key(&url);
        let extensions = ExtensionRequest {
            vertex_normals: self.requested.vertex_normals && layer.has_vertex_normals,
            water_mask: self.requested.water_mask && layer.has_water_mask,
            metadata: self.requested.metadata && layer.has_metadata,
            little_endian_extension_size: layer.little_endian_extension_size,
        };
        let accept = accept_header(&layer.extension_names(&self.requested));

        tracing::debug!(tile = %key, layer = layer_index, url = %url, "routed tile");

        Ok(TileFetchSpec {
            key,
            layer_index,
            format: layer.format,
            url,
            server_key,
            accept,
            extensions,
        })
    }
}

/// Expand the template serving `key` and resolve it against the layer URL.
///
/// Templates are rotated by `(x + y + level) mod n`, so a tile always maps
/// to the same server alias.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the result is not a valid URL.
pub fn tile_url(layer: &LayerMetadata, key: TileKey) -> Result<Url> {
    let count = layer.url_templates.len().max(1) as u64;
    let index = (u64::from(key.x) + u64::from(key.y) + u64::from(key.level)) % count;
    let template = usize::try_from(index)
        .ok()
        .and_then(|index| layer.url_templates.get(index))
        .ok_or_else(|| Error::NoTileTemplates {
            url: layer.url.to_string(),
        })?;

    let expanded = template
        .replace("{z}", &key.level.to_string())
        .replace("{x}", &key.x.to_string())
        .replace("{y}", &key.y.to_string())
        .replace("{version}", layer.version.as_deref().unwrap_or_default());

    let mut url = layer.url.join(&expanded).map_err(|e| Error::InvalidUrl {
        url: expanded.clone(),
        message: e.to_string(),
    })?;
    merge_query(&mut url, &layer.url);
    Ok(url)
}

/// `host:port` of a URL, using the scheme's default port if none is given.
#[must_use]
pub fn server_key(url: &Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

/// `Accept` header asking for a quantized mesh with `extensions`.
#[must_use]
pub fn accept_header(extensions: &[&str]) -> String {
    if extensions.is_empty() {
        format!("{QUANTIZED_MESH_MEDIA_TYPE},{ACCEPT_FALLBACK}")
    } else {
        format!(
            "{QUANTIZED_MESH_MEDIA_TYPE};extensions={},{ACCEPT_FALLBACK}",
            extensions.join("-")
        )
    }
}
