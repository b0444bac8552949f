//! The terrain provider: resolves a layered tileset once, then answers
//! availability queries and serves tile geometry.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, OnceLock},
    task::{Context, Poll},
};

use reqwest::Url;
use terrain_decode::{ExtensionRequest, decode_heightmap, decode_quantized_mesh};
use tokio::sync::watch;

use crate::admission::{Admission, AdmissionPermit, RequestScheduler};
use crate::availability::{Availability, child_mask};
use crate::error::{Error, Result};
use crate::fetch::{Fetch, FetchRequest, HttpFetcher};
use crate::layer::{LayerMetadata, TileFormat};
use crate::resolver::{DEFAULT_MAX_LAYER_DEPTH, LayerChainResolver};
use crate::router::{Route, TileRequestRouter};
use crate::stack::{Credits, LayerStack};
use crate::tiling::{
    BoundingRegion, Ellipsoid, GeographicTilingScheme, MAXIMUM_LEVEL, OrientedBoundingBox,
    Rectangle, TilingScheme, level_maximum_geometric_error,
};
use crate::types::{
    ErrorEvent, HeightmapTerrainData, QuantizedMeshTerrainData, TerrainTileData, TileKey,
};

/// Number of undelivered error events kept before new ones are dropped.
pub const DEFAULT_ERROR_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`TerrainProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainProviderOptions {
    /// Base URL of the root tileset; its descriptor is `<url>/layer.json`.
    pub url: String,
    pub request_vertex_normals: bool,
    pub request_water_mask: bool,
    pub request_metadata: bool,
    /// Credit shown in addition to the layers' attributions.
    pub credit: Option<String>,
    pub max_layer_depth: usize,
    pub ellipsoid: Ellipsoid,
    pub error_channel_capacity: usize,
}

impl TerrainProviderOptions {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_vertex_normals: false,
            request_water_mask: false,
            request_metadata: true,
            credit: None,
            max_layer_depth: DEFAULT_MAX_LAYER_DEPTH,
            ellipsoid: Ellipsoid::WGS84,
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_vertex_normals(mut self, request: bool) -> Self {
        self.request_vertex_normals = request;
        self
    }

    #[must_use]
    pub fn with_water_mask(mut self, request: bool) -> Self {
        self.request_water_mask = request;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, request: bool) -> Self {
        self.request_metadata = request;
        self
    }

    #[must_use]
    pub fn with_credit(mut self, credit: impl Into<String>) -> Self {
        self.credit = Some(credit.into());
        self
    }

    #[must_use]
    pub fn with_max_layer_depth(mut self, max_layer_depth: usize) -> Self {
        self.max_layer_depth = max_layer_depth;
        self
    }

    #[must_use]
    pub fn with_ellipsoid(mut self, ellipsoid: Ellipsoid) -> Self {
        self.ellipsoid = ellipsoid;
        self
    }

    #[must_use]
    pub fn with_error_channel_capacity(mut self, capacity: usize) -> Self {
        self.error_channel_capacity = capacity.max(1);
        self
    }

    /// The extensions the caller asked for.
    #[must_use]
    pub fn extension_request(&self) -> ExtensionRequest {
        ExtensionRequest {
            vertex_normals: self.request_vertex_normals,
            water_mask: self.request_water_mask,
            metadata: self.request_metadata,
            ..ExtensionRequest::default()
        }
    }
}

/// Lifecycle of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderState {
    Uninitialized,
    Resolving,
    Ready,
    Failed,
}

/// Result of [`TerrainProvider::request_tile_geometry`].
#[derive(Debug)]
pub enum TileResponse {
    /// The request was issued; await the handle for the tile.
    Pending(TileHandle),
    /// The server is at capacity. Not an error: retry later.
    NoCapacity,
    /// No layer has the tile. Nothing was fetched.
    Unavailable,
}

type TileFuture = Pin<Box<dyn Future<Output = Result<TerrainTileData>> + Send>>;

/// An in-flight tile request.
///
/// Resolves exactly once to the decoded tile or the error that prevented
/// it. Dropping the handle cancels the request and frees its admission
/// slot; a cancelled request never reports anything.
pub struct TileHandle {
    key: TileKey,
    url: Url,
    future: TileFuture,
}

impl TileHandle {
    /// The requested tile, in the caller's rows.
    #[must_use]
    pub fn key(&self) -> TileKey {
        self.key
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Abandon the request.
    pub fn cancel(self) {
        tracing::trace!(tile = %self.key, "cancelled tile request");
        drop(self);
    }
}

impl Future for TileHandle {
    type Output = Result<TerrainTileData>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl fmt::Debug for TileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileHandle")
            .field("key", &self.key)
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

/// Serves terrain from a layered quantized-mesh or heightmap tileset.
///
/// The provider is cheap to clone; clones share the resolved layers, the
/// admission state and the error channel.
///
/// # Coordinates
///
/// Public queries take rows counted from the north (XYZ). They are
/// converted to the south-origin rows (TMS) that layers use before lookup.
pub struct TerrainProvider<F: Fetch = HttpFetcher, A: Admission = RequestScheduler> {
    inner: Arc<Inner<F, A>>,
}

struct Inner<F: Fetch, A: Admission> {
    options: TerrainProviderOptions,
    fetcher: Arc<F>,
    admission: Arc<A>,
    tiling_scheme: GeographicTilingScheme,
    state: watch::Sender<ProviderState>,
    resolved: OnceLock<std::result::Result<LayerStack, String>>,
    errors_tx: async_channel::Sender<ErrorEvent>,
    errors_rx: async_channel::Receiver<ErrorEvent>,
}

impl<F: Fetch, A: Admission> Clone for TerrainProvider<F, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl TerrainProvider {
    /// Create a provider fetching over HTTP with the default admission
    /// ceiling.
    #[must_use]
    pub fn new(options: TerrainProviderOptions) -> Self {
        Self::with_parts(
            options,
            Arc::new(HttpFetcher::new()),
            Arc::new(RequestScheduler::new()),
        )
    }
}

impl<F: Fetch> TerrainProvider<F> {
    /// Create a provider with a custom fetcher.
    #[must_use]
    pub fn with_fetcher(options: TerrainProviderOptions, fetcher: Arc<F>) -> Self {
        Self::with_parts(options, fetcher, Arc::new(RequestScheduler::new()))
    }
}

impl<F: Fetch, A: Admission> TerrainProvider<F, A> {
    /// Create a provider with a custom fetcher and admission system.
    #[must_use]
    pub fn with_parts(options: TerrainProviderOptions, fetcher: Arc<F>, admission: Arc<A>) -> Self {
        let (errors_tx, errors_rx) = async_channel::bounded(options.error_channel_capacity.max(1));
        let (state, _) = watch::channel(ProviderState::Uninitialized);
        let tiling_scheme = GeographicTilingScheme::new(options.ellipsoid);

        Self {
            inner: Arc::new(Inner {
                options,
                fetcher,
                admission,
                tiling_scheme,
                state,
                resolved: OnceLock::new(),
                errors_tx,
                errors_rx,
            }),
        }
    }

    #[must_use]
    pub fn options(&self) -> &TerrainProviderOptions {
        &self.inner.options
    }

    #[must_use]
    pub fn tiling_scheme(&self) -> &GeographicTilingScheme {
        &self.inner.tiling_scheme
    }

    /// Resolve the layer chain, or wait for a resolution already in
    /// progress.
    ///
    /// Resolution happens at most once. Inside a tokio runtime it runs on its
    /// own task, so dropping the caller that started it does not stop it.
    /// Every caller observes the same outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Failed`] if the layers could not be resolved.
    pub async fn ready(&self) -> Result<()> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == ProviderState::Uninitialized {
                *state = ProviderState::Resolving;
                true
            } else {
                false
            }
        });
        if claimed {
            let provider = self.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => drop(runtime.spawn(provider.resolve())),
                Err(_) => provider.resolve().await,
            }
        }

        let mut state = self.inner.state.subscribe();
        let state = *state
            .wait_for(|state| *state != ProviderState::Resolving)
            .await
            .map_err(|_| Error::NotReady)?;

        match state {
            ProviderState::Ready => Ok(()),
            ProviderState::Failed => self.stack().map(|_| ()),
            ProviderState::Uninitialized | ProviderState::Resolving => Err(Error::NotReady),
        }
    }

    async fn resolve(self) {
        let mut guard = ResolveGuard {
            inner: &self.inner,
            finished: false,
        };

        let url = &self.inner.options.url;
        tracing::debug!(url = %url, "resolving terrain layers");

        let resolver = LayerChainResolver::new(Arc::clone(&self.inner.fetcher))
            .with_max_depth(self.inner.options.max_layer_depth);
        let state = match resolver.resolve(url).await {
            Ok(stack) => {
                tracing::info!(
                    url = %url,
                    layers = stack.len(),
                    "terrain provider ready"
                );
                let _ = self.inner.resolved.set(Ok(stack));
                ProviderState::Ready
            }
            Err(e) => {
                tracing::error!(url = %url, "Failed to resolve terrain layers: {e}");
                self.inner.fail(e.to_string());
                ProviderState::Failed
            }
        };

        guard.finished = true;
        self.inner.state.send_replace(state);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProviderState {
        *self.inner.state.borrow()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.resolved.get(), Some(Ok(_)))
    }

    /// Receiver for asynchronous failures: layer resolution and tile
    /// requests.
    #[must_use]
    pub fn errors(&self) -> async_channel::Receiver<ErrorEvent> {
        self.inner.errors_rx.clone()
    }

    /// The resolved layers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] before resolution and [`Error::Failed`]
    /// after a failed one.
    pub fn stack(&self) -> Result<&LayerStack> {
        match self.inner.resolved.get() {
            Some(Ok(stack)) => Ok(stack),
            Some(Err(message)) => Err(Error::Failed {
                message: message.clone(),
            }),
            None => Err(Error::NotReady),
        }
    }

    /// The resolved layers, most specific first.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn layers(&self) -> Result<&[LayerMetadata]> {
        self.stack().map(LayerStack::layers)
    }

    /// Attributions of the layers, child first, without duplicates.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn credits(&self) -> Result<&Credits> {
        self.stack().map(LayerStack::credits)
    }

    /// The credit passed in the options, if any.
    #[must_use]
    pub fn credit(&self) -> Option<&str> {
        self.inner.options.credit.as_deref()
    }

    /// Whether tiles will carry vertex normals: requested and served by at
    /// least one layer.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn has_vertex_normals(&self) -> Result<bool> {
        Ok(self.inner.options.request_vertex_normals && self.stack()?.has_vertex_normals())
    }

    /// Whether tiles will carry water masks: requested and served by at
    /// least one layer.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn has_water_mask(&self) -> Result<bool> {
        Ok(self.inner.options.request_water_mask && self.stack()?.has_water_mask())
    }

    /// Whether tiles will carry the metadata extension.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn has_metadata(&self) -> Result<bool> {
        Ok(self.inner.options.request_metadata && self.stack()?.has_metadata())
    }

    /// Geometric error of tiles at `level`. Available before readiness.
    #[must_use]
    pub fn get_level_maximum_geometric_error(&self, level: u32) -> f64 {
        level_maximum_geometric_error(&self.inner.tiling_scheme, level)
    }

    /// Convert a caller tile to TMS rows, or `None` if it is outside the
    /// tiling scheme. Levels past [`MAXIMUM_LEVEL`] have no tiles.
    fn to_tms(&self, level: u32, x: u32, y: u32) -> Option<TileKey> {
        let scheme = &self.inner.tiling_scheme;
        if x >= scheme.number_of_x_tiles_at_level(level) {
            return None;
        }
        let rows = scheme.number_of_y_tiles_at_level(level);
        let tms_y = rows.checked_sub(1)?.checked_sub(y)?;
        Some(TileKey::new(level, x, tms_y))
    }

    /// Merged availability of a tile.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn tile_availability(&self, level: u32, x: u32, y: u32) -> Result<Availability> {
        let stack = self.stack()?;
        Ok(match self.to_tms(level, x, y) {
            Some(key) => stack.availability(key.level, key.x, key.y),
            None => Availability::Unavailable,
        })
    }

    /// Whether any layer is known to have the tile.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready.
    pub fn get_tile_data_available(&self, level: u32, x: u32, y: u32) -> Result<bool> {
        Ok(self.tile_availability(level, x, y)?.is_available())
    }

    /// Start loading a tile.
    ///
    /// Never blocks: the tile is routed, an admission slot is taken and a
    /// handle is returned. Fetching and decoding happen when the handle is
    /// polled. The slot is given back once the payload has arrived, or
    /// when the handle is dropped.
    ///
    /// # Errors
    ///
    /// Fails if the provider is not ready or the tile URL is invalid.
    pub fn request_tile_geometry(&self, level: u32, x: u32, y: u32) -> Result<TileResponse> {
        let stack = self.stack()?;
        let Some(tms) = self.to_tms(level, x, y) else {
            return Ok(TileResponse::Unavailable);
        };

        let router = TileRequestRouter::new(stack, self.inner.options.extension_request());
        let spec = match router.build_request(tms.level, tms.x, tms.y)? {
            Route::Fetch(spec) => spec,
            Route::Unavailable => return Ok(TileResponse::Unavailable),
        };

        let Some(permit) = AdmissionPermit::try_acquire(&self.inner.admission, &spec.server_key)
        else {
            tracing::trace!(server = %spec.server_key, "no capacity for tile request");
            return Ok(TileResponse::NoCapacity);
        };

        let context = DecodeContext {
            key: tms,
            format: spec.format,
            extensions: spec.extensions,
            child_tile_mask: stack.child_mask(tms.level, tms.x, tms.y),
            rectangle: self.inner.tiling_scheme.tile_rectangle(tms.level, tms.x, tms.y),
            ellipsoid: self.inner.options.ellipsoid,
        };
        let request = FetchRequest::new(spec.url.clone()).with_accept(spec.accept);
        let fetcher = Arc::clone(&self.inner.fetcher);
        let errors = self.inner.errors_tx.clone();
        let key = TileKey::new(level, x, y);

        let future = async move {
            let fetched = fetcher.fetch(&request).await;
            drop(permit);

            let result = fetched.and_then(|bytes| context.decode(&bytes));
            if let Err(e) = &result {
                tracing::warn!(tile = %key, url = %request.url, "Failed to load terrain tile: {e}");
                if errors
                    .try_send(ErrorEvent {
                        message: e.to_string(),
                        tile: Some(key),
                    })
                    .is_err()
                {
                    tracing::debug!("error channel full, dropping event");
                }
            }
            result
        };

        Ok(TileResponse::Pending(TileHandle {
            key,
            url: spec.url,
            future: Box::pin(future),
        }))
    }
}

impl<F: Fetch, A: Admission> Inner<F, A> {
    /// Record a resolution failure and report it on the error channel.
    fn fail(&self, message: String) {
        if self
            .errors_tx
            .try_send(ErrorEvent {
                message: message.clone(),
                tile: None,
            })
            .is_err()
        {
            tracing::debug!("error channel full, dropping event");
        }
        let _ = self.resolved.set(Err(message));
    }
}

/// Fails the provider if resolution is abandoned before it finishes, e.g.
/// when the runtime shuts down under it.
struct ResolveGuard<'a, F: Fetch, A: Admission> {
    inner: &'a Inner<F, A>,
    finished: bool,
}

impl<F: Fetch, A: Admission> Drop for ResolveGuard<'_, F, A> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!(url = %self.inner.options.url, "terrain layer resolution was abandoned");
            self.inner.fail("layer resolution was abandoned".to_owned());
            self.inner.state.send_replace(ProviderState::Failed);
        }
    }
}

/// What a tile future needs to decode its payload, detached from the
/// provider.
struct DecodeContext {
    /// The tile in TMS rows.
    key: TileKey,
    format: TileFormat,
    extensions: ExtensionRequest,
    child_tile_mask: u8,
    rectangle: Rectangle,
    ellipsoid: Ellipsoid,
}

impl DecodeContext {
    fn decode(&self, bytes: &[u8]) -> Result<TerrainTileData> {
        match self.format {
            TileFormat::Heightmap => Ok(TerrainTileData::Heightmap(HeightmapTerrainData {
                heightmap: decode_heightmap(bytes, self.extensions.water_mask)?,
            })),
            TileFormat::QuantizedMesh => {
                let mesh = decode_quantized_mesh(bytes, &self.extensions)?;

                let mut child_tile_mask = self.child_tile_mask;
                if let Some(children) = mesh.metadata.as_ref().and_then(|m| m.available.first()) {
                    child_tile_mask |= child_mask(
                        |x, y| children.iter().any(|range| range.contains(x, y)),
                        self.key.x,
                        self.key.y,
                    );
                }

                let bounding_region = BoundingRegion {
                    rectangle: self.rectangle,
                    minimum_height: f64::from(mesh.header.minimum_height),
                    maximum_height: f64::from(mesh.header.maximum_height),
                };
                let oriented_bounding_box =
                    OrientedBoundingBox::from_region(&bounding_region, &self.ellipsoid);

                Ok(TerrainTileData::QuantizedMesh(QuantizedMeshTerrainData {
                    mesh,
                    child_tile_mask,
                    bounding_region,
                    oriented_bounding_box,
                }))
            }
        }
    }
}
