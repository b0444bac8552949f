//! Async provider for layered quantized-mesh and heightmap terrain.
//!
//! A tileset is described by a `layer.json` document which may name a parent
//! tileset, forming a chain of layers. The most specific layer that has a
//! tile serves it; tiles it lacks fall through to its ancestors.
//!
//! # Design principles
//!
//! - **Resolve once**: The layer chain is fetched a single time and shared by
//!   every clone of a provider
//! - **Never block**: Tile requests either start, report that the server is
//!   at capacity, or report that no layer has the tile
//! - **Pluggable I/O**: Fetching and admission are traits, so tests run
//!   against in-memory data
//!
//! # Example
//!
//! ```ignore
//! use terrain::{TerrainProvider, TerrainProviderOptions, TileResponse};
//!
//! let provider = TerrainProvider::new(
//!     TerrainProviderOptions::new("https://example.com/terrain").with_vertex_normals(true),
//! );
//! provider.ready().await?;
//!
//! if provider.get_tile_data_available(0, 0, 0)? {
//!     if let TileResponse::Pending(handle) = provider.request_tile_geometry(0, 0, 0)? {
//!         let tile = handle.await?;
//!         println!("child mask: {:04b}", tile.child_tile_mask());
//!     }
//! }
//! ```

mod error;

pub mod admission;
pub mod availability;
pub mod fetch;
pub mod layer;
pub mod provider;
pub mod resolver;
pub mod router;
pub mod stack;
pub mod tiling;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use admission::{Admission, AdmissionPermit, RequestScheduler};
pub use availability::{Availability, AvailabilityTree};
pub use error::{Error, Result};
pub use fetch::{Fetch, FetchFuture, FetchRequest, HttpFetcher, MemoryFetcher};
pub use layer::{LayerMetadata, TileFormat};
pub use provider::{
    ProviderState, TerrainProvider, TerrainProviderOptions, TileHandle, TileResponse,
};
pub use resolver::LayerChainResolver;
pub use router::{Route, TileFetchSpec, TileRequestRouter};
pub use stack::{Credits, LayerStack};
pub use tiling::{
    BoundingRegion, Ellipsoid, GeographicTilingScheme, MAXIMUM_LEVEL, OrientedBoundingBox,
    Rectangle, TilingScheme,
};
pub use types::{
    ErrorEvent, HeightmapTerrainData, QuantizedMeshTerrainData, TerrainTileData, TileKey,
};

pub use terrain_decode::{
    DecodeError, ExtensionRequest, HeightmapTile, Indices, QuantizedMesh, TileMetadata,
    TileRange, WaterMask,
};
