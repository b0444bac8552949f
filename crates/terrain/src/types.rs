//! High-level types for decoded terrain.

use std::fmt;

use glam::DVec3;
use terrain_decode::{HeightmapTile, QuantizedMesh, WaterMask};

use crate::tiling::{BoundingRegion, OrientedBoundingBox};

/// A quadtree tile. Rows are TMS (south-origin) unless stated otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    #[must_use]
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// A decoded heightmap tile.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapTerrainData {
    pub heightmap: HeightmapTile,
}

/// A decoded quantized-mesh tile with the bounding volumes of its tile.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedMeshTerrainData {
    pub mesh: QuantizedMesh,
    /// Bit 0 SW, bit 1 SE, bit 2 NW, bit 3 NE child available.
    pub child_tile_mask: u8,
    pub bounding_region: BoundingRegion,
    pub oriented_bounding_box: OrientedBoundingBox,
}

impl QuantizedMeshTerrainData {
    #[must_use]
    pub fn horizon_occlusion_point(&self) -> DVec3 {
        self.mesh.header.horizon_occlusion_point
    }
}

/// Terrain for one tile, in one of the two supported representations.
#[derive(Debug, Clone, PartialEq)]
pub enum TerrainTileData {
    Heightmap(HeightmapTerrainData),
    QuantizedMesh(QuantizedMeshTerrainData),
}

impl TerrainTileData {
    #[must_use]
    pub fn child_tile_mask(&self) -> u8 {
        match self {
            Self::Heightmap(data) => data.heightmap.child_tile_mask,
            Self::QuantizedMesh(data) => data.child_tile_mask,
        }
    }

    #[must_use]
    pub fn water_mask(&self) -> Option<&WaterMask> {
        match self {
            Self::Heightmap(data) => data.heightmap.water_mask.as_ref(),
            Self::QuantizedMesh(data) => data.mesh.water_mask.as_ref(),
        }
    }

    #[must_use]
    pub fn as_quantized_mesh(&self) -> Option<&QuantizedMeshTerrainData> {
        match self {
            Self::QuantizedMesh(data) => Some(data),
            Self::Heightmap(_) => None,
        }
    }

    #[must_use]
    pub fn as_heightmap(&self) -> Option<&HeightmapTerrainData> {
        match self {
            Self::Heightmap(data) => Some(data),
            Self::QuantizedMesh(_) => None,
        }
    }
}

/// An asynchronous failure reported on a provider's error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub message: String,
    /// The tile whose request failed, in the caller's rows. `None` for
    /// layer resolution failures.
    pub tile: Option<TileKey>,
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tile {
            Some(tile) => write!(f, "tile {tile}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
