//! Decode quantized-mesh and heightmap terrain tile payloads.
//!
//! This crate provides pure synchronous decoding functions for the binary
//! tile formats served by layered terrain tilesets. All functions are
//! designed to be called from any threading context - the library user
//! controls parallelism.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **All-or-nothing**: A decode either yields a complete tile or an error
//! - **Deterministic**: The same bytes always decode to the same tile

mod error;
pub mod extensions;
pub mod heightmap;
pub mod indices;
pub mod mesh;
pub mod reader;
pub mod vertices;

pub use error::{DecodeError, DecodeResult};
pub use extensions::{ExtensionId, ExtensionRequest, Extensions};
pub use heightmap::decode_heightmap;
pub use mesh::decode_quantized_mesh;

use glam::DVec3;
use serde::Deserialize;

/// Vertex count above which a quantized mesh switches to 32-bit indices.
pub const SIXTY_FOUR_KILOBYTES: usize = 64 * 1024;

/// Size of the fixed quantized-mesh header in bytes.
pub const QUANTIZED_MESH_HEADER_SIZE: usize = 88;

/// Width and height of a heightmap tile in samples.
pub const HEIGHTMAP_TILE_SIZE: usize = 65;

/// Width and height of a full water mask raster.
pub const WATER_MASK_SIZE: usize = 256;

/// A quantized vertex. Each component is in `0..=32767`, spanning the tile
/// extent (`u`, `v`) or the header's height range (`height`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QuantizedVertex {
    pub u: u16,
    pub v: u16,
    pub height: u16,
}

/// Index buffer whose element width depends on the vertex count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    /// Used when the mesh has at most 65536 vertices.
    U16(Vec<u16>),
    /// Used when the mesh has more than 65536 vertices.
    U32(Vec<u32>),
}

impl Indices {
    /// Size of one index element in bytes.
    #[must_use]
    pub fn bytes_per_element(&self) -> usize {
        match self {
            Self::U16(_) => 2,
            Self::U32(_) => 4,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the index at position `i`, widened to `u32`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(indices) => indices.get(i).copied().map(u32::from),
            Self::U32(indices) => indices.get(i).copied(),
        }
    }

    /// Iterate over all indices, widened to `u32`.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

/// Water coverage of a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaterMask {
    /// The whole tile is land (`0`) or water (`255`).
    Uniform(u8),
    /// A 256×256 row-major raster, north row first.
    Raster(Box<[u8]>),
}

impl WaterMask {
    /// Interpret a water mask payload by its length.
    pub fn from_bytes(bytes: &[u8]) -> DecodeResult<Self> {
        match bytes.len() {
            1 => Ok(Self::Uniform(bytes[0])),
            n if n == WATER_MASK_SIZE * WATER_MASK_SIZE => Ok(Self::Raster(bytes.into())),
            n => Err(DecodeError::InvalidFormat {
                context: "water mask",
                detail: format!(
                    "expected 1 or {} bytes, got {n}",
                    WATER_MASK_SIZE * WATER_MASK_SIZE
                ),
            }),
        }
    }

    /// Whether the mask covers the whole tile with a single value.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform(_))
    }
}

/// An inclusive rectangle of tiles at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRange {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl TileRange {
    #[must_use]
    pub fn new(start_x: u32, start_y: u32, end_x: u32, end_y: u32) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.start_x..=self.end_x).contains(&x) && (self.start_y..=self.end_y).contains(&y)
    }
}

/// Contents of the metadata extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TileMetadata {
    /// Available tile ranges for the levels below the tile, index 0 being
    /// the first child level.
    #[serde(default)]
    pub available: Vec<Vec<TileRange>>,
}

/// Bounding sphere stored in the quantized-mesh header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

/// The fixed 88-byte header of a quantized-mesh tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedMeshHeader {
    /// Center of the tile in Earth-centered Earth-fixed coordinates.
    pub center: DVec3,
    pub minimum_height: f32,
    pub maximum_height: f32,
    pub bounding_sphere: BoundingSphere,
    pub horizon_occlusion_point: DVec3,
}

/// A fully decoded quantized-mesh tile.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedMesh {
    pub header: QuantizedMeshHeader,
    pub vertices: Vec<QuantizedVertex>,
    /// Triangle list indices.
    pub indices: Indices,
    pub west_indices: Indices,
    pub south_indices: Indices,
    pub east_indices: Indices,
    pub north_indices: Indices,
    /// Oct-encoded normals, two bytes per vertex.
    pub encoded_normals: Option<Vec<u8>>,
    pub water_mask: Option<WaterMask>,
    pub metadata: Option<TileMetadata>,
}

impl QuantizedMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Height in meters of a vertex, dequantized against the header range.
    #[must_use]
    pub fn vertex_height(&self, vertex: usize) -> Option<f64> {
        let v = self.vertices.get(vertex)?;
        let min = f64::from(self.header.minimum_height);
        let max = f64::from(self.header.maximum_height);
        Some(min + (max - min) * f64::from(v.height) / 32767.0)
    }
}

/// Scale and offset converting raw heightmap samples to meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightmapStructure {
    pub height_scale: f64,
    pub height_offset: f64,
}

impl Default for HeightmapStructure {
    fn default() -> Self {
        Self {
            height_scale: 1.0 / 5.0,
            height_offset: -1000.0,
        }
    }
}

/// A decoded heightmap tile.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapTile {
    pub width: usize,
    pub height: usize,
    /// Row-major raw samples, north row first.
    pub heights: Vec<u16>,
    /// Bit 0 SW, bit 1 SE, bit 2 NW, bit 3 NE child present.
    pub child_tile_mask: u8,
    pub water_mask: Option<WaterMask>,
    pub structure: HeightmapStructure,
}

impl HeightmapTile {
    /// Height in meters at the given column and row.
    #[must_use]
    pub fn height_at(&self, column: usize, row: usize) -> Option<f64> {
        if column >= self.width || row >= self.height {
            return None;
        }
        let raw = self.heights[row * self.width + column];
        Some(f64::from(raw) * self.structure.height_scale + self.structure.height_offset)
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_mask_from_bytes() {
        assert_eq!(WaterMask::from_bytes(&[255]).unwrap(), WaterMask::Uniform(255));

        let raster = vec![7u8; WATER_MASK_SIZE * WATER_MASK_SIZE];
        let mask = WaterMask::from_bytes(&raster).unwrap();
        assert!(!mask.is_uniform());

        assert!(matches!(
            WaterMask::from_bytes(&[0, 0]),
            Err(DecodeError::InvalidFormat { .. })
        ));
        assert!(WaterMask::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_tile_range_contains_is_inclusive() {
        let range = TileRange::new(1, 2, 3, 4);
        assert!(range.contains(1, 2));
        assert!(range.contains(3, 4));
        assert!(!range.contains(0, 2));
        assert!(!range.contains(3, 5));
    }

    #[test]
    fn test_indices_width() {
        assert_eq!(Indices::U16(vec![0, 1, 2]).bytes_per_element(), 2);
        assert_eq!(Indices::U32(vec![0]).bytes_per_element(), 4);
        assert_eq!(
            Indices::U16(vec![4, 5]).iter().collect::<Vec<_>>(),
            vec![4, 5]
        );
    }

    #[test]
    fn test_heightmap_height_at() {
        let tile = HeightmapTile {
            width: 2,
            height: 1,
            heights: vec![5000, 10000],
            child_tile_mask: 0,
            water_mask: None,
            structure: HeightmapStructure::default(),
        };
        assert!((tile.height_at(0, 0).unwrap() - 0.0).abs() < 1e-9);
        assert!((tile.height_at(1, 0).unwrap() - 1000.0).abs() < 1e-9);
        assert!(tile.height_at(2, 0).is_none());
    }
}
