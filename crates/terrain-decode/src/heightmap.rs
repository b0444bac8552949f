//! Heightmap tile decoding.

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;
use crate::{HEIGHTMAP_TILE_SIZE, HeightmapStructure, HeightmapTile, WATER_MASK_SIZE, WaterMask};

/// Byte length of the sample block.
const HEIGHTS_SIZE: usize = HEIGHTMAP_TILE_SIZE * HEIGHTMAP_TILE_SIZE * 2;

/// Decode a heightmap payload.
///
/// # Format
///
/// - 65 × 65 little-endian `u16` samples, row-major, north row first
/// - One child tile mask byte
/// - Optionally a water mask of 1 or 65536 bytes
///
/// The water mask is kept only if `request_water_mask` is set, but its size
/// is validated either way.
///
/// # Errors
///
/// Returns an error if the payload has any other size.
pub fn decode_heightmap(data: &[u8], request_water_mask: bool) -> DecodeResult<HeightmapTile> {
    let raster = WATER_MASK_SIZE * WATER_MASK_SIZE;
    let base = HEIGHTS_SIZE + 1;
    if data.len() != base && data.len() != base + 1 && data.len() != base + raster {
        return Err(DecodeError::InvalidFormat {
            context: "heightmap",
            detail: format!(
                "expected {base}, {} or {} bytes, got {}",
                base + 1,
                base + raster,
                data.len()
            ),
        });
    }

    let mut reader = ByteReader::new(data);
    let heights = reader.read_u16_vec(HEIGHTMAP_TILE_SIZE * HEIGHTMAP_TILE_SIZE, "heights")?;
    let child_tile_mask = reader.read_u8("child tile mask")?;

    let water_mask = if request_water_mask && !reader.is_empty() {
        let bytes = reader.take(reader.remaining(), "water mask")?;
        Some(WaterMask::from_bytes(bytes)?)
    } else {
        None
    };

    Ok(HeightmapTile {
        width: HEIGHTMAP_TILE_SIZE,
        height: HEIGHTMAP_TILE_SIZE,
        heights,
        child_tile_mask,
        water_mask,
        structure: HeightmapStructure::default(),
    })
}
