//! Quantized-mesh extension blocks.
//!
//! After the core mesh body a payload may carry any number of extension
//! blocks, each framed as `(id: u8, length: u32)` followed by `length`
//! bytes. Known extensions are decoded only when the caller asked for them;
//! everything else is skipped by length so newer servers stay readable.

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;
use crate::{TileMetadata, WaterMask};

/// Identifiers of the extensions this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionId {
    /// Two bytes of oct-encoded normal per vertex.
    OctVertexNormals,
    /// Uniform flag or 256×256 raster.
    WaterMask,
    /// JSON document with availability of descendant tiles.
    Metadata,
}

impl ExtensionId {
    #[must_use]
    pub fn from_u8(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::OctVertexNormals),
            2 => Some(Self::WaterMask),
            4 => Some(Self::Metadata),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::OctVertexNormals => 1,
            Self::WaterMask => 2,
            Self::Metadata => 4,
        }
    }
}

/// Which extensions the caller wants decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionRequest {
    pub vertex_normals: bool,
    pub water_mask: bool,
    pub metadata: bool,
    /// Extension lengths are little-endian unless the tileset uses the
    /// legacy `vertexnormals` extension.
    pub little_endian_extension_size: bool,
}

impl Default for ExtensionRequest {
    fn default() -> Self {
        Self {
            vertex_normals: false,
            water_mask: false,
            metadata: false,
            little_endian_extension_size: true,
        }
    }
}

impl ExtensionRequest {
    /// Request no extensions.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn wants(&self, id: ExtensionId) -> bool {
        match id {
            ExtensionId::OctVertexNormals => self.vertex_normals,
            ExtensionId::WaterMask => self.water_mask,
            ExtensionId::Metadata => self.metadata,
        }
    }
}

/// Extensions decoded from a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    pub encoded_normals: Option<Vec<u8>>,
    pub water_mask: Option<WaterMask>,
    pub metadata: Option<TileMetadata>,
}

/// Decode every extension block until the end of the buffer.
pub fn decode_extensions(
    reader: &mut ByteReader<'_>,
    vertex_count: usize,
    request: &ExtensionRequest,
) -> DecodeResult<Extensions> {
    let mut extensions = Extensions::default();

    while !reader.is_empty() {
        let raw_id = reader.read_u8("extension id")?;
        let length = if request.little_endian_extension_size {
            reader.read_u32("extension length")?
        } else {
            reader.read_u32_be("extension length")?
        };
        let payload = reader.take(length as usize, "extension payload")?;

        let Some(id) = ExtensionId::from_u8(raw_id).filter(|id| request.wants(*id)) else {
            continue;
        };

        match id {
            ExtensionId::OctVertexNormals => {
                extensions.encoded_normals = Some(decode_oct_normals(payload, vertex_count)?);
            }
            ExtensionId::WaterMask => {
                extensions.water_mask = Some(WaterMask::from_bytes(payload)?);
            }
            ExtensionId::Metadata => {
                extensions.metadata = Some(decode_metadata(payload)?);
            }
        }
    }

    Ok(extensions)
}

/// Validate an oct-encoded normals block: exactly two bytes per vertex.
pub fn decode_oct_normals(payload: &[u8], vertex_count: usize) -> DecodeResult<Vec<u8>> {
    let expected = vertex_count * 2;
    if payload.len() != expected {
        return Err(DecodeError::InvalidFormat {
            context: "oct-encoded normals",
            detail: format!(
                "expected {expected} bytes for {vertex_count} vertices, got {}",
                payload.len()
            ),
        });
    }
    Ok(payload.to_vec())
}

/// Decode the metadata block: a `u32` JSON length then the JSON text.
pub fn decode_metadata(payload: &[u8]) -> DecodeResult<TileMetadata> {
    let mut reader = ByteReader::new(payload);
    let json_length = reader.read_u32("metadata length")? as usize;
    let json = reader.take(json_length, "metadata json")?;

    serde_json::from_slice(json).map_err(|e| DecodeError::InvalidFormat {
        context: "metadata",
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileRange;
    use crate::test_support::metadata_extension;

    fn block(id: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![id];
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn all() -> ExtensionRequest {
        ExtensionRequest {
            vertex_normals: true,
            water_mask: true,
            metadata: true,
            little_endian_extension_size: true,
        }
    }

    #[test]
    fn test_no_extensions() {
        let mut reader = ByteReader::new(&[]);
        let extensions = decode_extensions(&mut reader, 3, &all()).unwrap();
        assert_eq!(extensions, Extensions::default());
    }

    #[test]
    fn test_oct_normals_requested() {
        let bytes = block(1, &[1, 2, 3, 4, 5, 6]);
        let mut reader = ByteReader::new(&bytes);
        let extensions = decode_extensions(&mut reader, 3, &all()).unwrap();
        assert_eq!(extensions.encoded_normals, Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_oct_normals_wrong_size() {
        let bytes = block(1, &[1, 2, 3, 4]);
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            decode_extensions(&mut reader, 3, &all()),
            Err(DecodeError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_unrequested_extensions_are_skipped() {
        // Wrong-size normals are not validated when not requested.
        let mut bytes = block(1, &[1, 2]);
        bytes.extend(block(2, &[255]));
        let mut reader = ByteReader::new(&bytes);

        let extensions = decode_extensions(&mut reader, 3, &ExtensionRequest::none()).unwrap();
        assert_eq!(extensions, Extensions::default());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_water_mask_sizes() {
        let bytes = block(2, &[0]);
        let mut reader = ByteReader::new(&bytes);
        let extensions = decode_extensions(&mut reader, 3, &all()).unwrap();
        assert_eq!(extensions.water_mask, Some(WaterMask::Uniform(0)));

        let raster = vec![128u8; 65536];
        let bytes = block(2, &raster);
        let mut reader = ByteReader::new(&bytes);
        let extensions = decode_extensions(&mut reader, 3, &all()).unwrap();
        assert!(matches!(extensions.water_mask, Some(WaterMask::Raster(ref r)) if r.len() == 65536));

        let bytes = block(2, &[0, 0, 0]);
        let mut reader = ByteReader::new(&bytes);
        assert!(decode_extensions(&mut reader, 3, &all()).is_err());
    }

    #[test]
    fn test_unknown_extension_is_skipped_by_length() {
        let mut bytes = block(200, &[9; 17]);
        bytes.extend(block(2, &[255]));
        let mut reader = ByteReader::new(&bytes);

        let extensions = decode_extensions(&mut reader, 3, &all()).unwrap();
        assert_eq!(extensions.water_mask, Some(WaterMask::Uniform(255)));
        assert!(extensions.encoded_normals.is_none());
    }

    #[test]
    fn test_truncated_extension_payload() {
        let mut bytes = vec![200];
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 10]);
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            decode_extensions(&mut reader, 3, &all()),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_big_endian_extension_size() {
        let mut bytes = vec![1];
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);

        let request = ExtensionRequest {
            little_endian_extension_size: false,
            ..all()
        };
        let mut reader = ByteReader::new(&bytes);
        let extensions = decode_extensions(&mut reader, 3, &request).unwrap();
        assert_eq!(extensions.encoded_normals, Some(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_metadata_extension() {
        let payload = metadata_extension(
            r#"{"available":[[{"startX":0,"startY":0,"endX":1,"endY":1}],[]]}"#,
        );
        let bytes = block(4, &payload);
        let mut reader = ByteReader::new(&bytes);

        let metadata = decode_extensions(&mut reader, 3, &all())
            .unwrap()
            .metadata
            .unwrap();
        assert_eq!(metadata.available.len(), 2);
        assert_eq!(metadata.available[0], vec![TileRange::new(0, 0, 1, 1)]);
        assert!(metadata.available[1].is_empty());
    }

    #[test]
    fn test_metadata_extension_invalid_json() {
        let bytes = block(4, &metadata_extension("{not json"));
        let mut reader = ByteReader::new(&bytes);
        assert!(matches!(
            decode_extensions(&mut reader, 3, &all()),
            Err(DecodeError::InvalidFormat {
                context: "metadata",
                ..
            })
        ));
    }

    #[test]
    fn test_extension_id_round_trip() {
        for id in [
            ExtensionId::OctVertexNormals,
            ExtensionId::WaterMask,
            ExtensionId::Metadata,
        ] {
            assert_eq!(ExtensionId::from_u8(id.as_u8()), Some(id));
        }
        assert_eq!(ExtensionId::from_u8(3), None);
    }
}
