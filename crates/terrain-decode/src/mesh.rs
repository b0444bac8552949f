//! Quantized-mesh body decoding.

use glam::DVec3;

use crate::error::DecodeResult;
use crate::extensions::{ExtensionRequest, decode_extensions};
use crate::indices::{unpack_edge_indices, unpack_triangle_indices};
use crate::reader::ByteReader;
use crate::vertices::unpack_vertices;
use crate::{BoundingSphere, QuantizedMesh, QuantizedMeshHeader};

fn read_dvec3(reader: &mut ByteReader<'_>, context: &'static str) -> DecodeResult<DVec3> {
    Ok(DVec3::new(
        reader.read_f64(context)?,
        reader.read_f64(context)?,
        reader.read_f64(context)?,
    ))
}

/// Read the fixed 88-byte header.
///
/// # Format
///
/// - Center: 3 × `f64`
/// - Minimum and maximum height: 2 × `f32`
/// - Bounding sphere center: 3 × `f64`, radius: `f64`
/// - Horizon occlusion point: 3 × `f64`
pub fn unpack_header(reader: &mut ByteReader<'_>) -> DecodeResult<QuantizedMeshHeader> {
    let center = read_dvec3(reader, "header center")?;
    let minimum_height = reader.read_f32("header minimum height")?;
    let maximum_height = reader.read_f32("header maximum height")?;
    let sphere_center = read_dvec3(reader, "header bounding sphere")?;
    let radius = reader.read_f64("header bounding sphere")?;
    let horizon_occlusion_point = read_dvec3(reader, "header horizon occlusion point")?;

    Ok(QuantizedMeshHeader {
        center,
        minimum_height,
        maximum_height,
        bounding_sphere: BoundingSphere {
            center: sphere_center,
            radius,
        },
        horizon_occlusion_point,
    })
}

/// Decode a complete quantized-mesh payload.
///
/// The body is read in order: header, vertices, triangle indices, the west,
/// south, east and north edge lists, and finally any extension blocks.
/// Extensions are only decoded when `request` asks for them.
///
/// # Errors
///
/// Returns an error if the buffer is truncated anywhere, if an index refers
/// to a vertex that does not exist, or if a requested extension is
/// malformed. No partial mesh is returned.
pub fn decode_quantized_mesh(
    data: &[u8],
    request: &ExtensionRequest,
) -> DecodeResult<QuantizedMesh> {
    let mut reader = ByteReader::new(data);

    let header = unpack_header(&mut reader)?;
    let vertices = unpack_vertices(&mut reader)?;
    let vertex_count = vertices.len();

    let indices = unpack_triangle_indices(&mut reader, vertex_count)?;
    let west_indices = unpack_edge_indices(&mut reader, vertex_count, "west edge")?;
    let south_indices = unpack_edge_indices(&mut reader, vertex_count, "south edge")?;
    let east_indices = unpack_edge_indices(&mut reader, vertex_count, "east edge")?;
    let north_indices = unpack_edge_indices(&mut reader, vertex_count, "north edge")?;

    let extensions = decode_extensions(&mut reader, vertex_count, request)?;

    Ok(QuantizedMesh {
        header,
        vertices,
        indices,
        west_indices,
        south_indices,
        east_indices,
        north_indices,
        encoded_normals: extensions.encoded_normals,
        water_mask: extensions.water_mask,
        metadata: extensions.metadata,
    })
}
