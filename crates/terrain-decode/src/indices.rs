//! Index unpacking.

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;
use crate::{Indices, SIXTY_FOUR_KILOBYTES};

/// Index element width required for a mesh with `vertex_count` vertices.
#[must_use]
pub fn index_width(vertex_count: usize) -> usize {
    if vertex_count > SIXTY_FOUR_KILOBYTES {
        4
    } else {
        2
    }
}

/// Decode high-water-mark encoded indices in place.
///
/// Each stored code `c` produces index `highest - c`. When `c == 0` the
/// index is a new vertex and `highest` is incremented.
pub fn high_water_mark_decode(codes: &mut [u32]) {
    let mut highest: u32 = 0;
    for code in codes.iter_mut() {
        let value = *code;
        *code = highest.wrapping_sub(value);
        if value == 0 {
            highest += 1;
        }
    }
}

fn read_indices(
    reader: &mut ByteReader<'_>,
    count: usize,
    width: usize,
    context: &'static str,
) -> DecodeResult<Vec<u32>> {
    if width == 4 {
        reader.read_u32_vec(count, context)
    } else {
        Ok(reader
            .read_u16_vec(count, context)?
            .into_iter()
            .map(u32::from)
            .collect())
    }
}

fn narrow(indices: Vec<u32>, width: usize) -> Indices {
    if width == 4 {
        Indices::U32(indices)
    } else {
        // Every value fits: 16-bit indices address at most 65536 vertices.
        #[allow(clippy::cast_possible_truncation)]
        Indices::U16(indices.into_iter().map(|i| i as u16).collect())
    }
}

fn validate(
    indices: &[u32],
    vertex_count: usize,
    context: &'static str,
) -> DecodeResult<()> {
    match indices.iter().find(|&&i| i as usize >= vertex_count) {
        Some(&index) => Err(DecodeError::IndexOutOfBounds {
            context,
            index,
            len: vertex_count,
        }),
        None => Ok(()),
    }
}

/// Read the triangle block.
///
/// The reader is first aligned to the index width, then a `u32` triangle
/// count is followed by `3 × count` high-water-mark encoded indices.
pub fn unpack_triangle_indices(
    reader: &mut ByteReader<'_>,
    vertex_count: usize,
) -> DecodeResult<Indices> {
    let width = index_width(vertex_count);
    reader.align_to(width, "index alignment")?;

    let triangle_count = reader.read_u32("triangle count")? as usize;
    let count = triangle_count
        .checked_mul(3)
        .ok_or(DecodeError::InvalidFormat {
            context: "triangle count",
            detail: format!("triangle count {triangle_count} overflows"),
        })?;

    let mut indices = read_indices(reader, count, width, "triangle indices")?;
    high_water_mark_decode(&mut indices);
    validate(&indices, vertex_count, "triangle")?;

    Ok(narrow(indices, width))
}

/// Read one count-prefixed edge vertex list. Edge indices are stored
/// verbatim, without any delta encoding.
pub fn unpack_edge_indices(
    reader: &mut ByteReader<'_>,
    vertex_count: usize,
    context: &'static str,
) -> DecodeResult<Indices> {
    let width = index_width(vertex_count);
    let count = reader.read_u32(context)? as usize;
    let indices = read_indices(reader, count, width, context)?;
    validate(&indices, vertex_count, context)?;
    Ok(narrow(indices, width))
}
