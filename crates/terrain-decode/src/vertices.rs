//! Vertex unpacking.

use crate::QuantizedVertex;
use crate::error::{DecodeError, DecodeResult};
use crate::reader::ByteReader;

/// Decode a zig-zag encoded value (`0, -1, 1, -2, ...` stored as `0, 1, 2, 3, ...`).
#[must_use]
pub fn zigzag_decode(value: u16) -> i16 {
    #[allow(clippy::cast_possible_wrap)]
    let shifted = (value >> 1) as i16;
    #[allow(clippy::cast_possible_wrap)]
    let sign = -((value & 1) as i16);
    shifted ^ sign
}

/// Delta-decode one zig-zag encoded component plane in place.
///
/// Each output value is the running sum of the decoded deltas, starting
/// from zero. Sums wrap at 16 bits.
pub fn delta_decode(plane: &mut [u16]) {
    let mut value: u16 = 0;
    for raw in plane.iter_mut() {
        #[allow(clippy::cast_sign_loss)]
        let delta = zigzag_decode(*raw) as u16;
        value = value.wrapping_add(delta);
        *raw = value;
    }
}

/// Read the vertex block: a `u32` count followed by the `u`, `v` and
/// `height` planes.
///
/// # Format
///
/// - `u32` vertex count `n`
/// - `n` × `u16` zig-zag deltas for `u`
/// - `n` × `u16` zig-zag deltas for `v`
/// - `n` × `u16` zig-zag deltas for `height`
pub fn unpack_vertices(reader: &mut ByteReader<'_>) -> DecodeResult<Vec<QuantizedVertex>> {
    let count = reader.read_u32("vertex count")? as usize;

    let needed = count.checked_mul(6).ok_or(DecodeError::InvalidFormat {
        context: "vertex count",
        detail: format!("vertex count {count} overflows"),
    })?;
    if needed > reader.remaining() {
        return Err(DecodeError::BufferTooSmall {
            expected: needed,
            actual: reader.remaining(),
        });
    }

    let mut u = reader.read_u16_vec(count, "vertex u")?;
    let mut v = reader.read_u16_vec(count, "vertex v")?;
    let mut height = reader.read_u16_vec(count, "vertex height")?;

    delta_decode(&mut u);
    delta_decode(&mut v);
    delta_decode(&mut height);

    Ok(u
        .into_iter()
        .zip(v)
        .zip(height)
        .map(|((u, v), height)| QuantizedVertex { u, v, height })
        .collect())
}
