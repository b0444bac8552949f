//! Hand encoders used to build payloads for tests.

use crate::QuantizedVertex;

pub fn zigzag_encode(value: i16) -> u16 {
    #[allow(clippy::cast_sign_loss)]
    let encoded = ((value << 1) ^ (value >> 15)) as u16;
    encoded
}

/// Encode indices with the high-water mark scheme.
pub fn high_water_mark_encode(indices: &[u32]) -> Vec<u32> {
    let mut highest = 0u32;
    indices
        .iter()
        .map(|&index| {
            let code = highest - index;
            if code == 0 {
                highest += 1;
            }
            code
        })
        .collect()
}

/// Builder for quantized-mesh payloads.
pub struct MeshPayload {
    pub vertices: Vec<QuantizedVertex>,
    pub triangles: Vec<u32>,
    pub west: Vec<u32>,
    pub south: Vec<u32>,
    pub east: Vec<u32>,
    pub north: Vec<u32>,
    pub extensions: Vec<(u8, Vec<u8>)>,
    pub big_endian_extension_size: bool,
}

impl MeshPayload {
    /// A single triangle covering the south-west half of the tile.
    pub fn triangle() -> Self {
        Self {
            vertices: vec![
                QuantizedVertex {
                    u: 0,
                    v: 0,
                    height: 0,
                },
                QuantizedVertex {
                    u: 32767,
                    v: 0,
                    height: 16000,
                },
                QuantizedVertex {
                    u: 0,
                    v: 32767,
                    height: 32767,
                },
            ],
            triangles: vec![0, 1, 2],
            west: vec![0, 2],
            south: vec![0, 1],
            east: vec![1],
            north: vec![2],
            extensions: Vec::new(),
            big_endian_extension_size: false,
        }
    }

    /// A grid with `count` vertices, enough to force a chosen index width.
    pub fn with_vertex_count(count: usize) -> Self {
        let vertices = (0..count)
            .map(|i| {
                #[allow(clippy::cast_possible_truncation)]
                let u = (i % 32768) as u16;
                QuantizedVertex {
                    u,
                    v: 0,
                    height: 0,
                }
            })
            .collect();
        #[allow(clippy::cast_possible_truncation)]
        let last = (count - 1) as u32;
        Self {
            vertices,
            triangles: vec![0, 1, 2, 1, 3, 2],
            west: vec![0],
            south: vec![1],
            east: vec![last],
            north: vec![last - 1],
            extensions: Vec::new(),
            big_endian_extension_size: false,
        }
    }

    pub fn extension(mut self, id: u8, payload: Vec<u8>) -> Self {
        self.extensions.push((id, payload));
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        // Header.
        for value in [6_378_137.0f64, 0.0, 0.0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&(-10.0f32).to_le_bytes());
        out.extend_from_slice(&(250.0f32).to_le_bytes());
        for value in [6_378_137.0f64, 0.0, 0.0, 5000.0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for value in [0.5f64, 0.25, 0.125] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.vertices.len() as u32).to_le_bytes());
        for component in [
            self.vertices.iter().map(|v| v.u).collect::<Vec<_>>(),
            self.vertices.iter().map(|v| v.v).collect(),
            self.vertices.iter().map(|v| v.height).collect(),
        ] {
            let mut previous = 0i32;
            for value in component {
                #[allow(clippy::cast_possible_truncation)]
                let delta = (i32::from(value) - previous) as i16;
                previous = i32::from(value);
                out.extend_from_slice(&zigzag_encode(delta).to_le_bytes());
            }
        }

        let wide = self.vertices.len() > crate::SIXTY_FOUR_KILOBYTES;
        let width = if wide { 4 } else { 2 };
        while out.len() % width != 0 {
            out.push(0xAB);
        }

        let write_indices = |out: &mut Vec<u8>, indices: &[u32]| {
            for &index in indices {
                if wide {
                    out.extend_from_slice(&index.to_le_bytes());
                } else {
                    #[allow(clippy::cast_possible_truncation)]
                    out.extend_from_slice(&(index as u16).to_le_bytes());
                }
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&((self.triangles.len() / 3) as u32).to_le_bytes());
        write_indices(&mut out, &high_water_mark_encode(&self.triangles));

        for edge in [&self.west, &self.south, &self.east, &self.north] {
            #[allow(clippy::cast_possible_truncation)]
            out.extend_from_slice(&(edge.len() as u32).to_le_bytes());
            write_indices(&mut out, edge);
        }

        for (id, payload) in &self.extensions {
            out.push(*id);
            #[allow(clippy::cast_possible_truncation)]
            let len = payload.len() as u32;
            if self.big_endian_extension_size {
                out.extend_from_slice(&len.to_be_bytes());
            } else {
                out.extend_from_slice(&len.to_le_bytes());
            }
            out.extend_from_slice(payload);
        }

        out
    }
}

/// Metadata extension payload: `u32` JSON length followed by the JSON text.
pub fn metadata_extension(json: &str) -> Vec<u8> {
    let mut out = Vec::new();
    #[allow(clippy::cast_possible_truncation)]
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(json.as_bytes());
    out
}
