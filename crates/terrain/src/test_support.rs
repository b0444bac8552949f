//! Payload builders and fixtures for tests.

use std::sync::Arc;

use crate::fetch::MemoryFetcher;

pub const BASE_URL: &str = "https://terrain.example.com/tiles";

fn zigzag(value: i32) -> u16 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let encoded = ((value << 1) ^ (value >> 31)) as u16;
    encoded
}

/// A one-triangle quantized mesh followed by `extensions` blocks.
pub fn triangle_mesh(extensions: &[(u8, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in [6_378_137.0f64, 0.0, 0.0] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&(-20.0f32).to_le_bytes());
    out.extend_from_slice(&(1500.0f32).to_le_bytes());
    for value in [6_378_137.0f64, 0.0, 0.0, 10_000.0] {
        out.extend_from_slice(&value.to_le_bytes());
    }
    for value in [0.25f64, 0.0, 0.0] {
        out.extend_from_slice(&value.to_le_bytes());
    }

    out.extend_from_slice(&3u32.to_le_bytes());
    for component in [[0, 32767, 0], [0, 0, 32767], [0, 16000, 32767]] {
        let mut previous = 0;
        for value in component {
            out.extend_from_slice(&zigzag(value - previous).to_le_bytes());
            previous = value;
        }
    }

    // 110 bytes so far, already aligned for 16-bit indices.
    out.extend_from_slice(&1u32.to_le_bytes());
    for code in [0u16, 0, 0] {
        out.extend_from_slice(&code.to_le_bytes());
    }
    let edges: [&[u16]; 4] = [&[0, 2], &[0, 1], &[1], &[2]];
    for edge in edges {
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(edge.len() as u32).to_le_bytes());
        for index in edge {
            out.extend_from_slice(&index.to_le_bytes());
        }
    }

    for (id, payload) in extensions {
        out.push(*id);
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
    }
    out
}

/// A flat heightmap with the given child mask and trailing water mask.
pub fn heightmap(child_tile_mask: u8, water_mask: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..65 * 65 {
        out.extend_from_slice(&5000u16.to_le_bytes());
    }
    out.push(child_tile_mask);
    out.extend_from_slice(water_mask);
    out
}

/// A fetcher serving `descriptor` as the root `layer.json`.
pub fn fetcher_with_descriptor(descriptor: &str) -> Arc<MemoryFetcher> {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert(format!("{BASE_URL}/layer.json"), descriptor);
    fetcher
}
