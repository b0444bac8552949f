//! Per-layer tile availability.
//!
//! Availability is stored as a sparse list of inclusive tile rectangles per
//! level, exactly as layer descriptors enumerate it. Rows use the layer's
//! native TMS convention: row 0 is the southernmost row.

use terrain_decode::TileRange;

/// Answer to "does this layer have data for the tile?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    Available,
    Unavailable,
    /// The level is not enumerated; defer to the next layer.
    Unknown,
}

impl Availability {
    #[must_use]
    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}

/// Sparse per-level availability of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityTree {
    levels: Vec<Vec<TileRange>>,
}

impl AvailabilityTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from the `available` array of a descriptor, where entry
    /// `i` lists the ranges of level `i`.
    #[must_use]
    pub fn from_levels(levels: Vec<Vec<TileRange>>) -> Self {
        Self { levels }
    }

    /// Mark every tile of `range` at `level` as available.
    ///
    /// Adding a range at a level deeper than the current depth enumerates
    /// the levels in between, with no tiles.
    pub fn add_range(&mut self, level: u32, range: TileRange) {
        let level = level as usize;
        if self.levels.len() <= level {
            self.levels.resize_with(level + 1, Vec::new);
        }
        self.levels[level].push(range);
    }

    /// Query a tile in TMS rows.
    #[must_use]
    pub fn query(&self, level: u32, x: u32, y: u32) -> Availability {
        match self.levels.get(level as usize) {
            None => Availability::Unknown,
            Some(ranges) if ranges.iter().any(|r| r.contains(x, y)) => Availability::Available,
            Some(_) => Availability::Unavailable,
        }
    }

    /// Deepest enumerated level, if any.
    #[must_use]
    pub fn maximum_level(&self) -> Option<u32> {
        self.levels
            .len()
            .checked_sub(1)
            .and_then(|level| u32::try_from(level).ok())
    }

    /// Number of enumerated levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Whether no range is enumerated at any level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Vec::is_empty)
    }

    /// Ranges enumerated at `level`.
    #[must_use]
    pub fn ranges(&self, level: u32) -> &[TileRange] {
        self.levels.get(level as usize).map_or(&[], Vec::as_slice)
    }

    /// Child mask of a tile: bit 0 SW, bit 1 SE, bit 2 NW, bit 3 NE.
    #[must_use]
    pub fn compute_child_mask(&self, level: u32, x: u32, y: u32) -> u8 {
        let Some(child_level) = level.checked_add(1) else {
            return 0;
        };
        child_mask(|cx, cy| self.query(child_level, cx, cy).is_available(), x, y)
    }
}

/// Fold the four children of `(x, y)` into a mask using `available`.
///
/// Children are at `(2x, 2y)` SW, `(2x + 1, 2y)` SE, `(2x, 2y + 1)` NW and
/// `(2x + 1, 2y + 1)` NE in TMS rows. Tiles whose children cannot be
/// addressed have none.
pub(crate) fn child_mask(available: impl Fn(u32, u32) -> bool, x: u32, y: u32) -> u8 {
    let (Some(cx), Some(cy)) = (x.checked_mul(2), y.checked_mul(2)) else {
        return 0;
    };
    [(cx, cy), (cx + 1, cy), (cx, cy + 1), (cx + 1, cy + 1)]
        .into_iter()
        .enumerate()
        .filter(|&(_, (x, y))| available(x, y))
        .fold(0, |mask, (bit, _)| mask | (1 << bit))
}
