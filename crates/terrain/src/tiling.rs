//! Tiling scheme and ellipsoid math.
//!
//! Only what the provider needs: tile counts per level, tile rectangles,
//! the geometric error of a level, and the bounding volumes attached to
//! decoded quantized-mesh tiles.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::{DMat3, DVec3};

/// Width in samples of the regular grid the geometric error is based on.
pub const HEIGHTMAP_WIDTH: u32 = 65;

/// Terrain quality factor of the level-zero geometric error.
const HEIGHTMAP_TERRAIN_QUALITY: f64 = 0.25;

/// Samples per side used when fitting a bounding box to a rectangle.
const BOX_SAMPLES: u32 = 5;

/// Deepest level whose tiles can be addressed with `u32` columns and rows.
pub const MAXIMUM_LEVEL: u32 = 30;

/// A triaxial ellipsoid centered at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub radii: DVec3,
}

impl Ellipsoid {
    /// The WGS84 ellipsoid.
    pub const WGS84: Self = Self {
        radii: DVec3::new(6_378_137.0, 6_378_137.0, 6_356_752.314_245_179),
    };

    #[must_use]
    pub fn new(radii: DVec3) -> Self {
        Self { radii }
    }

    #[must_use]
    pub fn maximum_radius(&self) -> f64 {
        self.radii.max_element()
    }

    /// Unit normal of the surface at a geodetic longitude and latitude in
    /// radians.
    #[must_use]
    pub fn geodetic_surface_normal(&self, longitude: f64, latitude: f64) -> DVec3 {
        let cos_latitude = latitude.cos();
        DVec3::new(
            cos_latitude * longitude.cos(),
            cos_latitude * longitude.sin(),
            latitude.sin(),
        )
        .normalize()
    }

    /// Earth-centered position of a geodetic longitude, latitude (radians)
    /// and height above the surface (meters).
    #[must_use]
    pub fn cartographic_to_cartesian(&self, longitude: f64, latitude: f64, height: f64) -> DVec3 {
        let normal = self.geodetic_surface_normal(longitude, latitude);
        let k = self.radii * self.radii * normal;
        let gamma = normal.dot(k).sqrt();
        k / gamma + normal * height
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::WGS84
    }
}

/// A geographic rectangle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// The whole globe.
    pub const MAX_VALUE: Self = Self {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    #[must_use]
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Longitudinal extent, accounting for rectangles that cross the
    /// antimeridian.
    #[must_use]
    pub fn width(&self) -> f64 {
        if self.east < self.west {
            self.east + TAU - self.west
        } else {
            self.east - self.west
        }
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Center longitude and latitude.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        let mut longitude = self.west + self.width() * 0.5;
        if longitude > PI {
            longitude -= TAU;
        }
        (longitude, (self.south + self.north) * 0.5)
    }

    #[must_use]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        let mut offset = longitude - self.west;
        if offset < 0.0 {
            offset += TAU;
        }
        offset <= self.width() && (self.south..=self.north).contains(&latitude)
    }
}

/// Maps quadtree tiles onto the globe.
///
/// Rows are counted from the south, as in TMS.
pub trait TilingScheme: Send + Sync + 'static {
    fn ellipsoid(&self) -> &Ellipsoid;

    fn rectangle(&self) -> Rectangle;

    fn number_of_x_tiles_at_level(&self, level: u32) -> u32;

    fn number_of_y_tiles_at_level(&self, level: u32) -> u32;

    /// Rectangle covered by a tile.
    fn tile_rectangle(&self, level: u32, x: u32, y: u32) -> Rectangle {
        let bounds = self.rectangle();
        let tile_width = bounds.width() / f64::from(self.number_of_x_tiles_at_level(level));
        let tile_height = bounds.height() / f64::from(self.number_of_y_tiles_at_level(level));

        let west = bounds.west + f64::from(x) * tile_width;
        let south = bounds.south + f64::from(y) * tile_height;
        Rectangle::new(west, south, west + tile_width, south + tile_height)
    }
}

/// `root_tiles << level`, or 0 past [`MAXIMUM_LEVEL`] or if the count does not
/// fit in a `u32`.
fn tiles_at_level(root_tiles: u32, level: u32) -> u32 {
    if level > MAXIMUM_LEVEL {
        return 0;
    }
    1u32.checked_shl(level)
        .and_then(|tiles| tiles.checked_mul(root_tiles))
        .unwrap_or(0)
}

/// Equirectangular tiling with two root tiles side by side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographicTilingScheme {
    ellipsoid: Ellipsoid,
    rectangle: Rectangle,
    root_x_tiles: u32,
    root_y_tiles: u32,
}

impl GeographicTilingScheme {
    #[must_use]
    pub fn new(ellipsoid: Ellipsoid) -> Self {
        Self {
            ellipsoid,
            rectangle: Rectangle::MAX_VALUE,
            root_x_tiles: 2,
            root_y_tiles: 1,
        }
    }
}

impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self::new(Ellipsoid::WGS84)
    }
}

impl TilingScheme for GeographicTilingScheme {
    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    fn number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.root_x_tiles, level)
    }

    fn number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.root_y_tiles, level)
    }
}

/// Geometric error of level-zero tiles for a regular grid of
/// `tile_image_width` samples.
#[must_use]
pub fn level_zero_maximum_geometric_error(
    ellipsoid: &Ellipsoid,
    tile_image_width: u32,
    number_of_tiles_at_level_zero: u32,
) -> f64 {
    ellipsoid.maximum_radius() * TAU * HEIGHTMAP_TERRAIN_QUALITY
        / (f64::from(tile_image_width) * f64::from(number_of_tiles_at_level_zero))
}

/// Geometric error of `level`, halving with every level.
#[must_use]
pub fn level_maximum_geometric_error(scheme: &dyn TilingScheme, level: u32) -> f64 {
    let level_zero = level_zero_maximum_geometric_error(
        scheme.ellipsoid(),
        HEIGHTMAP_WIDTH,
        scheme.number_of_x_tiles_at_level(0),
    );
    level_zero * 0.5f64.powi(i32::try_from(level).unwrap_or(i32::MAX))
}

/// A rectangle with a height range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRegion {
    pub rectangle: Rectangle,
    pub minimum_height: f64,
    pub maximum_height: f64,
}

/// An oriented bounding box in Earth-centered coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBoundingBox {
    pub center: DVec3,
    /// Half size along each axis of `orientation`.
    pub extents: DVec3,
    /// Columns are the box axes.
    pub orientation: DMat3,
}

impl OrientedBoundingBox {
    /// Fit a box around a bounding region.
    ///
    /// The box is aligned with the east-north-up frame at the rectangle
    /// center and encloses a grid of samples across the rectangle at both
    /// heights.
    #[must_use]
    pub fn from_region(region: &BoundingRegion, ellipsoid: &Ellipsoid) -> Self {
        let rectangle = &region.rectangle;
        let (center_longitude, center_latitude) = rectangle.center();

        let up = ellipsoid.geodetic_surface_normal(center_longitude, center_latitude);
        let east = DVec3::new(-center_longitude.sin(), center_longitude.cos(), 0.0);
        let north = up.cross(east);
        let orientation = DMat3::from_cols(east, north, up);
        let origin = ellipsoid.cartographic_to_cartesian(center_longitude, center_latitude, 0.0);
        let to_local = orientation.transpose();

        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        let steps = f64::from(BOX_SAMPLES - 1);
        for i in 0..BOX_SAMPLES {
            let longitude = rectangle.west + rectangle.width() * f64::from(i) / steps;
            for j in 0..BOX_SAMPLES {
                let latitude = rectangle.south + rectangle.height() * f64::from(j) / steps;
                for height in [region.minimum_height, region.maximum_height] {
                    let point = ellipsoid.cartographic_to_cartesian(longitude, latitude, height);
                    let local = to_local * (point - origin);
                    min = min.min(local);
                    max = max.max(local);
                }
            }
        }

        Self {
            center: origin + orientation * ((min + max) * 0.5),
            extents: (max - min) * 0.5,
            orientation,
        }
    }

    /// Whether `point` lies inside the box, with `tolerance` meters of slack.
    #[must_use]
    pub fn contains(&self, point: DVec3, tolerance: f64) -> bool {
        let local = self.orientation.transpose() * (point - self.center);
        local
            .abs()
            .cmple(self.extents + DVec3::splat(tolerance))
            .all()
    }
}
