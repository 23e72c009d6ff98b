//! Affine mapping between geographic positions and raster cells.
//!
//! Row 0 is the northern edge of the extent, column 0 the western edge.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewshedError};
use crate::geo::{destination_point, GeoPoint};

/// Samples per one-degree elevation tile at the reference (1 arc-second) resolution.
pub const SAMPLES_PER_DEGREE: usize = 3601;

/// Half a sample, in degrees. Tile borders are pushed outward by this much so
/// sample centres line up with the stitched grid.
pub const HALF_SAMPLE_SHIFT: f64 = 1.0 / 7200.0;

/// Integer raster coordinates. Equality and hashing use `(x, y)` only.
///
/// Signed so that candidate cells just outside the grid can be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    pub x: i64,
    pub y: i64,
}

impl CellIndex {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The cell containing a fractional grid position.
    pub fn containing(pos: (f64, f64)) -> Self {
        Self {
            x: pos.0.floor() as i64,
            y: pos.1.floor() as i64,
        }
    }

    pub fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn as_position(self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridExtent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    pub width: usize,
    pub height: usize,
}

impl GridExtent {
    pub fn new(
        min_lon: f64,
        max_lon: f64,
        min_lat: f64,
        max_lat: f64,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        let finite = [min_lon, max_lon, min_lat, max_lat].iter().all(|v| v.is_finite());
        if !finite || min_lon >= max_lon || min_lat >= max_lat || width == 0 || height == 0 {
            return Err(ViewshedError::InvalidExtent {
                min_lon,
                max_lon,
                min_lat,
                max_lat,
                width,
                height,
            });
        }
        Ok(Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
            width,
            height,
        })
    }

    /// Whole-tile extent that contains the disc of `radius_m` around `center`.
    ///
    /// The cardinal destination points are widened to whole-degree borders and
    /// shifted outward by half a sample; each spanned degree contributes
    /// `samples_per_degree` cells along its axis.
    pub fn covering(center: GeoPoint, radius_m: f64, samples_per_degree: usize) -> Result<Self> {
        let north = destination_point(center, 0.0, radius_m);
        let east = destination_point(center, 90.0, radius_m);
        let south = destination_point(center, 180.0, radius_m);
        let west = destination_point(center, 270.0, radius_m);

        let lon_lo = west.longitude.floor();
        let lon_hi = east.longitude.ceil();
        let lat_lo = south.latitude.floor();
        let lat_hi = north.latitude.ceil();

        let width = (lon_hi - lon_lo) as usize * samples_per_degree;
        let height = (lat_hi - lat_lo) as usize * samples_per_degree;

        Self::new(
            lon_lo - HALF_SAMPLE_SHIFT,
            lon_hi + HALF_SAMPLE_SHIFT,
            lat_lo - HALF_SAMPLE_SHIFT,
            lat_hi + HALF_SAMPLE_SHIFT,
            width,
            height,
        )
    }

    /// Fractional grid position of a geographic point.
    pub fn to_cell(&self, point: GeoPoint) -> (f64, f64) {
        let frac_x = (point.longitude - self.min_lon) / (self.max_lon - self.min_lon);
        let frac_y = (point.latitude - self.min_lat) / (self.max_lat - self.min_lat);
        let height = self.height as f64;
        (self.width as f64 * frac_x, height - height * frac_y)
    }

    /// Geographic position of a fractional grid position. Integer inputs give the
    /// north-west corner of that cell.
    pub fn to_geo(&self, x: f64, y: f64) -> GeoPoint {
        let (step_lon, step_lat) = self.pixel_size();
        GeoPoint {
            longitude: self.min_lon + x * step_lon,
            latitude: self.max_lat - y * step_lat,
        }
    }

    pub fn cell_geo(&self, cell: CellIndex) -> GeoPoint {
        self.to_geo(cell.x as f64, cell.y as f64)
    }

    /// Degrees per cell along (longitude, latitude).
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            (self.max_lon - self.min_lon) / self.width as f64,
            (self.max_lat - self.min_lat) / self.height as f64,
        )
    }

    pub fn contains(&self, cell: CellIndex) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    pub fn contains_point(&self, point: GeoPoint) -> bool {
        self.contains(CellIndex::containing(self.to_cell(point)))
    }

    /// Row-major offset of `cell`, if it lies inside the grid.
    pub fn linear_index(&self, cell: CellIndex) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.y as usize * self.width + cell.x as usize)
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}
