//! Elevation sources consulted by the sweep.
//!
//! Tile decoding and stitching happen upstream; the sweep only needs a single
//! addressable grid behind [`HeightGrid`].

use std::sync::Arc;

use crate::error::{Result, ViewshedError};
use crate::geo::grid::{CellIndex, GridExtent};

pub trait HeightGrid {
    /// Elevation in meters of cell `(x, y)`. Indices outside the grid read as 0.
    fn elevation(&self, x: i64, y: i64) -> f64;

    fn extent(&self) -> GridExtent;

    fn elevation_at(&self, cell: CellIndex) -> f64 {
        self.elevation(cell.x, cell.y)
    }
}

impl<T: HeightGrid + ?Sized> HeightGrid for &T {
    fn elevation(&self, x: i64, y: i64) -> f64 {
        (**self).elevation(x, y)
    }

    fn extent(&self) -> GridExtent {
        (**self).extent()
    }
}

impl<T: HeightGrid + ?Sized> HeightGrid for Arc<T> {
    fn elevation(&self, x: i64, y: i64) -> f64 {
        (**self).elevation(x, y)
    }

    fn extent(&self) -> GridExtent {
        (**self).extent()
    }
}

/// Dense row-major elevation grid held in memory.
#[derive(Debug, Clone)]
pub struct ElevationRaster {
    extent: GridExtent,
    data: Vec<f32>,
}

impl ElevationRaster {
    pub fn new(extent: GridExtent, data: Vec<f32>) -> Result<Self> {
        if data.len() != extent.cell_count() {
            return Err(ViewshedError::RasterSizeMismatch {
                expected: extent.cell_count(),
                actual: data.len(),
            });
        }
        Ok(Self { extent, data })
    }

    /// Builds the raster by evaluating `f(x, y)` for every cell.
    pub fn from_fn(extent: GridExtent, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(extent.cell_count());
        for y in 0..extent.height {
            for x in 0..extent.width {
                data.push(f(x, y));
            }
        }
        Self { extent, data }
    }
}

impl HeightGrid for ElevationRaster {
    #[inline(always)]
    fn elevation(&self, x: i64, y: i64) -> f64 {
        match self.extent.linear_index(CellIndex::new(x, y)) {
            Some(idx) => self.data[idx] as f64,
            None => 0.0,
        }
    }

    fn extent(&self) -> GridExtent {
        self.extent
    }
}

/// Constant-height surface. Stands in for regions with no elevation data.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub extent: GridExtent,
    pub height_m: f64,
}

impl FlatTerrain {
    pub fn new(extent: GridExtent, height_m: f64) -> Self {
        Self { extent, height_m }
    }
}

impl HeightGrid for FlatTerrain {
    fn elevation(&self, x: i64, y: i64) -> f64 {
        if self.extent.contains(CellIndex::new(x, y)) {
            self.height_m
        } else {
            0.0
        }
    }

    fn extent(&self) -> GridExtent {
        self.extent
    }
}
