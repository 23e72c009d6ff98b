//! Shared output raster written by every sector worker.
//!
//! Stores are `Relaxed` and unsynchronised. Rays from neighbouring sectors can
//! cross the same cells near a seam; the later store wins. Each stored value is
//! derived from the cell's own geometry along the ray that wrote it, so a lost
//! store never produces a value no ray computed.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Result, ViewshedError};
use crate::geo::grid::{CellIndex, GridExtent};

/// Fully transparent: nothing was written to this cell.
pub const NO_DATA: u32 = 0x0000_0000;
/// Cell visible from the observer (visibility mode).
pub const VISIBLE: u32 = 0xFFFF_0000;
/// Target cell visible from the observer (target mode).
pub const TARGET_VISIBLE: u32 = 0x0000_00FF;

pub struct OutputGrid {
    extent: GridExtent,
    cells: Vec<AtomicU32>,
}

impl OutputGrid {
    pub fn new(extent: GridExtent) -> Self {
        let cells = (0..extent.cell_count()).map(|_| AtomicU32::new(NO_DATA)).collect();
        Self { extent, cells }
    }

    /// Writes `value` at `cell`. A cell outside the grid is a geometry fault.
    pub fn store(&self, cell: CellIndex, value: u32) -> Result<()> {
        let idx = self.extent.linear_index(cell).ok_or(ViewshedError::CellOutOfBounds {
            cell,
            width: self.extent.width,
            height: self.extent.height,
        })?;
        self.cells[idx].store(value, Ordering::Relaxed);
        Ok(())
    }

    pub fn load(&self, cell: CellIndex) -> Option<u32> {
        self.extent
            .linear_index(cell)
            .map(|idx| self.cells[idx].load(Ordering::Relaxed))
    }

    /// Row-major pixel values. Call once all workers have joined.
    pub fn into_pixels(self) -> Vec<u32> {
        self.cells.into_iter().map(AtomicU32::into_inner).collect()
    }
}
