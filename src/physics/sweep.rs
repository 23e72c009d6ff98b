//! Clockwise walk around the perimeter of the search disc.

use std::collections::HashSet;

use crate::geo::grid::{CellIndex, GridExtent};
use crate::geo::{haversine_distance, GeoPoint};

/// Perimeter cells already used as ray targets by one sector worker.
pub type VisitedSet = HashSet<CellIndex>;

const EAST: (i64, i64) = (1, 0);
const SOUTH_EAST: (i64, i64) = (1, 1);
const SOUTH: (i64, i64) = (0, 1);
const SOUTH_WEST: (i64, i64) = (-1, 1);
const WEST: (i64, i64) = (-1, 0);
const NORTH_WEST: (i64, i64) = (-1, -1);
const NORTH: (i64, i64) = (0, -1);
const NORTH_EAST: (i64, i64) = (1, -1);

/// Neighbour offsets worth trying from a perimeter cell at `bearing`, in order.
///
/// Each quadrant lists the axis neighbour, diagonal, axis neighbour and
/// diagonal that continue the walk clockwise.
pub fn candidate_offsets(bearing: f64) -> [(i64, i64); 4] {
    if (0.0..=90.0).contains(&bearing) {
        [EAST, SOUTH_EAST, SOUTH, SOUTH_WEST]
    } else if bearing > 90.0 && bearing <= 180.0 {
        [SOUTH, SOUTH_WEST, WEST, NORTH_WEST]
    } else if bearing > 180.0 && bearing <= 270.0 {
        [WEST, NORTH_WEST, NORTH, NORTH_EAST]
    } else {
        [NORTH, NORTH_EAST, EAST, SOUTH_EAST]
    }
}

/// Next perimeter cell after `current`: the first candidate within `radius_m`
/// of the observer that this sector has not visited yet.
///
/// `None` means every candidate is out of range or already visited.
pub fn radial_sweep(
    current: CellIndex,
    observer: GeoPoint,
    extent: &GridExtent,
    radius_m: f64,
    bearing: f64,
    visited: &VisitedSet,
) -> Option<CellIndex> {
    candidate_offsets(bearing)
        .into_iter()
        .map(|(dx, dy)| current.offset(dx, dy))
        .find(|cell| {
            haversine_distance(observer, extent.cell_geo(*cell)) <= radius_m && !visited.contains(cell)
        })
}
