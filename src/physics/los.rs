//! Line-of-sight along a single ray from the observer to one perimeter cell.
//!
//! The ray is walked cell by cell on the integer grid. Every cell it crosses is
//! sampled, judged against the horizon accumulated from the cells before it,
//! and classified into the output raster.

use crate::coverage::{OutputGrid, TARGET_VISIBLE, VISIBLE};
use crate::error::{Result, ViewshedError};
use crate::geo::grid::{CellIndex, GridExtent};
use crate::geo::{haversine_distance, GeoPoint};
use crate::io::OutputMode;
use crate::physics::curvature::{elevation_angle, required_visible_height};
use crate::render::COLOR_RAMP;
use crate::terrain::HeightGrid;

/// Observer resolved against a height grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub position: GeoPoint,
    /// Fractional grid position.
    pub cell: (f64, f64),
    /// Height above the terrain, meters.
    pub height_agl: f64,
    /// Terrain elevation under the observer plus `height_agl`.
    pub eye_elevation: f64,
}

impl Observer {
    pub fn resolve<G: HeightGrid + ?Sized>(position: GeoPoint, height_agl: f64, grid: &G) -> Result<Self> {
        let extent = grid.extent();
        if !extent.contains_point(position) {
            return Err(ViewshedError::ObserverOutsideGrid {
                longitude: position.longitude,
                latitude: position.latitude,
            });
        }
        let cell = extent.to_cell(position);
        let ground = grid.elevation_at(CellIndex::containing(cell));
        Ok(Self {
            position,
            cell,
            height_agl,
            eye_elevation: ground + height_agl,
        })
    }

    pub fn grid_cell(&self) -> CellIndex {
        CellIndex::containing(self.cell)
    }
}

/// Cells crossed by the segment from a fractional grid position to a target cell.
///
/// Each step crosses exactly one cell boundary, so the walk yields
/// `|Δcol| + |Δrow| + 1` cells, first the start cell and last the target.
/// When both axes reach their next boundary at the same distance the X axis
/// advances first.
#[derive(Debug, Clone)]
pub struct GridRay {
    cell: CellIndex,
    step_x: i64,
    step_y: i64,
    t_max_x: f64,
    t_max_y: f64,
    t_delta_x: f64,
    t_delta_y: f64,
    remaining_x: u64,
    remaining_y: u64,
    started: bool,
}

impl GridRay {
    pub fn new(origin: (f64, f64), target: CellIndex) -> Self {
        let start = CellIndex::containing(origin);
        let (x1, y1) = origin;
        let (x2, y2) = target.as_position();

        let cells_x = target.x - start.x;
        let cells_y = target.y - start.y;
        let step_x = cells_x.signum();
        let step_y = cells_y.signum();

        // grid rows run south, so flip y to get a conventional angle
        let angle = (-(y2 - y1)).atan2(x2 - x1);
        let cos = angle.cos().abs();
        let sin = angle.sin().abs();

        let (t_max_x, t_delta_x) = if step_x == 0 || cos == 0.0 {
            (f64::INFINITY, f64::INFINITY)
        } else {
            let offset = if step_x > 0 { x1.floor() + 1.0 - x1 } else { x1 - x1.floor() };
            (offset / cos, 1.0 / cos)
        };
        let (t_max_y, t_delta_y) = if step_y == 0 || sin == 0.0 {
            (f64::INFINITY, f64::INFINITY)
        } else {
            let offset = if step_y > 0 { y1.floor() + 1.0 - y1 } else { y1 - y1.floor() };
            (offset / sin, 1.0 / sin)
        };

        Self {
            cell: start,
            step_x,
            step_y,
            t_max_x,
            t_max_y,
            t_delta_x,
            t_delta_y,
            remaining_x: cells_x.unsigned_abs(),
            remaining_y: cells_y.unsigned_abs(),
            started: false,
        }
    }

    /// Boundary crossings between the start cell and the target.
    pub fn manhattan_distance(origin: (f64, f64), target: CellIndex) -> u64 {
        let start = CellIndex::containing(origin);
        (target.x - start.x).unsigned_abs() + (target.y - start.y).unsigned_abs()
    }
}

impl Iterator for GridRay {
    type Item = CellIndex;

    fn next(&mut self) -> Option<CellIndex> {
        if !self.started {
            self.started = true;
            return Some(self.cell);
        }
        let advance_x = match (self.remaining_x, self.remaining_y) {
            (0, 0) => return None,
            (_, 0) => true,
            (0, _) => false,
            _ => self.t_max_x <= self.t_max_y,
        };
        if advance_x {
            self.t_max_x += self.t_delta_x;
            self.cell.x += self.step_x;
            self.remaining_x -= 1;
        } else {
            self.t_max_y += self.t_delta_y;
            self.cell.y += self.step_y;
            self.remaining_y -= 1;
        }
        Some(self.cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = (self.remaining_x + self.remaining_y) as usize + usize::from(!self.started);
        (len, Some(len))
    }
}

impl ExactSizeIterator for GridRay {}

/// Running maximum elevation angle along one ray. Never decreases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonState {
    max_angle: f64,
}

impl HorizonState {
    pub fn new(seed: f64) -> Self {
        Self { max_angle: seed }
    }

    pub fn angle(&self) -> f64 {
        self.max_angle
    }

    /// Strictly above the horizon; equal angles are hidden.
    pub fn clears(&self, angle: f64) -> bool {
        angle > self.max_angle
    }

    pub fn absorb(&mut self, angle: f64) {
        self.max_angle = self.max_angle.max(angle);
    }
}

/// One grid cell as seen from the observer during a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledCell {
    pub cell: CellIndex,
    pub position: GeoPoint,
    pub elevation: f64,
    pub distance_m: f64,
    /// `None` where the angle is undefined (zero distance, beyond one earth radius).
    pub angle: Option<f64>,
}

/// A sampled cell together with the horizon it was judged against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayStep {
    pub sample: SampledCell,
    /// Horizon accumulated from the cells strictly before this one.
    pub horizon_before: f64,
    pub visible: bool,
    pub is_target: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RayOutcome {
    pub cells: usize,
    pub visible: usize,
    pub target_visible: bool,
}

pub struct LineOfSight<'a, G: ?Sized> {
    grid: &'a G,
    extent: GridExtent,
    observer: Observer,
    mode: OutputMode,
    target_height_m: f64,
    horizon_seed: f64,
}

impl<'a, G: HeightGrid + ?Sized> LineOfSight<'a, G> {
    pub fn new(
        grid: &'a G,
        observer: Observer,
        mode: OutputMode,
        target_height_m: f64,
        horizon_seed: f64,
    ) -> Self {
        Self {
            grid,
            extent: grid.extent(),
            observer,
            mode,
            target_height_m,
            horizon_seed,
        }
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn extent(&self) -> &GridExtent {
        &self.extent
    }

    fn sample(&self, cell: CellIndex) -> SampledCell {
        let position = self.extent.cell_geo(cell);
        let elevation = self.grid.elevation_at(cell);
        let distance_m = haversine_distance(self.observer.position, position);
        SampledCell {
            cell,
            position,
            elevation,
            distance_m,
            angle: elevation_angle(self.observer.eye_elevation, elevation, distance_m),
        }
    }

    /// Walks the ray to `target`, calling `visit` for every cell in order.
    pub fn walk(&self, target: CellIndex, mut visit: impl FnMut(&RayStep) -> Result<()>) -> Result<RayOutcome> {
        let mut horizon = HorizonState::new(self.horizon_seed);
        let mut outcome = RayOutcome::default();

        for cell in GridRay::new(self.observer.cell, target) {
            let sample = self.sample(cell);
            // an undefined angle counts as level with the horizon: hidden, and absorbing it is a no-op
            let angle = sample.angle.unwrap_or(horizon.angle());
            let step = RayStep {
                sample,
                horizon_before: horizon.angle(),
                visible: horizon.clears(angle),
                is_target: cell == target,
            };
            visit(&step)?;

            outcome.cells += 1;
            if step.visible {
                outcome.visible += 1;
                outcome.target_visible |= step.is_target;
            }
            horizon.absorb(angle);
        }

        Ok(outcome)
    }

    /// Traces the ray to `target` and writes each cell's classification.
    pub fn trace(&self, target: CellIndex, output: &OutputGrid) -> Result<RayOutcome> {
        self.walk(target, |step| match self.classify(step) {
            Some(value) => output.store(step.sample.cell, value),
            None => Ok(()),
        })
    }

    fn classify(&self, step: &RayStep) -> Option<u32> {
        match self.mode {
            OutputMode::RequiredHeight => self.required_height(step).map(|h| COLOR_RAMP.color(h)),
            OutputMode::Visibility => step.visible.then_some(VISIBLE),
            OutputMode::TargetHeight => self
                .required_height(step)
                .filter(|&h| h as f64 >= self.target_height_m)
                .map(|h| COLOR_RAMP.color(h)),
            OutputMode::TargetVisibility => (step.visible && step.is_target).then_some(TARGET_VISIBLE),
        }
    }

    /// Required visible height at this cell, truncated to whole meters.
    fn required_height(&self, step: &RayStep) -> Option<i32> {
        required_visible_height(self.observer.eye_elevation, step.sample.distance_m, step.horizon_before)
            .map(|h| h as i32)
    }
}
