//! Sector-parallel radial viewshed.
//!
//! The full circle around the observer is cut into one equal bearing sector per
//! worker. Each worker walks the perimeter cells of its sector clockwise and
//! traces a line of sight to every one of them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::coverage::{OutputGrid, NO_DATA};
use crate::error::{Result, ViewshedError};
use crate::geo::grid::{CellIndex, GridExtent};
use crate::geo::{angular_delta, azimuth, destination_point, haversine_distance};
use crate::io::{OutputMode, RunParams};
use crate::physics::curvature::horizon_distance;
use crate::physics::los::{LineOfSight, Observer};
use crate::physics::sweep::{radial_sweep, VisitedSet};
use crate::render::COLOR_RAMP;
use crate::terrain::HeightGrid;

/// Angular change at which a sole worker has gone all the way round.
const FULL_TURN_DEG: f64 = 359.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorRole {
    /// The only worker; sweeps the whole circle.
    Sole,
    /// Owns the sector that wraps back to 0°.
    Last,
    Interior,
}

/// Bearing range owned by one worker, resolved to perimeter cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorPlan {
    pub worker: usize,
    pub role: SectorRole,
    pub start_bearing: f64,
    pub end_bearing: f64,
    pub start_cell: CellIndex,
    pub end_cell: CellIndex,
    /// Achieved grid azimuth of `start_cell`; differs from `start_bearing` by quantisation.
    pub start_azimuth: f64,
    pub end_azimuth: f64,
}

impl SectorPlan {
    /// Clockwise angle from the start to the end azimuth.
    pub fn span(&self) -> f64 {
        match self.role {
            SectorRole::Sole => 360.0,
            _ => (self.end_azimuth - self.start_azimuth).rem_euclid(360.0),
        }
    }
}

/// Splits [0°, 360°) into `workers` equal sectors. The last sector ends at the
/// first sector's start.
pub fn plan_sectors(observer: &Observer, extent: &GridExtent, radius_m: f64, workers: usize) -> Vec<SectorPlan> {
    let chunk = 360.0 / workers as f64;
    let resolve = |bearing: f64| {
        let point = destination_point(observer.position, bearing, radius_m - 1.0);
        let cell = CellIndex::containing(extent.to_cell(point));
        (cell, azimuth(observer.cell, cell.as_position()))
    };

    (0..workers)
        .map(|worker| {
            let role = if workers == 1 {
                SectorRole::Sole
            } else if worker == workers - 1 {
                SectorRole::Last
            } else {
                SectorRole::Interior
            };
            let start_bearing = worker as f64 * chunk;
            let end_bearing = if role == SectorRole::Interior {
                (worker + 1) as f64 * chunk
            } else {
                0.0
            };
            let (start_cell, start_azimuth) = resolve(start_bearing);
            let (end_cell, end_azimuth) = resolve(end_bearing);
            debug!(
                worker,
                start_azimuth, end_azimuth, "sector resolved from bearings {start_bearing}..{end_bearing}"
            );
            SectorPlan {
                worker,
                role,
                start_bearing,
                end_bearing,
                start_cell,
                end_cell,
                start_azimuth,
                end_azimuth,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorReport {
    pub worker: usize,
    pub start_azimuth: f64,
    pub end_azimuth: f64,
    /// Sum of absolute azimuth changes between consecutive perimeter cells.
    pub angular_change: f64,
    pub rays_traced: usize,
    pub cells_visible: usize,
    /// The walk ran out of unvisited in-range candidates before its end condition.
    pub stalled: bool,
    /// The walk stopped at the per-sector ray cap.
    pub capped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepState {
    SeekingStart,
    Sweeping,
    Done,
}

struct SectorWorker<'a, G: ?Sized> {
    plan: SectorPlan,
    los: &'a LineOfSight<'a, G>,
    output: &'a OutputGrid,
    radius_m: f64,
    max_rays: usize,
    progress: Option<&'a AtomicUsize>,
}

impl<G: HeightGrid + ?Sized> SectorWorker<'_, G> {
    fn run(self) -> Result<SectorReport> {
        let plan = self.plan;
        let observer = *self.los.observer();
        let extent = *self.los.extent();

        let mut visited = VisitedSet::new();
        let mut state = SweepState::SeekingStart;
        let mut cell = plan.start_cell;
        let mut current = plan.start_azimuth;
        let mut previous = plan.start_azimuth;
        let mut angular_change = 0.0;
        // clockwise progress from the start azimuth, signed
        let mut swept = 0.0;
        let mut report = SectorReport {
            worker: plan.worker,
            start_azimuth: plan.start_azimuth,
            end_azimuth: plan.end_azimuth,
            angular_change: 0.0,
            rays_traced: 0,
            cells_visible: 0,
            stalled: false,
            capped: false,
        };

        while state != SweepState::Done {
            state = match state {
                SweepState::SeekingStart => {
                    self.trace(cell, &mut report)?;
                    visited.insert(cell);
                    SweepState::Sweeping
                }
                SweepState::Sweeping => {
                    let Some(next) = radial_sweep(cell, observer.position, &extent, self.radius_m, current, &visited)
                    else {
                        warn!(worker = plan.worker, x = cell.x, y = cell.y, azimuth = current, "radial sweep stalled");
                        report.stalled = true;
                        break;
                    };
                    cell = next;
                    current = azimuth(observer.cell, cell.as_position());
                    let delta = angular_delta(previous, current);
                    angular_change += delta.abs();
                    swept += delta;

                    visited.insert(cell);
                    self.trace(cell, &mut report)?;

                    if self.finished(previous, current, angular_change, swept) {
                        SweepState::Done
                    } else if report.rays_traced >= self.max_rays {
                        warn!(worker = plan.worker, rays = report.rays_traced, "sector sweep hit its ray cap");
                        report.capped = true;
                        SweepState::Done
                    } else {
                        previous = current;
                        SweepState::Sweeping
                    }
                }
                SweepState::Done => SweepState::Done,
            };
        }

        report.angular_change = angular_change;
        info!(
            worker = plan.worker,
            rays = report.rays_traced,
            visible = report.cells_visible,
            angular_change,
            "sector done"
        );
        Ok(report)
    }

    fn trace(&self, cell: CellIndex, report: &mut SectorReport) -> Result<()> {
        let outcome = self.los.trace(cell, self.output)?;
        report.rays_traced += 1;
        report.cells_visible += outcome.visible;
        if let Some(progress) = self.progress {
            progress.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn finished(&self, previous: f64, current: f64, angular_change: f64, swept: f64) -> bool {
        match self.plan.role {
            SectorRole::Sole => angular_change >= FULL_TURN_DEG,
            SectorRole::Last => (previous > 358.0 && current < 1.0) || swept > self.plan.span(),
            // compare on the unwrapped circle so a start just west of north is not already "past" the end
            SectorRole::Interior => swept > self.plan.span(),
        }
    }
}

/// Output raster of a finished run plus per-sector statistics.
#[derive(Debug, Clone)]
pub struct Viewshed {
    pub extent: GridExtent,
    pub mode: OutputMode,
    /// Row-major 32-bit values (ARGB color or classification flag).
    pub pixels: Vec<u32>,
    pub sectors: Vec<SectorReport>,
}

impl Viewshed {
    pub fn value(&self, cell: CellIndex) -> Option<u32> {
        self.extent.linear_index(cell).map(|idx| self.pixels[idx])
    }

    pub fn count_where(&self, pred: impl Fn(u32) -> bool) -> usize {
        self.pixels.iter().filter(|&&v| pred(v)).count()
    }

    pub fn data_cells(&self) -> usize {
        self.count_where(|v| v != NO_DATA)
    }

    pub fn is_empty(&self) -> bool {
        self.data_cells() == 0
    }

    /// Degrees per pixel along (longitude, latitude).
    pub fn pixel_size(&self) -> (f64, f64) {
        self.extent.pixel_size()
    }

    /// Affine georeferencing terms in world-file order: x size, two rotation
    /// terms, negated y size, then the upper-left longitude and latitude.
    pub fn world_file_terms(&self) -> [f64; 6] {
        let (x_size, y_size) = self.pixel_size();
        [x_size, 0.0, 0.0, -y_size, self.extent.min_lon, self.extent.max_lat]
    }

    pub fn world_file(&self) -> String {
        self.world_file_terms()
            .iter()
            .map(|term| format!("{term:.10}\n"))
            .collect()
    }
}

pub struct ViewshedEngine {
    params: RunParams,
    progress: Option<Arc<AtomicUsize>>,
    ray_cap: Option<usize>,
}

impl ViewshedEngine {
    pub fn new(params: RunParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            progress: None,
            ray_cap: None,
        })
    }

    /// Counter bumped once per traced ray, readable while the run is in flight.
    pub fn with_progress(mut self, progress: Arc<AtomicUsize>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Overrides the per-sector ray cap derived from the disc size.
    pub fn with_ray_cap(mut self, max_rays: usize) -> Self {
        self.ray_cap = Some(max_rays.max(1));
        self
    }

    pub fn run<G: HeightGrid + Sync + ?Sized>(&self, grid: &G) -> Result<Viewshed> {
        let params = &self.params;
        let extent = grid.extent();
        let observer = Observer::resolve(params.observer.point(), params.observer.height, grid)?;
        ensure_disc_inside(&observer, &extent, params.radius_m)?;

        info!(
            longitude = observer.position.longitude,
            latitude = observer.position.latitude,
            eye_elevation = observer.eye_elevation,
            horizon_m = horizon_distance(observer.height_agl),
            radius_m = params.radius_m,
            mode = ?params.mode,
            workers = params.workers,
            "computing viewshed on {}x{} grid",
            extent.width,
            extent.height
        );

        // build the color table before any worker reads it
        LazyLock::force(&COLOR_RAMP);
        let output = OutputGrid::new(extent);
        let los = LineOfSight::new(grid, observer, params.mode, params.target_height_m, params.horizon_seed);
        let plans = plan_sectors(&observer, &extent, params.radius_m, params.workers);
        let max_rays = self
            .ray_cap
            .unwrap_or_else(|| ray_cap(&observer, &extent, params.radius_m));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.workers)
            .thread_name(|i| format!("sector-{i}"))
            .build()?;

        let start = Instant::now();
        let sectors = pool.install(|| {
            plans
                .into_par_iter()
                .map(|plan| {
                    SectorWorker {
                        plan,
                        los: &los,
                        output: &output,
                        radius_m: params.radius_m,
                        max_rays,
                        progress: self.progress.as_deref(),
                    }
                    .run()
                })
                .collect::<Result<Vec<_>>>()
        })?;
        info!(elapsed = ?start.elapsed(), "viewshed sweep finished");

        Ok(Viewshed {
            extent,
            mode: params.mode,
            pixels: output.into_pixels(),
            sectors,
        })
    }
}

/// Fails when the disc of `radius_m` (plus one cell) does not fit in the grid.
fn ensure_disc_inside(observer: &Observer, extent: &GridExtent, radius_m: f64) -> Result<()> {
    let outward = [(0.0, (0, -1)), (90.0, (1, 0)), (180.0, (0, 1)), (270.0, (-1, 0))];
    for (bearing, (dx, dy)) in outward {
        let edge = destination_point(observer.position, bearing, radius_m);
        let cell = CellIndex::containing(extent.to_cell(edge)).offset(dx, dy);
        if !extent.contains(cell) {
            return Err(ViewshedError::InvalidParameter {
                name: "radius_m",
                reason: format!("disc of {radius_m} m leaves the height grid at bearing {bearing}"),
            });
        }
    }
    Ok(())
}

/// Upper bound on rays per sector: twice the perimeter of the disc's bounding square.
fn ray_cap(observer: &Observer, extent: &GridExtent, radius_m: f64) -> usize {
    let origin = observer.grid_cell();
    let here = extent.cell_geo(origin);
    let cell_w = haversine_distance(here, extent.cell_geo(origin.offset(1, 0)));
    let cell_h = haversine_distance(here, extent.cell_geo(origin.offset(0, 1)));
    let radius_cells = radius_m / cell_w.min(cell_h).max(f64::EPSILON);
    (16.0 * (radius_cells + 2.0)).ceil() as usize
}
