use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use itertools::iproduct;
use serde::{Deserialize, Serialize};

use crate::coverage::NO_DATA;
use crate::error::{Result, ViewshedError};
use crate::geo::grid::CellIndex;
use crate::geo::{GeoPoint, EARTH_RADIUS};
use crate::physics::viewshed::Viewshed;

/// Horizon angle a fresh ray starts from: just below straight down.
pub const DEFAULT_HORIZON_SEED: f64 = -1.6;

/// What each traced cell contributes to the output raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OutputMode {
    /// Color-mapped height a cell needs to be seen.
    RequiredHeight,
    /// Flag every cell that clears the horizon.
    Visibility,
    /// Color-mapped required height, only where it reaches the target height.
    TargetHeight,
    /// Flag ray end cells that clear the horizon.
    TargetVisibility,
}

impl TryFrom<u8> for OutputMode {
    type Error = ViewshedError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(OutputMode::RequiredHeight),
            1 => Ok(OutputMode::Visibility),
            2 => Ok(OutputMode::TargetHeight),
            3 => Ok(OutputMode::TargetVisibility),
            other => Err(ViewshedError::UnknownMode(other)),
        }
    }
}

impl From<OutputMode> for u8 {
    fn from(mode: OutputMode) -> u8 {
        match mode {
            OutputMode::RequiredHeight => 0,
            OutputMode::Visibility => 1,
            OutputMode::TargetHeight => 2,
            OutputMode::TargetVisibility => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverParams {
    pub longitude: f64,
    pub latitude: f64,
    /// Eye height above the terrain, meters.
    #[serde(default)]
    pub height: f64,
}

impl ObserverParams {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub observer: ObserverParams,
    pub radius_m: f64,
    #[serde(default)]
    pub target_height_m: f64,
    #[serde(default = "default_mode")]
    pub mode: OutputMode,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_horizon_seed")]
    pub horizon_seed: f64,
}

fn default_mode() -> OutputMode {
    OutputMode::Visibility
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

fn default_horizon_seed() -> f64 {
    DEFAULT_HORIZON_SEED
}

impl RunParams {
    pub fn new(observer: ObserverParams, radius_m: f64, mode: OutputMode, workers: usize) -> Self {
        Self {
            observer,
            radius_m,
            target_height_m: 0.0,
            mode,
            workers,
            horizon_seed: DEFAULT_HORIZON_SEED,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let params: RunParams = serde_json::from_reader(reader)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &'static str, reason: String| ViewshedError::InvalidParameter { name, reason };

        let ObserverParams {
            longitude,
            latitude,
            height,
        } = self.observer;
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid("observer.longitude", format!("{longitude} not in [-180, 180]")));
        }
        if !(latitude > -90.0 && latitude < 90.0) {
            return Err(invalid("observer.latitude", format!("{latitude} not in (-90, 90)")));
        }
        if !height.is_finite() {
            return Err(invalid("observer.height", format!("{height} is not finite")));
        }
        // perimeter cells are resolved at radius - 1 m
        if !(self.radius_m > 1.0 && self.radius_m < EARTH_RADIUS) {
            return Err(invalid(
                "radius_m",
                format!("{} not in (1, {EARTH_RADIUS})", self.radius_m),
            ));
        }
        if !self.target_height_m.is_finite() {
            return Err(invalid("target_height_m", format!("{} is not finite", self.target_height_m)));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "at least one worker is required".to_string()));
        }
        if !self.horizon_seed.is_finite() {
            return Err(invalid("horizon_seed", format!("{} is not finite", self.horizon_seed)));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CellRow {
    x: usize,
    y: usize,
    longitude: f64,
    latitude: f64,
    value: u32,
}

/// Writes one CSV row per cell holding data. Returns the number of rows.
pub fn write_cells_csv<W: Write>(viewshed: &Viewshed, writer: W) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    let extent = viewshed.extent;
    let mut rows = 0;

    for (y, x) in iproduct!(0..extent.height, 0..extent.width) {
        let value = viewshed.pixels[y * extent.width + x];
        if value == NO_DATA {
            continue;
        }
        let geo = extent.cell_geo(CellIndex::new(x as i64, y as i64));
        csv.serialize(CellRow {
            x,
            y,
            longitude: geo.longitude,
            latitude: geo.latitude,
            value,
        })?;
        rows += 1;
    }

    csv.flush()?;
    Ok(rows)
}
