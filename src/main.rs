//! Radial line-of-sight viewshed over a stitched elevation grid.
//!
//! No DEM reader is bundled: the grid is a flat surface at `--flat-elevation`,
//! the same substitute used for regions without elevation data.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use radial_viewshed::geo::grid::{GridExtent, SAMPLES_PER_DEGREE};
use radial_viewshed::io::{write_cells_csv, ObserverParams, DEFAULT_HORIZON_SEED};
use radial_viewshed::terrain::FlatTerrain;
use radial_viewshed::{OutputMode, RunParams, ViewshedEngine};

/// Compute which cells around an observer are visible
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON run file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Observer longitude (degrees)
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Observer latitude (degrees)
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Observer height above terrain (meters)
    #[arg(long)]
    height: Option<f64>,

    /// Search radius (meters)
    #[arg(long)]
    radius: Option<f64>,

    /// Target height for mode 2 (meters)
    #[arg(long, allow_hyphen_values = true)]
    target_height: Option<f64>,

    /// 0 required height, 1 visibility, 2 target height, 3 target visibility
    #[arg(long)]
    mode: Option<u8>,

    /// Number of sector workers
    #[arg(long)]
    workers: Option<usize>,

    /// Initial horizon angle of every ray (radians)
    #[arg(long, allow_hyphen_values = true)]
    horizon_seed: Option<f64>,

    /// Elevation of the substitute flat surface (meters)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    flat_elevation: f64,

    /// Grid samples per degree of longitude/latitude
    #[arg(long, default_value_t = SAMPLES_PER_DEGREE)]
    samples_per_degree: usize,

    /// Write every cell holding data to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,
}

impl Args {
    fn run_params(&self) -> Result<RunParams> {
        let mut params = match &self.config {
            Some(path) => RunParams::from_json_file(path)
                .with_context(|| format!("failed to load run file {}", path.display()))?,
            None => {
                let (Some(longitude), Some(latitude), Some(radius_m)) = (self.lon, self.lat, self.radius) else {
                    anyhow::bail!("--lon, --lat and --radius are required without --config");
                };
                RunParams {
                    observer: ObserverParams {
                        longitude,
                        latitude,
                        height: 0.0,
                    },
                    radius_m,
                    target_height_m: 0.0,
                    mode: OutputMode::Visibility,
                    workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
                    horizon_seed: DEFAULT_HORIZON_SEED,
                }
            }
        };

        if let Some(lon) = self.lon {
            params.observer.longitude = lon;
        }
        if let Some(lat) = self.lat {
            params.observer.latitude = lat;
        }
        if let Some(height) = self.height {
            params.observer.height = height;
        }
        if let Some(radius) = self.radius {
            params.radius_m = radius;
        }
        if let Some(target) = self.target_height {
            params.target_height_m = target;
        }
        if let Some(mode) = self.mode {
            params.mode = OutputMode::try_from(mode)?;
        }
        if let Some(workers) = self.workers {
            params.workers = workers;
        }
        if let Some(seed) = self.horizon_seed {
            params.horizon_seed = seed;
        }

        params.validate()?;
        Ok(params)
    }
}

/// `RUST_LOG`-style directives when given and valid, else info for this crate.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| "radial_viewshed=info".into())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let args = Args::parse();
    let params = args.run_params()?;

    let extent = GridExtent::covering(params.observer.point(), params.radius_m, args.samples_per_degree)
        .context("failed to derive grid extent")?;
    tracing::info!(
        "grid lon [{:.6}, {:.6}] lat [{:.6}, {:.6}], {}x{} cells",
        extent.min_lon,
        extent.max_lon,
        extent.min_lat,
        extent.max_lat,
        extent.width,
        extent.height
    );
    let terrain = FlatTerrain::new(extent, args.flat_elevation);

    let engine = ViewshedEngine::new(params)?;
    let start = Instant::now();
    let viewshed = engine.run(&terrain).context("viewshed computation failed")?;
    tracing::info!(
        mode = ?viewshed.mode,
        cells = viewshed.data_cells(),
        elapsed = ?start.elapsed(),
        "viewshed ready"
    );
    tracing::debug!("world file terms: {:?}", viewshed.world_file_terms());

    if let Some(path) = &args.csv {
        let start = Instant::now();
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let rows = write_cells_csv(&viewshed, BufWriter::new(file))?;
        tracing::info!(rows, elapsed = ?start.elapsed(), "wrote {}", path.display());
    }

    Ok(())
}
