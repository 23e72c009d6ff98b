use thiserror::Error;

use crate::geo::grid::CellIndex;

#[derive(Debug, Error)]
pub enum ViewshedError {
    #[error("invalid run parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("unknown output mode {0} (expected 0..=3)")]
    UnknownMode(u8),

    #[error(
        "invalid grid extent lon [{min_lon}, {max_lon}] lat [{min_lat}, {max_lat}] size {width}x{height}"
    )]
    InvalidExtent {
        min_lon: f64,
        max_lon: f64,
        min_lat: f64,
        max_lat: f64,
        width: usize,
        height: usize,
    },

    #[error("observer at lon {longitude}, lat {latitude} lies outside the height grid")]
    ObserverOutsideGrid { longitude: f64, latitude: f64 },

    #[error("write to cell ({}, {}) outside the {width}x{height} output grid", .cell.x, .cell.y)]
    CellOutOfBounds {
        cell: CellIndex,
        width: usize,
        height: usize,
    },

    #[error("elevation raster holds {actual} samples, extent needs {expected}")]
    RasterSizeMismatch { expected: usize, actual: usize },

    #[error("failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ViewshedError>;
