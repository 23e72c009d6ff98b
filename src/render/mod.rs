//! ARGB encoding of required-visible heights.

use std::sync::LazyLock;

use crate::coverage::NO_DATA;

/// Largest height (meters) the lookup table covers.
pub const RAMP_MAX_HEIGHT: i32 = 5000;

const MILESTONES: [i32; 7] = [0, 10, 20, 60, 180, 540, 2000];
const MILESTONE_COLORS: [u32; 7] = [
    0xFFFF0000, // red
    0xFFFFA500, // orange
    0xFFFFFF00, // yellow
    0xFF00FF00, // green
    0xFF00FFFF, // cyan
    0xFF0000FF, // blue
    0xFF800080, // purple
];

/// Shared table, built on first use and read-only afterwards.
pub static COLOR_RAMP: LazyLock<ColorRamp> = LazyLock::new(ColorRamp::new);

/// Precomputed color for every integer height in `0..=RAMP_MAX_HEIGHT`.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    table: Vec<u32>,
}

impl ColorRamp {
    pub fn new() -> Self {
        let table = (0..=RAMP_MAX_HEIGHT).map(interpolated_color).collect();
        Self { table }
    }

    /// Color for `height`; heights outside the table are transparent.
    pub fn color(&self, height: i32) -> u32 {
        usize::try_from(height)
            .ok()
            .and_then(|idx| self.table.get(idx).copied())
            .unwrap_or(NO_DATA)
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::new()
    }
}

fn interpolated_color(value: i32) -> u32 {
    MILESTONES
        .windows(2)
        .zip(MILESTONE_COLORS.windows(2))
        .find(|(range, _)| (range[0]..=range[1]).contains(&value))
        .map(|(range, colors)| lerp_argb(colors[0], colors[1], value, range[0], range[1]))
        .unwrap_or(NO_DATA)
}

fn lerp_argb(from: u32, to: u32, value: i32, start: i32, end: i32) -> u32 {
    let ratio = (value - start) as f64 / (end - start) as f64;
    [24u32, 16, 8, 0].iter().fold(0u32, |acc, &shift| {
        let a = ((from >> shift) & 0xFF) as f64;
        let b = ((to >> shift) & 0xFF) as f64;
        let channel = (a + ratio * (b - a)) as u32;
        acc | (channel << shift)
    })
}
