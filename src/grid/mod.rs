//! Grid sizing for the magnifier
//!
//! Pure arithmetic that turns a magnifier diameter and a cell size into the
//! odd number of cells per side the sampler captures and the surface draws.

use serde::Serialize;

/// Smallest grid the magnifier ever asks for (one center cell plus a ring)
pub const MIN_GRID_SIZE: u32 = 3;

/// Extra cells added on each side by [`buffered_grid_size`] unless told otherwise
pub const DEFAULT_GRID_BUFFER: u32 = 2;

pub const MIN_DIAMETER: f64 = 120.0;
pub const MAX_DIAMETER: f64 = 420.0;
pub const DIAMETER_STEP: f64 = 60.0;

pub const MIN_CELL_SIZE: f64 = 10.0;
pub const MAX_CELL_SIZE: f64 = 40.0;
pub const CELL_SIZE_STEP: f64 = 5.0;

// ============================================================================
// Sizing
// ============================================================================

/// Number of cells that fit across a circle of `diameter`.
///
/// Always odd so there is a single center cell, and never below
/// [`MIN_GRID_SIZE`]. An even fit rounds up to the next odd number.
pub fn grid_size(diameter: f64, cell_size: f64) -> u32 {
    let fit = (diameter / cell_size).round();
    if !fit.is_finite() || fit < MIN_GRID_SIZE as f64 {
        return MIN_GRID_SIZE;
    }

    let fit = fit as u32;
    if fit % 2 == 0 { fit + 1 } else { fit }
}

/// Grid size padded by `buffer` cells in every direction.
///
/// The padding keeps enough pixel data around the edges while a zoom
/// transition is in flight.
pub fn buffered_grid_size(diameter: f64, cell_size: f64, buffer: u32) -> u32 {
    let buffered = grid_size(diameter, cell_size) + buffer * 2;
    if buffered % 2 == 0 { buffered + 1 } else { buffered }
}

/// Rendered cell size that makes `grid_size` cells fill `diameter` exactly.
///
/// 9 nominal 20px cells in a 182px circle render at 20.22px each.
pub fn actual_cell_size(diameter: f64, grid_size: u32) -> f64 {
    diameter / grid_size as f64
}

// ============================================================================
// Zoom steps
// ============================================================================

/// Next magnifier diameter for a scroll of `delta` (sign gives the direction)
pub fn next_diameter(current: f64, delta: f64) -> f64 {
    step_within(current, delta, DIAMETER_STEP, MIN_DIAMETER, MAX_DIAMETER)
}

/// Next cell size for a density change of `delta` (sign gives the direction)
pub fn adjust_cell_size(current: f64, delta: f64) -> f64 {
    step_within(current, delta, CELL_SIZE_STEP, MIN_CELL_SIZE, MAX_CELL_SIZE)
}

fn step_within(current: f64, delta: f64, step: f64, min: f64, max: f64) -> f64 {
    if delta == 0.0 || delta.is_nan() {
        return current;
    }
    let next = if delta > 0.0 { current + step } else { current - step };
    next.clamp(min, max)
}

// ============================================================================
// GridConfig
// ============================================================================

/// Current magnifier geometry.
///
/// `grid_size` is always derived from the other two fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    diameter: f64,
    cell_size: f64,
    grid_size: u32,
}

impl GridConfig {
    pub fn new(diameter: f64, cell_size: f64) -> Self {
        Self {
            diameter,
            cell_size,
            grid_size: grid_size(diameter, cell_size),
        }
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    /// Cell size the surface should draw so the grid fills the circle
    pub fn actual_cell_size(&self) -> f64 {
        actual_cell_size(self.diameter, self.grid_size)
    }

    pub fn with_diameter(self, diameter: f64) -> Self {
        Self::new(diameter, self.cell_size)
    }

    pub fn with_cell_size(self, cell_size: f64) -> Self {
        Self::new(self.diameter, cell_size)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::new(180.0, 20.0)
    }
}
