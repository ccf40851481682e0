//! Collaborator seams for the picking session
//!
//! The session never touches windows or OS hotkeys directly. It talks to a
//! [`Surface`] that renders the magnifier and a [`CancelKey`] that reports a
//! system-wide cancel press. Every subscription returns a [`Registration`]
//! owned by the session for exactly one pick.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::sampler::PixelColor;

// ============================================================================
// Events & Payloads
// ============================================================================

/// Signals emitted by the interactive surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    /// Surface finished loading
    Ready,
    /// User confirmed the color under the cursor
    ColorSelected,
    /// User cancelled from inside the surface
    Cancelled,
    /// Scroll changed the magnifier diameter
    ZoomDiameter(f64),
    /// Scroll changed the cell density
    ZoomDensity(f64),
    /// Surface was dismissed by other means (window manager close, etc.)
    Closed,
}

/// Magnifier placement update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub x: i32,
    pub y: i32,
    pub display_x: i32,
    pub display_y: i32,
}

/// Pixel grid to draw inside the magnifier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelGridUpdate {
    pub center_color: PixelColor,
    pub color_name: String,
    pub pixels: Vec<Vec<PixelColor>>,
    pub diameter: f64,
    pub grid_size: u32,
    pub cell_size: f64,
}

/// Plain RGB triple handed to the naming function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<&PixelColor> for Rgb {
    fn from(color: &PixelColor) -> Self {
        Self {
            r: color.r,
            g: color.g,
            b: color.b,
        }
    }
}

/// Pure function naming a color for display
pub type ColorNamer = Arc<dyn Fn(Rgb) -> String + Send + Sync>;

/// Name used when no naming function is injected
pub const UNKNOWN_COLOR_NAME: &str = "Unknown";

pub fn unknown_color_name() -> ColorNamer {
    Arc::new(|_| UNKNOWN_COLOR_NAME.to_string())
}

// ============================================================================
// Registration
// ============================================================================

/// Handle to a listener or hotkey installed for one pick.
///
/// Releasing runs the unregister action once; dropping an unreleased handle
/// releases it.
pub struct Registration {
    name: &'static str,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Registration {
    pub fn new(name: &'static str, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name,
            release: Some(Box::new(release)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::trace!(registration = self.name, "Releasing registration");
            release();
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("released", &self.release.is_none())
            .finish()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// The interactive magnifier surface
pub trait Surface: Send {
    /// Make the surface visible
    fn show(&mut self);

    /// Top-left corner of the display the surface covers
    fn origin(&self) -> (i32, i32);

    fn update_position(&mut self, update: PositionUpdate);

    fn update_pixel_grid(&mut self, update: PixelGridUpdate);

    /// Deliver surface events to `tx` until the registration is released
    fn subscribe(&mut self, tx: mpsc::UnboundedSender<SurfaceEvent>) -> Registration;

    /// Whether the surface is already gone
    fn is_destroyed(&self) -> bool;

    fn close(&mut self);
}

/// Creates a fresh surface for each pick
#[async_trait]
pub trait SurfaceFactory: Send {
    async fn open(&mut self) -> anyhow::Result<Box<dyn Surface>>;
}

/// System-wide cancel key (Escape in a desktop build)
pub trait CancelKey: Send {
    /// Send `()` to `tx` on every press until the registration is released
    fn register(&mut self, tx: mpsc::UnboundedSender<()>) -> anyhow::Result<Registration>;
}
