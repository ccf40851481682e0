//! Interactive color picking
//!
//! [`ColorPicker::pick_color`] warms up the sampler, shows the surface, and
//! resolves to the first of: a selection, a cancel, or the surface closing.
//!
//! # Usage
//!
//! ```rust,ignore
//! let options = PickerOptions::from(&PickerConfig::from_env())
//!     .with_color_namer(|rgb| my_palette.closest(rgb));
//! let picker = ColorPicker::new(options, ConsoleSurfaceFactory::new(), CtrlCCancelKey);
//!
//! match picker.pick_color().await {
//!     Some(hex) => println!("{hex}"),
//!     None => println!("cancelled"),
//! }
//! ```

pub mod console;
mod session;
pub mod surface;

pub use session::{ColorPicker, DEFAULT_COLOR, DEFAULT_SAMPLE_RATE, PickState, PickerOptions};
pub use surface::{
    CancelKey, ColorNamer, PixelGridUpdate, PositionUpdate, Registration, Rgb, Surface,
    SurfaceEvent, SurfaceFactory, UNKNOWN_COLOR_NAME,
};
