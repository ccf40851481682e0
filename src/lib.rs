// src/lib.rs

pub mod config;
pub mod error;
pub mod grid;
pub mod picker;
pub mod sampler;

pub use config::PickerConfig;
pub use error::{PickError, SamplerError};
pub use picker::{ColorPicker, PickState, PickerOptions};
pub use sampler::SamplerManager;
