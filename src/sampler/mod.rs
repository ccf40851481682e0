//! Sampler Process Manager
//!
//! Supervises the external pixel sampler and frames its protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PICKING SESSION                          │
//! │  • ensure_started() before the surface is shown             │
//! │  • update_grid_size() on zoom                               │
//! │  • stop() during cleanup                                    │
//! └─────────────────────────────────────────────────────────────┘
//!                  │ commands                ▲ SamplerMessage
//!                  ▼                         │ (EventSink)
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SamplerManager                           │
//! │  • owns the Child and both pipe ends                        │
//! │  • FrameDecoder splits stdout into lines                    │
//! │  • stderr is logged, never parsed                           │
//! └─────────────────────────────────────────────────────────────┘
//!                  │ stdin (NDJSON)          ▲ stdout (NDJSON)
//!                  ▼                         │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 hue-hunter-sampler (spawned)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut sampler = SamplerManager::new(SamplerSettings::default());
//!
//! // Block until the first frame arrives (permission prompts happen here)
//! sampler.ensure_started(SamplerConfig::new(9, 15), STARTUP_TIMEOUT).await?;
//!
//! // Route later frames somewhere useful
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! sampler.set_sink(tx).await;
//!
//! sampler.update_grid_size(11).await;
//! sampler.stop().await;
//! ```

mod process;
mod stream;
pub mod types;

pub use process::{KILL_GRACE, STARTUP_TIMEOUT, STOP_GRACE, SamplerManager};
pub use stream::{FrameDecoder, parse_message};
pub use types::{
    ControlCommand, CursorPosition, ErrorFrame, EventSink, PixelColor, SAMPLER_BINARY_NAME,
    SampleFrame, SamplerConfig, SamplerMessage, SamplerSettings,
};
