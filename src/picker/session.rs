//! Picking session state machine
//!
//! One [`ColorPicker`] owns the sampler and runs at most one pick at a time:
//!
//! ```text
//! Idle --pick_color()--> Starting --sampler ready, surface shown--> Active
//!   ^                                                                 |
//!   +------------- cleanup <-------- Resolving <--- terminal event ---+
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::surface::{
    CancelKey, ColorNamer, PixelGridUpdate, PositionUpdate, Registration, Rgb, Surface,
    SurfaceEvent, SurfaceFactory, unknown_color_name,
};
use crate::config::PickerConfig;
use crate::error::PickError;
use crate::grid::{GridConfig, adjust_cell_size, next_diameter};
use crate::sampler::{SampleFrame, SamplerConfig, SamplerManager, SamplerMessage, SamplerSettings};

/// Color reported when the user selects before any sample arrived
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Sampler rate used unless configured otherwise
pub const DEFAULT_SAMPLE_RATE: u32 = 15;

// ============================================================================
// State
// ============================================================================

/// Lifecycle of the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickState {
    /// Ready for a new pick
    Idle,
    /// Warming up the sampler and opening the surface
    Starting,
    /// Surface shown, waiting for a terminal event
    Active,
    /// A terminal event won; cleanup is running
    Resolving,
}

#[derive(Debug, Clone)]
struct StateCell(Arc<Mutex<PickState>>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(PickState::Idle)))
    }

    fn get(&self) -> PickState {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `to` only if currently in `from`; the single check-and-set point
    fn transition(&self, from: PickState, to: PickState) -> bool {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    fn set(&self, to: PickState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

/// Returns the picker to Idle however the pick ends, including a dropped future
struct IdleOnDrop(StateCell);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.set(PickState::Idle);
    }
}

/// Kills the sampler if a pick is dropped before its cleanup ran
struct AbortOnDrop<'a>(&'a mut PickerSession);

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        self.0.sampler.abort();
    }
}

// ============================================================================
// Options
// ============================================================================

/// Construction options for [`ColorPicker`]
#[derive(Clone)]
pub struct PickerOptions {
    pub sampler: SamplerSettings,
    pub grid: GridConfig,
    pub sample_rate: u32,
    pub startup_timeout: Duration,
    pub color_namer: ColorNamer,
}

impl PickerOptions {
    pub fn with_sampler(mut self, sampler: SamplerSettings) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_grid(mut self, diameter: f64, cell_size: f64) -> Self {
        self.grid = GridConfig::new(diameter, cell_size);
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_color_namer(mut self, namer: impl Fn(Rgb) -> String + Send + Sync + 'static) -> Self {
        self.color_namer = Arc::new(namer);
        self
    }
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            sampler: SamplerSettings::default(),
            grid: GridConfig::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            startup_timeout: crate::sampler::STARTUP_TIMEOUT,
            color_namer: unknown_color_name(),
        }
    }
}

impl From<&PickerConfig> for PickerOptions {
    fn from(config: &PickerConfig) -> Self {
        Self {
            sampler: SamplerSettings {
                binary: config.sampler_binary.clone(),
                args: Vec::new(),
            },
            grid: GridConfig::new(config.diameter, config.cell_size),
            sample_rate: config.sample_rate,
            startup_timeout: Duration::from_millis(config.startup_timeout_ms),
            color_namer: unknown_color_name(),
        }
    }
}

// ============================================================================
// ColorPicker
// ============================================================================

/// Magnifying color picker.
///
/// Cheap to clone; clones share the same session, so only one pick runs at
/// a time across all of them.
#[derive(Clone)]
pub struct ColorPicker {
    state: StateCell,
    session: Arc<tokio::sync::Mutex<PickerSession>>,
}

impl ColorPicker {
    pub fn new(
        options: PickerOptions,
        surfaces: impl SurfaceFactory + 'static,
        cancel_key: impl CancelKey + 'static,
    ) -> Self {
        let session = PickerSession {
            sampler: SamplerManager::new(options.sampler),
            surfaces: Box::new(surfaces),
            cancel_key: Box::new(cancel_key),
            namer: options.color_namer,
            grid: options.grid,
            sample_rate: options.sample_rate,
            startup_timeout: options.startup_timeout,
        };

        Self {
            state: StateCell::new(),
            session: Arc::new(tokio::sync::Mutex::new(session)),
        }
    }

    /// Run one pick and return the selected hex color, or `None` if the pick
    /// was cancelled, failed, or another pick is already in progress.
    pub async fn pick_color(&self) -> Option<String> {
        if !self.state.transition(PickState::Idle, PickState::Starting) {
            warn!(state = ?self.state.get(), "Pick already in progress, ignoring request");
            return None;
        }
        let _idle = IdleOnDrop(self.state.clone());

        let pick_id = format!("pick_{}", Uuid::new_v4());
        let mut session = self.session.lock().await;
        session
            .run(&self.state)
            .instrument(info_span!("pick", %pick_id))
            .await
    }

    pub fn state(&self) -> PickState {
        self.state.get()
    }

    /// Current magnifier geometry (waits for a running pick to finish)
    pub async fn grid_config(&self) -> GridConfig {
        self.session.lock().await.grid
    }
}

/// Everything a pick needs, guarded by the picker's session lock
struct PickerSession {
    sampler: SamplerManager,
    surfaces: Box<dyn SurfaceFactory>,
    cancel_key: Box<dyn CancelKey>,
    namer: ColorNamer,
    grid: GridConfig,
    sample_rate: u32,
    startup_timeout: Duration,
}

/// Input to the session loop
enum PickEvent {
    CancelKey,
    Surface(SurfaceEvent),
    Sampler(SamplerMessage),
}

impl PickerSession {
    async fn run(&mut self, state: &StateCell) -> Option<String> {
        let mut session = AbortOnDrop(self);
        let mut wiring = Wiring::default();
        let outcome = session.0.pick(state, &mut wiring).await;

        wiring.release();
        session.0.sampler.stop().await;

        match outcome {
            Ok(Some(color)) => {
                info!(%color, "Color picked");
                Some(color)
            }
            Ok(None) => {
                info!("Pick cancelled");
                None
            }
            Err(e) => {
                warn!(error = %e, "Pick failed");
                None
            }
        }
    }

    async fn pick(
        &mut self,
        state: &StateCell,
        wiring: &mut Wiring,
    ) -> Result<Option<String>, PickError> {
        // Permission prompts must be answered before the overlay covers them
        self.sampler
            .ensure_started(self.sampler_config(), self.startup_timeout)
            .await?;

        let mut surface = self.surfaces.open().await.map_err(PickError::Surface)?;

        // Subscribe before showing so the surface's Ready event is seen
        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
        wiring.add(surface.subscribe(ui_tx));
        surface.show();
        wiring.surface = Some(surface);

        let (key_tx, mut key_rx) = mpsc::unbounded_channel();
        let key = self.cancel_key.register(key_tx).map_err(PickError::CancelKey)?;
        wiring.add(key);

        let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
        if self.sampler.is_running() {
            self.sampler.set_sink(sample_tx).await;
        } else {
            debug!("Sampler stopped after warm-up, starting it again");
            if let Err(e) = self.sampler.start(self.sampler_config(), sample_tx).await {
                warn!(error = %e, "Failed to restart sampler");
            }
        }

        if !state.transition(PickState::Starting, PickState::Active) {
            warn!(state = ?state.get(), "Pick left Starting unexpectedly, abandoning it");
            return Ok(None);
        }
        let mut current_color = DEFAULT_COLOR.to_string();

        loop {
            // Terminal sources are polled ahead of sampler data
            let event = tokio::select! {
                biased;
                Some(()) = key_rx.recv() => PickEvent::CancelKey,
                ui = ui_rx.recv() => PickEvent::Surface(ui.unwrap_or(SurfaceEvent::Closed)),
                Some(message) = sample_rx.recv() => PickEvent::Sampler(message),
            };

            if let Some(result) = self.dispatch(event, &mut current_color, wiring).await {
                if state.transition(PickState::Active, PickState::Resolving) {
                    return Ok(result);
                }
            }
        }
    }

    /// Handle one event; returns the pick result for terminal events
    async fn dispatch(
        &mut self,
        event: PickEvent,
        current_color: &mut String,
        wiring: &mut Wiring,
    ) -> Option<Option<String>> {
        match event {
            PickEvent::CancelKey => {
                debug!("Cancel key pressed");
                Some(None)
            }
            PickEvent::Surface(SurfaceEvent::ColorSelected) => Some(Some(current_color.clone())),
            PickEvent::Surface(SurfaceEvent::Cancelled) => Some(None),
            PickEvent::Surface(SurfaceEvent::Closed) => {
                debug!("Surface closed externally");
                Some(None)
            }
            PickEvent::Surface(SurfaceEvent::Ready) => {
                debug!("Surface ready");
                None
            }
            PickEvent::Surface(SurfaceEvent::ZoomDiameter(delta)) => {
                let next = self
                    .grid
                    .with_diameter(next_diameter(self.grid.diameter(), delta));
                self.apply_grid(next).await;
                None
            }
            PickEvent::Surface(SurfaceEvent::ZoomDensity(delta)) => {
                let next = self
                    .grid
                    .with_cell_size(adjust_cell_size(self.grid.cell_size(), delta));
                self.apply_grid(next).await;
                None
            }
            PickEvent::Sampler(SamplerMessage::Sample(frame)) => {
                current_color.clone_from(&frame.center.hex);
                self.publish(frame, wiring);
                None
            }
            PickEvent::Sampler(SamplerMessage::Error(frame)) => {
                // Capture failures are often transient; keep picking
                warn!(error = %frame.error, "Sampler error during pick");
                None
            }
        }
    }

    async fn apply_grid(&mut self, next: GridConfig) {
        let previous = self.grid.grid_size();
        self.grid = next;
        if next.grid_size() != previous {
            debug!(
                diameter = next.diameter(),
                cell_size = next.cell_size(),
                grid_size = next.grid_size(),
                "Grid resized"
            );
            self.sampler.update_grid_size(next.grid_size()).await;
        }
    }

    fn publish(&self, frame: SampleFrame, wiring: &mut Wiring) {
        let Some(surface) = wiring.surface.as_mut() else {
            return;
        };
        if surface.is_destroyed() {
            return;
        }

        let color_name = (self.namer)(Rgb::from(&frame.center));
        let (display_x, display_y) = surface.origin();

        surface.update_position(PositionUpdate {
            x: frame.cursor.x,
            y: frame.cursor.y,
            display_x,
            display_y,
        });
        surface.update_pixel_grid(PixelGridUpdate {
            center_color: frame.center,
            color_name,
            pixels: frame.grid,
            diameter: self.grid.diameter(),
            grid_size: self.grid.grid_size(),
            cell_size: self.grid.actual_cell_size(),
        });
    }

    fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig::new(self.grid.grid_size(), self.sample_rate)
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Registrations and surface created for the current pick
#[derive(Default)]
struct Wiring {
    registrations: Vec<Registration>,
    surface: Option<Box<dyn Surface>>,
}

impl Wiring {
    fn add(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }

    /// Release everything; safe to call repeatedly or with nothing created
    fn release(&mut self) {
        for registration in self.registrations.drain(..) {
            registration.release();
        }
        if let Some(mut surface) = self.surface.take() {
            if !surface.is_destroyed() {
                surface.close();
            }
        }
    }
}

impl Drop for Wiring {
    fn drop(&mut self) {
        self.release();
    }
}
