//! Terminal implementations of the picker collaborators
//!
//! Used by the `hue-hunter pick` command. The "surface" prints a live swatch
//! to stderr and reads single-letter commands from stdin:
//!
//! | input | event |
//! |-------|-------|
//! | `s` or empty line | select |
//! | `q` | cancel |
//! | `+` / `-` | grow / shrink the diameter |
//! | `]` / `[` | larger / smaller cells |

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::surface::{
    CancelKey, PixelGridUpdate, PositionUpdate, Registration, Surface, SurfaceEvent,
    SurfaceFactory,
};

/// Map one line of console input to a surface event
pub fn parse_command(line: &str) -> Option<SurfaceEvent> {
    match line.trim() {
        "" | "s" => Some(SurfaceEvent::ColorSelected),
        "q" => Some(SurfaceEvent::Cancelled),
        "+" => Some(SurfaceEvent::ZoomDiameter(1.0)),
        "-" => Some(SurfaceEvent::ZoomDiameter(-1.0)),
        "]" => Some(SurfaceEvent::ZoomDensity(1.0)),
        "[" => Some(SurfaceEvent::ZoomDensity(-1.0)),
        _ => None,
    }
}

// ============================================================================
// Surface
// ============================================================================

type InputLines = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    senders: Vec<(u64, mpsc::UnboundedSender<SurfaceEvent>)>,
}

impl Listeners {
    fn broadcast(&mut self, event: SurfaceEvent) {
        self.senders.retain(|(_, tx)| tx.send(event).is_ok());
    }
}

type SharedListeners = Arc<Mutex<Listeners>>;

fn lock(listeners: &SharedListeners) -> std::sync::MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens [`ConsoleSurface`]s that share one stdin reader
pub struct ConsoleSurfaceFactory {
    lines: InputLines,
}

impl ConsoleSurfaceFactory {
    /// Start reading stdin on a dedicated thread.
    ///
    /// A plain thread keeps the blocking read from holding up runtime
    /// shutdown.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            lines: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

impl Default for ConsoleSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurfaceFactory for ConsoleSurfaceFactory {
    async fn open(&mut self) -> anyhow::Result<Box<dyn Surface>> {
        let listeners: SharedListeners = Arc::default();

        let lines = self.lines.clone();
        let forward_to = listeners.clone();
        let input = tokio::spawn(async move {
            loop {
                let line = lines.lock().await.recv().await;
                let Some(line) = line else {
                    lock(&forward_to).broadcast(SurfaceEvent::Closed);
                    break;
                };
                match parse_command(&line) {
                    Some(event) => lock(&forward_to).broadcast(event),
                    None => debug!(input = %line, "Ignoring unknown console command"),
                }
            }
        });

        Ok(Box::new(ConsoleSurface {
            listeners,
            input: Some(input),
        }))
    }
}

/// Terminal stand-in for the magnifier window
pub struct ConsoleSurface {
    listeners: SharedListeners,
    input: Option<JoinHandle<()>>,
}

impl Surface for ConsoleSurface {
    fn show(&mut self) {
        eprintln!("Picking: [s]elect, [q]uit, +/- diameter, ]/[ density");
        lock(&self.listeners).broadcast(SurfaceEvent::Ready);
    }

    fn origin(&self) -> (i32, i32) {
        (0, 0)
    }

    fn update_position(&mut self, _update: PositionUpdate) {}

    fn update_pixel_grid(&mut self, update: PixelGridUpdate) {
        let c = &update.center_color;
        eprint!(
            "\r\x1b[48;2;{};{};{}m      \x1b[0m {} {:<24} grid {}x{} ",
            c.r, c.g, c.b, c.hex, update.color_name, update.grid_size, update.grid_size
        );
        let _ = std::io::stderr().flush();
    }

    fn subscribe(&mut self, tx: mpsc::UnboundedSender<SurfaceEvent>) -> Registration {
        let id = {
            let mut listeners = lock(&self.listeners);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.senders.push((id, tx));
            id
        };

        let listeners = self.listeners.clone();
        Registration::new("console-surface", move || {
            lock(&listeners).senders.retain(|(other, _)| *other != id);
        })
    }

    fn is_destroyed(&self) -> bool {
        self.input.is_none()
    }

    fn close(&mut self) {
        if let Some(input) = self.input.take() {
            input.abort();
            lock(&self.listeners).senders.clear();
            eprintln!();
        }
    }
}

impl Drop for ConsoleSurface {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Cancel key
// ============================================================================

/// Ctrl-C as the system-wide cancel key.
///
/// The first registration installs tokio's SIGINT handler for the rest of the
/// process. Releasing the registration stops forwarding presses but does not
/// restore the default action, so Ctrl-C no longer terminates the process
/// after a pick. `hue-hunter pick` exits as soon as the pick resolves.
#[derive(Debug, Default)]
pub struct CtrlCCancelKey;

impl CancelKey for CtrlCCancelKey {
    fn register(&mut self, tx: mpsc::UnboundedSender<()>) -> anyhow::Result<Registration> {
        let listener = tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    break;
                }
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        Ok(Registration::new("ctrl-c", move || listener.abort()))
    }
}
