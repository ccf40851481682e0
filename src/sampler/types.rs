//! Wire types for the sampler protocol
//!
//! Both directions are newline-delimited JSON, one object per line.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use tokio::sync::mpsc;

/// Default sampler binary name, resolved next to the current executable or on PATH
pub const SAMPLER_BINARY_NAME: &str = "hue-hunter-sampler";

/// Channel the manager delivers parsed sampler output to
pub type EventSink = mpsc::UnboundedSender<SamplerMessage>;

// ============================================================================
// Commands (to sampler)
// ============================================================================

/// Control command written to the sampler's stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    Start { grid_size: u32, sample_rate: u32 },
    UpdateGrid { grid_size: u32 },
    Stop,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::UpdateGrid { .. } => "update_grid",
            Self::Stop => "stop",
        }
    }

    /// Serialize as a single protocol line, trailing newline included
    pub fn to_line(&self) -> serde_json::Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}

// ============================================================================
// Frames (from sampler)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: i32,
    pub y: i32,
}

/// One sampled pixel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hex: String,
}

/// Pixel data around the cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleFrame {
    pub cursor: CursorPosition,
    pub center: PixelColor,
    pub grid: Vec<Vec<PixelColor>>,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

/// Failure reported by the sampler itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

impl ErrorFrame {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// A parsed line of sampler output.
///
/// Objects carrying an `error` key decode as [`SamplerMessage::Error`]
/// whatever the value's type; a non-string value is kept as its JSON text.
/// Everything else must be a full [`SampleFrame`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SamplerMessage {
    Error(ErrorFrame),
    Sample(SampleFrame),
}

impl<'de> Deserialize<'de> for SamplerMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;

        if let Some(error) = value.as_object_mut().and_then(|obj| obj.remove("error")) {
            let error = match error {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return Ok(Self::Error(ErrorFrame { error }));
        }

        SampleFrame::deserialize(value)
            .map(Self::Sample)
            .map_err(de::Error::custom)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Parameters sent with the `start` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub grid_size: u32,
    pub sample_rate: u32,
}

impl SamplerConfig {
    pub fn new(grid_size: u32, sample_rate: u32) -> Self {
        Self {
            grid_size,
            sample_rate,
        }
    }

    pub fn start_command(&self) -> ControlCommand {
        ControlCommand::Start {
            grid_size: self.grid_size,
            sample_rate: self.sample_rate,
        }
    }
}

/// How to launch the sampler process
#[derive(Debug, Clone, Default)]
pub struct SamplerSettings {
    /// Explicit binary path; resolved automatically when `None`
    pub binary: Option<PathBuf>,
    /// Extra arguments passed to the binary
    pub args: Vec<String>,
}

impl SamplerSettings {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Path of the sampler binary to spawn.
    ///
    /// An explicit path wins. Otherwise the binary shipped next to the
    /// current executable is used if present, falling back to a PATH lookup.
    pub fn resolve_binary(&self) -> PathBuf {
        if let Some(ref binary) = self.binary {
            return binary.clone();
        }

        let file_name = format!("{}{}", SAMPLER_BINARY_NAME, std::env::consts::EXE_SUFFIX);
        let bundled = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)));

        match bundled {
            Some(path) if path.exists() => path,
            _ => PathBuf::from(file_name),
        }
    }
}
