//! Error types for the sampler and the picking session

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while supervising the sampler process
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("failed to spawn sampler {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sampler {0} stream unavailable")]
    StreamUnavailable(&'static str),

    #[error("sampler reported: {0}")]
    Sampler(String),

    #[error("timed out after {0:?} waiting for the first sample")]
    StartupTimeout(Duration),

    #[error("sampler output closed before the first sample")]
    Closed,

    #[error("sampler I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reasons a pick ends without a color
#[derive(Debug, thiserror::Error)]
pub enum PickError {
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("failed to open picker surface: {0:#}")]
    Surface(anyhow::Error),

    #[error("failed to register cancel key: {0:#}")]
    CancelKey(anyhow::Error),
}

pub type SamplerResult<T> = Result<T, SamplerError>;
