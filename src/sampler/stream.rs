//! Line framing for sampler output
//!
//! Stdout arrives in arbitrary chunks; complete lines are decoded into
//! [`SamplerMessage`]s and forwarded to whichever sink is installed.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use super::types::{EventSink, SamplerMessage};

/// Sink slot shared between the manager and its reader task
pub(crate) type SharedSink = Arc<RwLock<Option<EventSink>>>;

const READ_CHUNK_SIZE: usize = 8 * 1024;

// ============================================================================
// Line Decoder
// ============================================================================

/// Newline framing with buffering across chunks.
///
/// The trailing fragment of each chunk stays buffered until its newline
/// arrives. Buffer is bounded to prevent unbounded memory growth.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Maximum buffered bytes without a newline (1MB)
    const MAX_BUFFER_SIZE: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Push a chunk of bytes and extract the complete, non-blank lines
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > Self::MAX_BUFFER_SIZE {
            warn!(
                buffered = self.buffer.len(),
                "Sampler line exceeded {}KB without a newline, discarding",
                Self::MAX_BUFFER_SIZE / 1024
            );
            self.buffer.clear();
        }

        lines
    }

    /// Push a string directly (for testing or pre-decoded content)
    pub fn push_str(&mut self, s: &str) -> Vec<String> {
        self.push(s.as_bytes())
    }

    /// Check if a partial line is waiting for more data
    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Decode one complete line of sampler output
pub fn parse_message(line: &str) -> Result<SamplerMessage> {
    serde_json::from_str(line).context("Failed to parse sampler line")
}

/// First 200 chars of a line, for log output
fn preview(line: &str) -> String {
    if line.chars().count() > 200 {
        format!("{}...", line.chars().take(200).collect::<String>())
    } else {
        line.to_string()
    }
}

// ============================================================================
// Reader Tasks
// ============================================================================

/// Read sampler stdout until EOF, delivering each decoded message to the sink.
///
/// The sink is dropped at EOF.
pub(crate) async fn read_frames<R>(mut stdout: R, sink: SharedSink)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to read sampler output");
                break;
            }
        };

        for line in decoder.push(&chunk[..n]) {
            match parse_message(&line) {
                Ok(message) => deliver(&sink, message).await,
                Err(e) => {
                    warn!(line = %preview(&line), error = %e, "Dropping malformed sampler line");
                }
            }
        }
    }

    if decoder.has_remaining() {
        debug!("Sampler output ended mid-line");
    }
    // Closing the sink lets a waiting receiver observe the end of output
    sink.write().await.take();
    debug!("Sampler output closed");
}

/// Log sampler stderr line by line; it is never parsed
pub(crate) async fn log_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            warn!(target: "hue_hunter::sampler::stderr", "{}", line);
        }
    }
}

async fn deliver(sink: &SharedSink, message: SamplerMessage) {
    let guard = sink.read().await;
    match guard.as_ref() {
        Some(tx) => {
            if let SamplerMessage::Error(ref frame) = message {
                warn!(error = %frame.error, "Sampler reported an error");
            }
            if tx.send(message).is_err() {
                trace!("Sampler sink receiver dropped, message discarded");
            }
        }
        None => trace!("No sampler sink installed, message discarded"),
    }
}
