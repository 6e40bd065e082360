//! Error taxonomy for the audio pipeline.
//!
//! Only construction-time failures reach callers as errors. Once the
//! pipeline is running, every failure (device unplugged, short read, corrupt
//! packet) is logged, mapped to "no frame this call" or "frame dropped", and
//! recovered by stream reinitialization. Real-time streaming favors staying
//! alive over perfect delivery.

use thiserror::Error;

pub type AudioResult<T> = Result<T, AudioError>;

#[derive(Debug, Error)]
pub enum AudioError {
    /// No input-capable audio device exists on the host. Fatal at
    /// construction; there is nothing to fall back to.
    #[error("no usable audio capture device found")]
    DeviceEnumeration,

    /// A native audio line failed to open. Fatal at construction,
    /// recoverable later through reinitialization.
    #[error("failed to open {direction} device \"{device}\": {source}")]
    StreamOpen {
        direction: &'static str,
        device: String,
        #[source]
        source: alsa::Error,
    },

    /// A PCM frame's sample count disagrees with its rate and duration tag.
    #[error("invalid frame length {actual} for {sample_rate} Hz / {duration_ms} ms (expected {expected})")]
    InvalidFrame {
        actual: usize,
        expected: usize,
        sample_rate: u32,
        duration_ms: u32,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("ALSA error: {0}")]
    Alsa(#[from] alsa::Error),

    #[error("Opus codec error: {0}")]
    Opus(#[from] opus::Error),
}
