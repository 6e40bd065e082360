//! ALSA/Opus audio pipeline for a xiaozhi voice-assistant client.
//!
//! The crate covers the audio half of the client: it captures microphone
//! audio as fixed-duration mono PCM frames, compresses them with Opus for
//! the uplink, and plays back Opus frames received from the service,
//! surviving flaky audio hardware by rebuilding a failed line instead of
//! surfacing errors.
//!
//! The central type is [`AudioPipeline`]. Build one from an [`AudioConfig`],
//! share it by reference across the caller's execution contexts, and poll:
//!
//! - [`AudioPipeline::read`] on roughly the frame cadence; `None` means "no
//!   frame yet", never a failure.
//! - [`AudioPipeline::write`] with every frame received from the network.
//! - [`AudioPipeline::drain_playback`] frequently, to push queued audio out
//!   the speaker a bounded batch at a time.
//!
//! Call [`AudioPipeline::close`] before exit; teardown is deterministic and
//! idempotent.

pub mod audio;
mod config;
mod error;

pub use audio::{
    AudioPipeline, DeviceDescriptor, EncodedFrame, PcmFrame, PlaybackQueue, QueueStatus,
    Resampler, enumerate_devices,
};
pub use config::AudioConfig;
pub use error::{AudioError, AudioResult};
