//! audio - capture, playback and codec pipeline
//!
//! Data flow: mic → capture line → resampler (when the device's rate
//! differs from the encode rate) → Opus encoder → caller. Caller → playback
//! queue → Opus decoder → playback line → speaker. The controller in
//! [`pipeline`] owns both lines and is the only public entry point for
//! driving them.

mod alsa_device;
mod capture;
pub mod device;
mod frame;
mod opus_codec;
mod pipeline;
mod playback;
mod queue;
mod resample;

pub use device::{DeviceDescriptor, enumerate_devices};
pub use frame::{EncodedFrame, PcmFrame};
pub use pipeline::AudioPipeline;
pub use queue::{PlaybackQueue, QueueStatus};
pub use resample::Resampler;
