//! Pipeline configuration.
//!
//! One plain struct consumed at construction time. The pipeline owns no
//! global state; callers build an [`AudioConfig`], hand it to
//! `AudioPipeline::new`, and keep the handle.

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};

/// Audio pipeline configuration.
///
/// Defaults match the upstream xiaozhi transport: 16 kHz mono 20 ms Opus
/// frames uplink, 24 kHz downlink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target capture/encode sample rate in Hz. Capture devices that cannot
    /// run at this rate are resampled to it.
    pub input_sample_rate: u32,
    /// Playback/decode sample rate in Hz.
    pub output_sample_rate: u32,
    /// Channel count. The Opus wrappers are mono only; must be 1.
    pub channels: u32,
    /// Frame duration in ms. 20 is the common case; some deployments run
    /// 60 ms frames to cut packet rate. Must be a legal Opus duration.
    pub frame_duration_ms: u32,
    /// Opus application profile: "audio", "voip" or "lowdelay".
    pub opus_application: String,
    /// Opus encoder bitrate in bits/s.
    pub opus_bitrate: i32,
    /// Upper bound on buffered playback, in ms of audio. The frame queue
    /// holds at most `queue_target_ms / frame_duration_ms` frames.
    pub queue_target_ms: u32,
    /// Frames consumed per `drain_playback` call in the demo driver.
    pub playback_batch_frames: usize,
    /// Capture backlog (in units of one native frame) above which stale
    /// samples are discarded before reading. Empirically tuned.
    pub backlog_drain_threshold: f64,
    /// Backlog level (same units) the drain reduces to. Empirically tuned.
    pub backlog_drain_target: f64,
    /// Ordered capture-device name substrings, highest priority first.
    /// Matched against ALSA PCM hint names and descriptions; the ALSA
    /// "default" PCM is used when nothing matches.
    pub capture_device_priority: Vec<String>,
    /// ALSA playback device name.
    pub playback_device: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            channels: 1,
            frame_duration_ms: 20,
            opus_application: "audio".to_string(),
            opus_bitrate: 32000,
            queue_target_ms: 10_000,
            playback_batch_frames: 5,
            backlog_drain_threshold: 2.0,
            backlog_drain_target: 1.5,
            capture_device_priority: vec!["XFM-DP-V0.0.18".to_string()],
            playback_device: "default".to_string(),
        }
    }
}

/// Opus only accepts a fixed set of frame durations; the fractional ones
/// (2.5 and 5 ms) are excluded because the field is integer milliseconds.
const LEGAL_FRAME_DURATIONS_MS: [u32; 4] = [10, 20, 40, 60];

impl AudioConfig {
    /// Samples per encoded frame at the input rate.
    pub fn input_frame_size(&self) -> usize {
        (self.input_sample_rate * self.frame_duration_ms / 1000) as usize
    }

    /// Samples per decoded frame at the output rate.
    pub fn output_frame_size(&self) -> usize {
        (self.output_sample_rate * self.frame_duration_ms / 1000) as usize
    }

    /// Playback queue capacity in frames.
    pub fn queue_capacity(&self) -> usize {
        self.queue_target_ms.div_ceil(self.frame_duration_ms) as usize
    }

    pub fn validate(&self) -> AudioResult<()> {
        if self.channels != 1 {
            return Err(AudioError::InvalidConfig(format!(
                "unsupported channel count {} (pipeline is mono)",
                self.channels
            )));
        }
        if !LEGAL_FRAME_DURATIONS_MS.contains(&self.frame_duration_ms) {
            return Err(AudioError::InvalidConfig(format!(
                "frame duration {} ms is not a legal Opus frame duration",
                self.frame_duration_ms
            )));
        }
        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(AudioError::InvalidConfig("sample rates must be non-zero".into()));
        }
        if self.queue_target_ms == 0 {
            return Err(AudioError::InvalidConfig("queue_target_ms must be non-zero".into()));
        }
        if self.backlog_drain_target >= self.backlog_drain_threshold {
            return Err(AudioError::InvalidConfig(format!(
                "backlog drain target {} must be below threshold {}",
                self.backlog_drain_target, self.backlog_drain_threshold
            )));
        }
        if !(500..=512_000).contains(&self.opus_bitrate) {
            return Err(AudioError::InvalidConfig(format!(
                "opus bitrate {} outside 500..=512000",
                self.opus_bitrate
            )));
        }
        Ok(())
    }
}
