//! Capture side of the pipeline: one native line, read in fixed frames,
//! resampled when the hardware insists on its own rate, Opus-encoded.
//!
//! Every failure on this path degrades to "no frame this call". The line is
//! rebuilt wholesale (device re-selection included) and the caller simply
//! polls again on its own cadence; there is no internal retry loop.

use std::sync::atomic::{AtomicBool, Ordering};

use alsa::pcm::PCM;

use crate::audio::alsa_device::{self, LineState};
use crate::audio::device;
use crate::audio::frame::EncodedFrame;
use crate::audio::opus_codec::OpusEncoder;
use crate::audio::resample::Resampler;
use crate::config::AudioConfig;
use crate::error::AudioResult;

pub(crate) struct CaptureStream {
    config: AudioConfig,
    /// ALSA name of the line currently open.
    device: String,
    pcm: Option<PCM>,
    state: LineState,
    native_rate: u32,
    resampler: Resampler,
    encoder: OpusEncoder,
    /// One native-rate frame, reused across reads.
    read_buf: Vec<i16>,
    /// Scratch for discarding stale backlog.
    drain_buf: Vec<i16>,
}

/// How many native frames to discard given the current hardware backlog.
/// Above `threshold` frames' worth of backlog, drain down to `target`
/// frames' worth: a one-time loss of stale audio buys lower latency on
/// every frame after it.
fn backlog_discard(avail: usize, frame: usize, threshold: f64, target: f64) -> usize {
    let limit = (frame as f64 * threshold) as usize;
    if avail > limit {
        avail.saturating_sub((frame as f64 * target) as usize)
    } else {
        0
    }
}

impl CaptureStream {
    pub fn new(config: &AudioConfig) -> AudioResult<Self> {
        let encoder = OpusEncoder::new(config)?;
        let mut stream = Self {
            config: config.clone(),
            device: String::new(),
            pcm: None,
            state: LineState::Closed,
            native_rate: config.input_sample_rate,
            resampler: Resampler::new(
                config.input_sample_rate,
                config.input_sample_rate,
                config.frame_duration_ms,
            ),
            encoder,
            read_buf: Vec::new(),
            drain_buf: Vec::new(),
        };
        stream.open()?;
        Ok(stream)
    }

    /// Select a device and open the line at whatever rate it grants. The
    /// resampler (and its pending-sample buffer) is rebuilt here and only
    /// here.
    fn open(&mut self) -> AudioResult<()> {
        let descriptor = device::select_input_device(
            &self.config.capture_device_priority,
            self.config.input_sample_rate,
        )?;
        let (pcm, params) = alsa_device::open_capture(
            &descriptor.name,
            self.config.input_sample_rate,
            self.config.channels,
            self.config.input_frame_size(),
        )?;

        self.native_rate = params.sample_rate;
        self.resampler = Resampler::new(
            self.native_rate,
            self.config.input_sample_rate,
            self.config.frame_duration_ms,
        );
        if !self.resampler.is_identity() {
            log::info!(
                "capture runs at {} Hz, resampling to {} Hz (ratio {:.4})",
                self.native_rate,
                self.config.input_sample_rate,
                self.resampler.ratio(),
            );
        }

        let needed = self.resampler.needed();
        self.read_buf = vec![0i16; needed];
        self.drain_buf = vec![0i16; needed];
        self.device = descriptor.name;
        self.pcm = Some(pcm);
        self.state = LineState::Active;
        Ok(())
    }

    /// Tear down and rebuild the line. Refused while the pipeline is
    /// closing, so a stream being shut down degrades to "no frame" instead
    /// of racing the teardown.
    fn reinitialize(&mut self, closing: &AtomicBool) -> bool {
        if closing.load(Ordering::SeqCst) {
            log::debug!("pipeline closing, capture reinitialization refused");
            return false;
        }
        if let Some(pcm) = self.pcm.take() {
            let _ = pcm.drop();
        }
        self.state = LineState::Error;
        match self.open() {
            Ok(()) => {
                log::info!("capture line reinitialized on \"{}\"", self.device);
                true
            }
            Err(e) => {
                log::error!("capture line reinitialization failed: {e}");
                false
            }
        }
    }

    /// Read, resample and encode one frame. `None` means "nothing this
    /// call": paused lines are handled by the controller, everything else
    /// (unhealthy line, short read, resampler still accumulating, encode
    /// failure) lands here.
    pub fn read_frame(&mut self, closing: &AtomicBool) -> Option<EncodedFrame> {
        if (self.state != LineState::Active || self.pcm.is_none())
            && !self.reinitialize(closing)
        {
            return None;
        }

        if let Err(e) = self.start_line() {
            log::warn!("capture line not startable: {e}");
            self.state = LineState::Error;
            self.reinitialize(closing);
            return None;
        }

        match self.read_native() {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("capture returned a short read, reinitializing");
                self.state = LineState::Error;
                self.reinitialize(closing);
                return None;
            }
            Err(e) => {
                log::warn!("capture read failed: {e}, reinitializing");
                self.state = LineState::Error;
                self.reinitialize(closing);
                return None;
            }
        }

        // Not enough buffered input yet is a normal outcome, not an error.
        let frame = self.resampler.push(&self.read_buf)?;
        match self.encoder.encode(&frame) {
            Ok(packet) => Some(packet),
            Err(e) => {
                log::error!("opus encode failed: {e}");
                None
            }
        }
    }

    fn start_line(&self) -> alsa::Result<()> {
        match self.pcm.as_ref() {
            Some(pcm) => alsa_device::ensure_running(pcm),
            None => Err(alsa::Error::unsupported("capture line not open")),
        }
    }

    /// Fill `read_buf` with exactly one native frame. `Ok(false)` flags a
    /// short read, which is treated as corruption by the caller.
    fn read_native(&mut self) -> alsa::Result<bool> {
        let Some(pcm) = self.pcm.as_ref() else { return Ok(false) };
        let needed = self.read_buf.len();
        let io = pcm.io_i16()?;

        let avail = pcm.avail()?.max(0) as usize;
        let mut discard = backlog_discard(
            avail,
            needed,
            self.config.backlog_drain_threshold,
            self.config.backlog_drain_target,
        );
        if discard > 0 {
            log::debug!("capture backlog of {avail} frames, discarding {discard} stale frames");
            while discard > 0 {
                let chunk = discard.min(self.drain_buf.len());
                let read = io.readi(&mut self.drain_buf[..chunk])?;
                if read == 0 {
                    break;
                }
                discard -= read;
            }
        }

        let read = io.readi(&mut self.read_buf)?;
        Ok(read == needed)
    }

    /// Stop and release the line; best-effort, used during teardown.
    pub fn close(mut self) {
        if let Some(pcm) = self.pcm.take() {
            if let Err(e) = pcm.drop() {
                log::warn!("failed to stop capture line: {e}");
            }
        }
        self.state = LineState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_below_threshold_is_left_alone() {
        assert_eq!(backlog_discard(0, 320, 2.0, 1.5), 0);
        assert_eq!(backlog_discard(320, 320, 2.0, 1.5), 0);
        // exactly at the threshold does not trigger a drain
        assert_eq!(backlog_discard(640, 320, 2.0, 1.5), 0);
    }

    #[test]
    fn backlog_above_threshold_drains_to_target() {
        // 641 frames pending against a 320-frame read: drain down to 480
        assert_eq!(backlog_discard(641, 320, 2.0, 1.5), 161);
        assert_eq!(backlog_discard(3200, 320, 2.0, 1.5), 3200 - 480);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        assert_eq!(backlog_discard(1000, 100, 4.0, 3.0), 700);
        assert_eq!(backlog_discard(399, 100, 4.0, 3.0), 0);
    }
}
