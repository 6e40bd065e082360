//! Playback side of the pipeline: compressed frames come off the shared
//! queue, decode to PCM, and go out the native line.
//!
//! One call handles a bounded number of frames so a deep backlog cannot
//! stall the caller. Frames that fail to decode are dropped individually;
//! the batch keeps going. A dead line ends the batch and is rebuilt, with
//! the remaining backlog picked up on the next call.

use std::sync::atomic::{AtomicBool, Ordering};

use alsa::pcm::{PCM, State};

use crate::audio::alsa_device::{self, LineState};
use crate::audio::opus_codec::OpusDecoder;
use crate::audio::queue::PlaybackQueue;
use crate::config::AudioConfig;
use crate::error::AudioResult;

/// In-place xrun recoveries attempted before a write is declared dead.
const WRITE_RECOVERY_RETRIES: u32 = 3;

enum WriteOutcome {
    Written,
    /// Line exists but is not accepting audio; the frame is dropped.
    Inactive,
    /// Line is gone; reinitialization required.
    LineClosed(String),
}

pub(crate) struct PlaybackStream {
    config: AudioConfig,
    pcm: Option<PCM>,
    state: LineState,
    decoder: OpusDecoder,
}

impl PlaybackStream {
    pub fn new(config: &AudioConfig) -> AudioResult<Self> {
        let decoder = OpusDecoder::new(config.output_sample_rate)?;
        let mut stream = Self {
            config: config.clone(),
            pcm: None,
            state: LineState::Closed,
            decoder,
        };
        stream.open()?;
        Ok(stream)
    }

    fn open(&mut self) -> AudioResult<()> {
        let (pcm, params) = alsa_device::open_playback(
            &self.config.playback_device,
            self.config.output_sample_rate,
            self.config.channels,
            self.config.output_frame_size(),
        )?;
        if params.sample_rate != self.config.output_sample_rate {
            log::warn!(
                "playback device granted {} Hz instead of {} Hz; audio will play off-pitch",
                params.sample_rate,
                self.config.output_sample_rate,
            );
        }
        self.pcm = Some(pcm);
        self.state = LineState::Active;
        Ok(())
    }

    fn reinitialize(&mut self, closing: &AtomicBool) -> bool {
        if closing.load(Ordering::SeqCst) {
            log::debug!("pipeline closing, playback reinitialization refused");
            return false;
        }
        if let Some(pcm) = self.pcm.take() {
            let _ = pcm.drop();
        }
        self.state = LineState::Error;
        match self.open() {
            Ok(()) => {
                log::info!("playback line reinitialized");
                true
            }
            Err(e) => {
                log::error!("playback line reinitialization failed: {e}");
                false
            }
        }
    }

    /// Dequeue, decode and play up to `max_frames` frames. Returns how many
    /// frames were consumed from the queue, played or not.
    pub fn play_batch(
        &mut self,
        queue: &PlaybackQueue,
        max_frames: usize,
        closing: &AtomicBool,
    ) -> usize {
        let mut processed = 0;
        while processed < max_frames {
            let Some(packet) = queue.try_dequeue() else { break };
            processed += 1;

            let samples = match self.decoder.decode(&packet) {
                Ok(samples) => samples,
                Err(e) => {
                    log::warn!("dropping undecodable frame: {e}");
                    continue;
                }
            };

            match self.write_samples(&samples) {
                WriteOutcome::Written => {}
                WriteOutcome::Inactive => {
                    log::warn!("playback line inactive, dropping frame");
                }
                WriteOutcome::LineClosed(reason) => {
                    log::warn!("playback write failed ({reason}), reinitializing output line");
                    self.state = LineState::Error;
                    self.reinitialize(closing);
                    break;
                }
            }
        }
        processed
    }

    fn write_samples(&mut self, samples: &[i16]) -> WriteOutcome {
        if self.state != LineState::Active {
            return WriteOutcome::Inactive;
        }
        let Some(pcm) = self.pcm.as_ref() else {
            return WriteOutcome::Inactive;
        };

        match pcm.state() {
            State::Disconnected => return WriteOutcome::LineClosed("line disconnected".into()),
            State::Open | State::Draining | State::Paused => return WriteOutcome::Inactive,
            _ => {}
        }

        let io = match pcm.io_i16() {
            Ok(io) => io,
            Err(e) => return WriteOutcome::LineClosed(e.to_string()),
        };

        let mut written = 0;
        let mut retries = 0u32;
        while written < samples.len() {
            match io.writei(&samples[written..]) {
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(e) => {
                    let reason = e.to_string();
                    retries += 1;
                    if retries > WRITE_RECOVERY_RETRIES || pcm.try_recover(e, true).is_err() {
                        return WriteOutcome::LineClosed(reason);
                    }
                    log::warn!("playback xrun, recovered in place ({reason})");
                }
            }
        }
        WriteOutcome::Written
    }

    /// Stop and release the line; best-effort, used during teardown.
    pub fn close(mut self) {
        if let Some(pcm) = self.pcm.take() {
            if let Err(e) = pcm.drop() {
                log::warn!("failed to stop playback line: {e}");
            }
        }
        self.state = LineState::Closed;
    }
}
