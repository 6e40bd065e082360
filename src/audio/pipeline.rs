//! The pipeline controller: owns both native lines and the codec instances,
//! coordinates pause/resume, and tears everything down in a fixed order.
//!
//! All methods take `&self`; callers keep one explicitly constructed
//! instance (typically in an `Arc`) and drive it from their own execution
//! contexts. The pipeline spawns no threads of its own. Three contexts are
//! expected: one polling [`AudioPipeline::read`], one polling
//! [`AudioPipeline::drain_playback`], and one delivering received frames
//! through [`AudioPipeline::write`].
//!
//! Lock discipline, per field: the capture line and the playback line each
//! sit behind their own mutex (hardware I/O and reinitialization of one
//! handle exclude each other; the two lines never contend); the queue has
//! its own lock; pause and closing are atomics so flipping them never waits
//! on a blocking hardware call.

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::audio::capture::CaptureStream;
use crate::audio::frame::EncodedFrame;
use crate::audio::playback::PlaybackStream;
use crate::audio::queue::{PlaybackQueue, QueueStatus};
use crate::config::AudioConfig;
use crate::error::AudioResult;

/// Interval between queue polls in [`AudioPipeline::await_playback_drained`].
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct AudioPipeline {
    config: AudioConfig,
    capture: Mutex<Option<CaptureStream>>,
    playback: Mutex<Option<PlaybackStream>>,
    queue: PlaybackQueue,
    input_paused: AtomicBool,
    closing: AtomicBool,
}

impl AudioPipeline {
    /// Build the whole pipeline. Any native resource that fails to open
    /// fails construction; there is no partially usable pipeline.
    pub fn new(config: AudioConfig) -> AudioResult<Self> {
        config.validate()?;
        let capture = CaptureStream::new(&config)?;
        let playback = PlaybackStream::new(&config)?;
        let queue = PlaybackQueue::with_capacity(config.queue_capacity());

        log::info!(
            "audio pipeline ready: encode {} Hz / decode {} Hz, {} ms frames, queue of {} frames",
            config.input_sample_rate,
            config.output_sample_rate,
            config.frame_duration_ms,
            queue.capacity(),
        );

        Ok(Self {
            config,
            capture: Mutex::new(Some(capture)),
            playback: Mutex::new(Some(playback)),
            queue,
            input_paused: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        })
    }

    fn lock_capture(&self) -> MutexGuard<'_, Option<CaptureStream>> {
        self.capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_playback(&self) -> MutexGuard<'_, Option<PlaybackStream>> {
        self.playback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Capture, resample and encode one frame. `None` is the ordinary "try
    /// again later" answer: input paused, pipeline closing, line mid
    /// recovery, or the resampler still accumulating. Never an error.
    pub fn read(&self) -> Option<EncodedFrame> {
        // Checked before the stream lock: pausing must not touch hardware.
        if self.is_input_paused() || self.closing.load(Ordering::SeqCst) {
            return None;
        }
        let mut guard = self.lock_capture();
        let stream = guard.as_mut()?;
        stream.read_frame(&self.closing)
    }

    /// Queue one received frame for playback. Always succeeds from the
    /// caller's point of view; overflow evicts the oldest queued frame.
    pub fn write(&self, frame: EncodedFrame) {
        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        self.queue.enqueue(frame);
    }

    /// Advance playback by at most `max_frames` frames; intended to be
    /// polled frequently. Returns the number of frames consumed.
    pub fn drain_playback(&self, max_frames: usize) -> usize {
        if max_frames == 0 || self.closing.load(Ordering::SeqCst) {
            return 0;
        }
        let mut guard = self.lock_playback();
        let Some(stream) = guard.as_mut() else { return 0 };
        stream.play_batch(&self.queue, max_frames, &self.closing)
    }

    pub fn pause_input(&self) {
        self.input_paused.store(true, Ordering::SeqCst);
        log::info!("audio input paused");
    }

    pub fn resume_input(&self) {
        self.input_paused.store(false, Ordering::SeqCst);
        log::info!("audio input resumed");
    }

    pub fn is_input_paused(&self) -> bool {
        self.input_paused.load(Ordering::SeqCst)
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Drop everything queued for playback, e.g. when the user barges in
    /// over the assistant's answer. Returns the number of dropped frames.
    pub fn clear_playback(&self) -> usize {
        let cleared = self.queue.clear();
        if cleared > 0 {
            log::info!("cleared playback queue, dropped {cleared} frames");
        }
        cleared
    }

    /// Poll until the playback queue is empty or the timeout elapses.
    /// Returns true when drained. Callers use this to know when starting a
    /// new capture turn is safe.
    pub fn await_playback_drained(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.queue.is_empty() && start.elapsed() < timeout {
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }
        let remaining = self.queue.len();
        if remaining > 0 {
            log::warn!("playback not drained within {timeout:?}, {remaining} frames remaining");
            return false;
        }
        true
    }

    /// Full teardown, idempotent: the second and later calls are no-ops.
    /// Order: playback queue, capture line (with its encoder), playback
    /// line (with its decoder). Every step is best-effort; a failure is
    /// logged and the remaining steps still run. Safe to call while another
    /// context is inside `read`/`drain_playback`: the closing flag stops
    /// any further reinitialization, so the in-flight call returns empty.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("closing audio pipeline");

        let cleared = self.queue.clear();
        if cleared > 0 {
            log::info!("discarded {cleared} queued playback frames");
        }

        if let Some(stream) = self.lock_capture().take() {
            stream.close();
        }
        if let Some(stream) = self.lock_playback().take() {
            stream.close();
        }

        log::info!("audio pipeline closed");
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}

impl Drop for AudioPipeline {
    /// Backstop only; callers are expected to invoke [`close`] explicitly
    /// so hardware release happens at a deterministic point.
    ///
    /// [`close`]: AudioPipeline::close
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Construction needs real capture and playback devices. Hosts without
    // them (CI containers) skip the body instead of failing.
    fn open_pipeline() -> Option<AudioPipeline> {
        match AudioPipeline::new(AudioConfig::default()) {
            Ok(pipeline) => Some(pipeline),
            Err(e) => {
                eprintln!("skipping hardware-backed test: {e}");
                None
            }
        }
    }

    #[test]
    fn close_twice_is_a_noop() {
        let Some(pipeline) = open_pipeline() else { return };
        pipeline.close();
        pipeline.close();
        // post-close calls degrade to empty results, not panics
        assert!(pipeline.read().is_none());
        assert_eq!(pipeline.drain_playback(5), 0);
    }

    #[test]
    fn read_while_paused_never_produces() {
        let Some(pipeline) = open_pipeline() else { return };
        pipeline.pause_input();
        assert!(pipeline.is_input_paused());
        for _ in 0..3 {
            assert!(pipeline.read().is_none());
        }
        pipeline.resume_input();
        assert!(!pipeline.is_input_paused());
        pipeline.close();
    }

    #[test]
    fn written_frames_show_up_in_queue_status() {
        let Some(pipeline) = open_pipeline() else { return };
        assert!(pipeline.queue_status().is_empty);
        pipeline.write(EncodedFrame::from(vec![0x03u8, 0x00]));
        let status = pipeline.queue_status();
        assert_eq!(status.current_size, 1);
        assert_eq!(status.max_size, AudioConfig::default().queue_capacity());
        assert_eq!(pipeline.clear_playback(), 1);
        pipeline.close();
    }

    #[test]
    fn drained_wait_returns_immediately_when_empty() {
        let Some(pipeline) = open_pipeline() else { return };
        let start = Instant::now();
        assert!(pipeline.await_playback_drained(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        pipeline.close();
    }
}
