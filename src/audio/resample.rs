//! Sample-rate reconciliation between a capture device's native rate and
//! the pipeline's encode rate.
//!
//! The resampler accumulates native-rate samples in a float buffer and, once
//! enough input is pending, converts exactly one frame's worth by Fourier
//! resampling: forward FFT of the input block, spectrum truncation (or
//! zero-padding) to the output length, inverse FFT. The method is
//! band-limited and maps N input samples to exactly M output samples, which
//! keeps the consume/produce arithmetic of the pipeline deterministic.
//!
//! Equal rates degenerate to a bit-exact pass-through with no float
//! round-trip.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio::frame::PcmFrame;

pub struct Resampler {
    native_rate: u32,
    target_rate: u32,
    duration_ms: u32,
    /// Samples per output frame at the target rate.
    target_frame: usize,
    /// Native-rate samples consumed per output frame.
    needed: usize,
    /// target_rate / native_rate.
    ratio: f64,
    /// Pending input, at i16 magnitudes in the float domain. Survives across
    /// calls; discarded only when the capture line is rebuilt.
    buffer: Vec<f32>,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
}

impl Resampler {
    pub fn new(native_rate: u32, target_rate: u32, duration_ms: u32) -> Self {
        let target_frame = PcmFrame::expected_len(target_rate, duration_ms);
        let ratio = target_rate as f64 / native_rate as f64;
        let needed = if native_rate == target_rate {
            target_frame
        } else {
            ((target_frame as f64 / ratio).floor() as usize).max(1)
        };

        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(needed);
        let fft_inverse = planner.plan_fft_inverse(target_frame);

        Self {
            native_rate,
            target_rate,
            duration_ms,
            target_frame,
            needed,
            ratio,
            buffer: Vec::new(),
            fft_forward,
            fft_inverse,
        }
    }

    /// True when native and target rates already agree.
    pub fn is_identity(&self) -> bool {
        self.native_rate == self.target_rate
    }

    /// Native-rate samples required to produce one output frame.
    pub fn needed(&self) -> usize {
        self.needed
    }

    /// Pending input samples carried over from previous calls.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Feed native-rate samples; returns one target-rate frame as soon as
    /// enough input has accumulated, `None` while more input is required.
    /// Input order is preserved: frames come out in arrival order.
    pub fn push(&mut self, samples: &[i16]) -> Option<PcmFrame> {
        if self.is_identity() {
            // Pass-through, bit-exact. Callers read exactly one frame at a
            // time when no conversion is active.
            debug_assert_eq!(samples.len(), self.target_frame);
            return Some(PcmFrame::from_raw(
                samples.to_vec(),
                self.target_rate,
                self.duration_ms,
            ));
        }

        self.buffer.extend(samples.iter().map(|&s| s as f32));
        if self.buffer.len() < self.needed {
            return None;
        }

        let mut block: Vec<Complex<f32>> = self.buffer[..self.needed]
            .iter()
            .map(|&s| Complex::new(s, 0.0))
            .collect();
        self.buffer.drain(..self.needed);

        self.fft_forward.process(&mut block);
        let mut shaped = shape_spectrum(&block, self.target_frame);
        self.fft_inverse.process(&mut shaped);

        let scale = 1.0 / self.needed as f32;
        let samples: Vec<i16> = shaped
            .iter()
            .map(|c| (c.re * scale).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect();

        Some(PcmFrame::from_raw(samples, self.target_rate, self.duration_ms))
    }
}

/// Build an M-point spectrum from an N-point one, keeping the lowest
/// frequencies and preserving Hermitian symmetry so the inverse transform
/// stays real. When the shorter length is even, the shared Nyquist bin is
/// folded (downsampling) or split (upsampling).
fn shape_spectrum(src: &[Complex<f32>], out_len: usize) -> Vec<Complex<f32>> {
    let n = src.len();
    let m = out_len;
    let mut dst = vec![Complex::new(0.0, 0.0); m];

    let k = n.min(m);
    // DC and positive frequencies below Nyquist.
    let pos = k.div_ceil(2);
    dst[..pos].copy_from_slice(&src[..pos]);
    // Negative frequencies, taken from the top of the input spectrum.
    let neg = (k - 1) / 2;
    dst[m - neg..].copy_from_slice(&src[n - neg..]);

    if k % 2 == 0 {
        let nyq = k / 2;
        if m < n {
            // Both input bins at +/- the new Nyquist land on one output bin.
            dst[nyq] = src[nyq] + src[n - nyq];
        } else if m > n {
            dst[nyq] = src[nyq] * 0.5;
            dst[m - nyq] = src[nyq].conj() * 0.5;
        }
        // m == n is the identity spectrum, already fully copied.
    }

    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: u32 = 20;

    #[test]
    fn identity_ratio_is_bit_exact() {
        let mut resampler = Resampler::new(16000, 16000, FRAME_MS);
        assert!(resampler.is_identity());
        assert_eq!(resampler.needed(), 320);

        let input: Vec<i16> = (0..320).map(|i| (i * 37 % 4001 - 2000) as i16).collect();
        let frame = resampler.push(&input).unwrap();
        assert_eq!(frame.samples(), &input[..]);
        assert_eq!(frame.sample_rate(), 16000);
        assert_eq!(resampler.buffered(), 0);
    }

    #[test]
    fn needed_follows_rate_ratio() {
        // 48 kHz native, 16 kHz target: three native samples per output one
        let resampler = Resampler::new(48000, 16000, FRAME_MS);
        assert_eq!(resampler.needed(), 960);

        // native rate double the target
        let resampler = Resampler::new(32000, 16000, FRAME_MS);
        assert_eq!(resampler.needed(), 640);

        // upsampling path
        let resampler = Resampler::new(8000, 16000, FRAME_MS);
        assert_eq!(resampler.needed(), 160);
    }

    #[test]
    fn underrun_then_single_frame_at_exact_boundary() {
        let mut resampler = Resampler::new(48000, 16000, FRAME_MS);
        assert_eq!(resampler.needed(), 960);

        // 959 samples: not enough for a frame, not an error
        assert!(resampler.push(&vec![100i16; 959]).is_none());
        assert_eq!(resampler.buffered(), 959);

        // one more sample completes exactly one 320-sample frame
        let frame = resampler.push(&[100i16]).unwrap();
        assert_eq!(frame.len(), 320);
        assert_eq!(frame.sample_rate(), 16000);
        assert_eq!(resampler.buffered(), 0);
    }

    #[test]
    fn half_ratio_consumes_exactly_needed() {
        let mut resampler = Resampler::new(32000, 16000, FRAME_MS);
        let needed = resampler.needed();
        assert_eq!(needed, 640);

        assert!(resampler.push(&vec![0i16; needed - 1]).is_none());
        let frame = resampler.push(&[0i16]).unwrap();
        assert_eq!(frame.len(), 320);
        assert_eq!(resampler.buffered(), 0);
    }

    #[test]
    fn leftover_input_carries_to_next_frame() {
        let mut resampler = Resampler::new(48000, 16000, FRAME_MS);
        // 1000 samples: one frame consumed, 40 left pending
        let frame = resampler.push(&vec![50i16; 1000]);
        assert!(frame.is_some());
        assert_eq!(resampler.buffered(), 40);
    }

    #[test]
    fn dc_level_survives_downsampling() {
        let mut resampler = Resampler::new(48000, 16000, FRAME_MS);
        let frame = resampler.push(&vec![1000i16; 960]).unwrap();
        assert_eq!(frame.len(), 320);
        for &s in frame.samples() {
            assert!((s - 1000).abs() <= 2, "DC drift: {s}");
        }
    }

    #[test]
    fn periodic_tone_survives_downsampling() {
        // 50 Hz fits exactly one cycle in a 20 ms window, so the Fourier
        // method reproduces it without edge effects.
        let mut resampler = Resampler::new(48000, 16000, FRAME_MS);
        let input: Vec<i16> = (0..960)
            .map(|i| {
                let t = i as f64 / 48000.0;
                ((2.0 * std::f64::consts::PI * 50.0 * t).sin() * 8000.0).round() as i16
            })
            .collect();
        let frame = resampler.push(&input).unwrap();
        assert_eq!(frame.len(), 320);
        for (i, &s) in frame.samples().iter().enumerate() {
            let t = i as f64 / 16000.0;
            let expected = (2.0 * std::f64::consts::PI * 50.0 * t).sin() * 8000.0;
            assert!(
                (s as f64 - expected).abs() < 20.0,
                "sample {i}: got {s}, expected {expected:.1}"
            );
        }
    }

    #[test]
    fn extreme_input_clips_instead_of_wrapping() {
        let mut resampler = Resampler::new(32000, 16000, FRAME_MS);
        let loud = vec![i16::MAX; 640];
        let frame = resampler.push(&loud).unwrap();
        // Ringing may push intermediate values past full scale; output must
        // clip, not wrap to the negative extreme.
        assert!(frame.samples().iter().all(|&s| s > 0));
    }
}
