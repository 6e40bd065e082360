//! Frame types carried through the pipeline.

use bytes::Bytes;

use crate::error::{AudioError, AudioResult};

/// One fixed-duration chunk of mono 16-bit PCM, tagged with the rate and
/// duration that determine its length.
///
/// Invariant: `samples.len() == sample_rate * duration_ms / 1000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    samples: Vec<i16>,
    sample_rate: u32,
    duration_ms: u32,
}

impl PcmFrame {
    /// Sample count implied by a rate and duration.
    pub fn expected_len(sample_rate: u32, duration_ms: u32) -> usize {
        (sample_rate * duration_ms / 1000) as usize
    }

    pub fn new(samples: Vec<i16>, sample_rate: u32, duration_ms: u32) -> AudioResult<Self> {
        let expected = Self::expected_len(sample_rate, duration_ms);
        if samples.len() != expected {
            return Err(AudioError::InvalidFrame {
                actual: samples.len(),
                expected,
                sample_rate,
                duration_ms,
            });
        }
        Ok(Self { samples, sample_rate, duration_ms })
    }

    /// Internal constructor for producers that build frames of a size they
    /// already computed from the same rate/duration pair.
    pub(crate) fn from_raw(samples: Vec<i16>, sample_rate: u32, duration_ms: u32) -> Self {
        debug_assert_eq!(samples.len(), Self::expected_len(sample_rate, duration_ms));
        Self { samples, sample_rate, duration_ms }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// One Opus packet, produced from exactly one [`PcmFrame`] at the target
/// rate and frame size. The payload is opaque; cloning is cheap so the same
/// frame can cross the producer/consumer seam of the playback queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    data: Bytes,
}

impl EncodedFrame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for EncodedFrame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_length_matches_rate_and_duration() {
        for (rate, dur) in [(16000u32, 20u32), (24000, 20), (48000, 20), (16000, 60), (8000, 10)] {
            let expected = (rate * dur / 1000) as usize;
            let frame = PcmFrame::new(vec![0i16; expected], rate, dur).unwrap();
            assert_eq!(frame.len(), expected);
            assert_eq!(frame.len(), PcmFrame::expected_len(rate, dur));
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = PcmFrame::new(vec![0i16; 319], 16000, 20).unwrap_err();
        match err {
            AudioError::InvalidFrame { actual, expected, .. } => {
                assert_eq!(actual, 319);
                assert_eq!(expected, 320);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn encoded_frame_clones_share_payload() {
        let frame = EncodedFrame::from(vec![1u8, 2, 3]);
        let copy = frame.clone();
        assert_eq!(copy.as_bytes(), frame.as_bytes());
        assert_eq!(copy.len(), 3);
    }
}
