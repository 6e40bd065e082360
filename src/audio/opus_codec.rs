//! Opus encoder/decoder wrappers.
//!
//! The transport speaks mono Opus: fixed-duration PCM frames at the encode
//! rate go up, packets at the (possibly different) decode rate come down.
//! Both wrappers keep their scratch buffers so steady-state operation does
//! not reallocate per frame.

use opus::{Application, Bitrate, Channels};

use crate::audio::frame::{EncodedFrame, PcmFrame};
use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};

/// Worst case Opus packet size in bytes, per the reference encoder docs.
const MAX_PACKET_BYTES: usize = 4000;

/// Longest legal Opus frame in ms; sizes the decoder's PCM buffer so
/// oversized packets decode instead of erroring.
const MAX_FRAME_MS: u32 = 120;

fn parse_application(name: &str) -> AudioResult<Application> {
    match name {
        "audio" => Ok(Application::Audio),
        "voip" => Ok(Application::Voip),
        "lowdelay" => Ok(Application::LowDelay),
        other => Err(AudioError::InvalidConfig(format!(
            "unknown opus application profile \"{other}\""
        ))),
    }
}

pub struct OpusEncoder {
    encoder: opus::Encoder,
    sample_rate: u32,
    frame_size: usize,
    packet_buf: Vec<u8>,
}

impl OpusEncoder {
    pub fn new(config: &AudioConfig) -> AudioResult<Self> {
        let application = parse_application(&config.opus_application)?;
        let mut encoder =
            opus::Encoder::new(config.input_sample_rate, Channels::Mono, application)?;
        encoder.set_bitrate(Bitrate::Bits(config.opus_bitrate))?;

        Ok(Self {
            encoder,
            sample_rate: config.input_sample_rate,
            frame_size: config.input_frame_size(),
            packet_buf: vec![0u8; MAX_PACKET_BYTES],
        })
    }

    /// Encode exactly one frame at the target rate. A frame of any other
    /// shape is a caller bug, reported rather than truncated.
    pub fn encode(&mut self, frame: &PcmFrame) -> AudioResult<EncodedFrame> {
        if frame.len() != self.frame_size || frame.sample_rate() != self.sample_rate {
            return Err(AudioError::InvalidFrame {
                actual: frame.len(),
                expected: self.frame_size,
                sample_rate: frame.sample_rate(),
                duration_ms: frame.duration_ms(),
            });
        }
        let written = self.encoder.encode(frame.samples(), &mut self.packet_buf)?;
        Ok(EncodedFrame::from(self.packet_buf[..written].to_vec()))
    }
}

pub struct OpusDecoder {
    decoder: opus::Decoder,
    pcm_buf: Vec<i16>,
}

impl OpusDecoder {
    pub fn new(sample_rate: u32) -> AudioResult<Self> {
        let decoder = opus::Decoder::new(sample_rate, Channels::Mono)?;
        let max_samples = (sample_rate * MAX_FRAME_MS / 1000) as usize;
        Ok(Self { decoder, pcm_buf: vec![0i16; max_samples] })
    }

    /// Decode one packet to PCM at the decoder's rate. Malformed data is an
    /// error for this packet only; the decoder state stays usable.
    pub fn decode(&mut self, frame: &EncodedFrame) -> AudioResult<Vec<i16>> {
        let decoded = self.decoder.decode(frame.as_bytes(), &mut self.pcm_buf, false)?;
        Ok(self.pcm_buf[..decoded].to_vec())
    }
}
