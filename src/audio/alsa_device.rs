//! ALSA PCM line wrappers for capture and playback.
//!
//! Lines are opened in blocking mode: `readi`/`writei` block for the
//! duration of one hardware transfer, which is the pipeline's call model.
//! Recovery never repairs a line in place; a failed handle is destroyed and
//! reopened wholesale.

use alsa::pcm::{Access, Format, Frames, HwParams, PCM, State};
use alsa::{Direction, ValueOr};

use crate::error::{AudioError, AudioResult};

/// Lifecycle of one native line. Pause is tracked by the controller, not
/// here, so pausing never has to touch a lock that hardware I/O holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineState {
    Closed,
    Active,
    Error,
}

/// Parameters actually granted by the hardware after negotiation.
#[derive(Debug, Clone)]
pub(crate) struct NegotiatedParams {
    pub sample_rate: u32,
    pub channels: u32,
    pub period_size: usize,
}

/// Open a PCM line for capture. The device keeps its own preferred rate;
/// the caller compares `sample_rate` against the requested one to decide
/// whether resampling is required.
pub(crate) fn open_capture(
    device: &str,
    sample_rate: u32,
    channels: u32,
    period_size: usize,
) -> AudioResult<(PCM, NegotiatedParams)> {
    open_line(device, Direction::Capture, sample_rate, channels, period_size, "capture")
}

/// Open a PCM line for playback.
pub(crate) fn open_playback(
    device: &str,
    sample_rate: u32,
    channels: u32,
    period_size: usize,
) -> AudioResult<(PCM, NegotiatedParams)> {
    open_line(device, Direction::Playback, sample_rate, channels, period_size, "playback")
}

fn open_line(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    channels: u32,
    period_size: usize,
    dir_name: &'static str,
) -> AudioResult<(PCM, NegotiatedParams)> {
    let pcm = PCM::new(device, direction, false).map_err(|source| AudioError::StreamOpen {
        direction: dir_name,
        device: device.to_string(),
        source,
    })?;

    {
        let hwp = HwParams::any(&pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::s16())?;
        hwp.set_channels(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        hwp.set_period_size_near(period_size as Frames, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }

    let params = {
        let hwp = pcm.hw_params_current()?;
        NegotiatedParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
        }
    };

    if direction == Direction::Playback {
        // Start once a full period is queued instead of waiting for the
        // whole buffer to fill.
        let swp = pcm.sw_params_current()?;
        swp.set_start_threshold(params.period_size as Frames)?;
        pcm.sw_params(&swp)?;
    }

    log::info!(
        "ALSA {} line open: device={}, rate={}, channels={}, period={}",
        dir_name,
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
    );

    Ok((pcm, params))
}

/// Bring a line into the running state, preparing it first where the state
/// machine requires it. Disconnected and draining lines are not repairable
/// here and report an error so the caller reinitializes.
pub(crate) fn ensure_running(pcm: &PCM) -> alsa::Result<()> {
    match pcm.state() {
        State::Running => Ok(()),
        State::Prepared => pcm.start(),
        State::Setup | State::XRun | State::Suspended => {
            pcm.prepare()?;
            pcm.start()
        }
        _ => Err(alsa::Error::unsupported("pcm line not startable")),
    }
}
